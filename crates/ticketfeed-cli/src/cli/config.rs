use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ticketfeed_core::CoreConfig;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Base URL of the remote store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,

    /// API key sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Seconds before the initial ticket query gives up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default location under the user's config directory, if it exists
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("ticketfeed").join("config.json"))
            .filter(|path| path.exists())
    }

    /// Values set in the file win over the environment
    pub fn apply(&self, mut base: CoreConfig) -> CoreConfig {
        if let Some(url) = self.store_url.as_deref().filter(|v| !v.trim().is_empty()) {
            base.store_url = Some(url.to_string());
        }
        if let Some(key) = self.api_key.as_deref().filter(|v| !v.trim().is_empty()) {
            base.api_key = Some(key.to_string());
        }
        if let Some(secs) = self.load_timeout_secs {
            base = base.with_load_timeout(std::time::Duration::from_secs(secs));
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_config_camel_case() {
        let json = r#"{"storeUrl": "https://store.example", "apiKey": "k1"}"#;
        let config: CliConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.store_url.as_deref(), Some("https://store.example"));
        assert_eq!(config.api_key.as_deref(), Some("k1"));
        assert!(config.load_timeout_secs.is_none());
    }

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert!(config.store_url.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"storeUrl": "https://a.example", "loadTimeoutSecs": 4}}"#).unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.store_url.as_deref(), Some("https://a.example"));
        assert_eq!(config.load_timeout_secs, Some(4));
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = CliConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_file_values_override_environment() {
        let env = CoreConfig::new("https://env.example", "env-key");
        let file = CliConfig {
            store_url: Some("https://file.example".to_string()),
            api_key: Some("  ".to_string()),
            load_timeout_secs: Some(2),
        };

        let merged = file.apply(env);
        assert_eq!(merged.store_url.as_deref(), Some("https://file.example"));
        assert_eq!(merged.api_key.as_deref(), Some("env-key"));
        assert_eq!(merged.load_timeout, Duration::from_secs(2));
    }
}
