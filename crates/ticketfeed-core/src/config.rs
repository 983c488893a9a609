use std::time::Duration;

use crate::constants::{
    DELETE_BATCH_SIZE, ENV_API_KEY, ENV_STORE_URL, LOAD_LIMIT, LOAD_TIMEOUT, PULSE_WINDOW,
};

/// Engine configuration.
///
/// A missing endpoint or key surfaces as a load failure once the engine
/// starts, not at construction.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the remote store, e.g. `https://project.example.co`
    pub store_url: Option<String>,
    pub api_key: Option<String>,
    pub load_limit: usize,
    pub load_timeout: Duration,
    pub delete_batch_size: usize,
    pub pulse_window: Duration,
}

impl CoreConfig {
    pub fn new(store_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            store_url: Some(store_url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Read `TICKETFEED_URL` and `TICKETFEED_KEY` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            store_url: non_empty(ENV_STORE_URL),
            api_key: non_empty(ENV_API_KEY),
            ..Self::default()
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = size.max(1);
        self
    }

    pub fn with_pulse_window(mut self, window: Duration) -> Self {
        self.pulse_window = window;
        self
    }

    /// Name of the first required setting that is missing, if any
    pub fn missing_setting(&self) -> Option<&'static str> {
        if self.store_url.is_none() {
            Some(ENV_STORE_URL)
        } else if self.api_key.is_none() {
            Some(ENV_API_KEY)
        } else {
            None
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            api_key: None,
            load_limit: LOAD_LIMIT,
            load_timeout: LOAD_TIMEOUT,
            delete_batch_size: DELETE_BATCH_SIZE,
            pulse_window: PULSE_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_reads_both_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TICKETFEED_URL", "https://store.example"),
            ("TICKETFEED_KEY", "service-key"),
        ]);
        let config = CoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.store_url.as_deref(), Some("https://store.example"));
        assert_eq!(config.api_key.as_deref(), Some("service-key"));
        assert!(config.missing_setting().is_none());
        assert_eq!(config.load_limit, 100);
        assert_eq!(config.delete_batch_size, 50);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = CoreConfig::from_lookup(|k| match k {
            "TICKETFEED_URL" => Some("https://store.example".to_string()),
            _ => Some("   ".to_string()),
        });
        assert_eq!(config.missing_setting(), Some("TICKETFEED_KEY"));
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = CoreConfig::default().with_delete_batch_size(0);
        assert_eq!(config.delete_batch_size, 1);
    }
}
