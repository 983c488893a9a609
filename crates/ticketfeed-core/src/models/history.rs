use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    StatusChanged,
    TitleUpdated,
    MessageAdded,
    Deleted,
}

/// One row of a ticket's audit trail, newest first when fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub ticket_id: String,
    pub action: HistoryAction,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl HistoryEntry {
    /// One-line label for timelines
    pub fn describe(&self) -> String {
        match self.action {
            HistoryAction::Created => "Ticket created".to_string(),
            HistoryAction::StatusChanged => format!(
                "Status changed from \"{}\" to \"{}\"",
                self.old_value.as_deref().unwrap_or("unknown"),
                self.new_value.as_deref().unwrap_or("unknown")
            ),
            HistoryAction::TitleUpdated => "Title updated".to_string(),
            HistoryAction::MessageAdded => format!(
                "Message added by {}",
                self.new_value.as_deref().unwrap_or("user")
            ),
            HistoryAction::Deleted => "Ticket deleted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: &str, old: Option<&str>, new: Option<&str>) -> HistoryEntry {
        serde_json::from_value(json!({
            "id": "h1",
            "ticket_id": "t1",
            "action": action,
            "old_value": old,
            "new_value": new,
            "created_at": "2025-01-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_describe_status_change() {
        let e = entry("status_changed", Some("open"), Some("closed"));
        assert_eq!(e.describe(), "Status changed from \"open\" to \"closed\"");
    }

    #[test]
    fn test_describe_message_added_defaults_author() {
        assert_eq!(entry("message_added", None, None).describe(), "Message added by user");
        assert_eq!(
            entry("message_added", None, Some("dana")).describe(),
            "Message added by dana"
        );
    }
}
