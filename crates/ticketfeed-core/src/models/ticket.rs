use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::error::ParseLabelError;

/// Ticket classification assigned upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Bug,
    Feature,
    Support,
    Question,
}

impl TicketCategory {
    /// Display order used when grouping tickets
    pub const ALL: [TicketCategory; 4] = [
        TicketCategory::Bug,
        TicketCategory::Feature,
        TicketCategory::Support,
        TicketCategory::Question,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Bug => "bug",
            TicketCategory::Feature => "feature",
            TicketCategory::Support => "support",
            TicketCategory::Question => "question",
        }
    }

    /// Heading shown above a group of tickets in this category
    pub fn heading(&self) -> &'static str {
        match self {
            TicketCategory::Bug => "Bug Reports",
            TicketCategory::Feature => "Feature Requests",
            TicketCategory::Support => "Support Questions",
            TicketCategory::Question => "General Questions",
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketCategory {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseLabelError::new("category", s))
    }
}

/// Workflow status of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseLabelError::new("status", s))
    }
}

/// A tracked unit of customer communication.
///
/// Rows come from the remote `tickets` table; `messages` is never part of the
/// row itself and is attached by a separate per-ticket fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub category: TicketCategory,
    pub status: TicketStatus,
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    /// Source timestamp of the message that opened the ticket
    #[serde(default)]
    pub first_message_ts: Option<String>,
    /// Counter maintained by the writer; bumped locally by one per accepted
    /// message insert, never recomputed from `messages.len()`
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub last_user_id: Option<String>,
    #[serde(default)]
    pub last_user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owned messages, ascending by `created_at`
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Ticket {
    pub fn has_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Restore ascending `created_at` order. Stable, so equal timestamps keep
    /// arrival order.
    pub fn sort_messages(&mut self) {
        self.messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    /// Attach a freshly fetched message list, replacing whatever was there.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self.sort_messages();
        self
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticket_deserializes_without_optional_fields() {
        let row = json!({
            "id": "t1",
            "title": "Login broken",
            "category": "bug",
            "status": "in_progress",
            "channel_id": "C1",
            "created_at": "2025-01-01T10:00:00Z",
            "updated_at": "2025-01-01T10:05:00Z"
        });

        let ticket: Ticket = serde_json::from_value(row).unwrap();
        assert_eq!(ticket.category, TicketCategory::Bug);
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.message_count, 0);
        assert!(ticket.channel_name.is_none());
        assert!(ticket.messages.is_empty());
    }

    #[test]
    fn test_status_parses_snake_case_labels() {
        assert_eq!("in_progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
        assert_eq!(TicketStatus::Resolved.to_string(), "resolved");

        let err = "done".parse::<TicketStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown status: done");
    }

    #[test]
    fn test_category_display_order() {
        let labels: Vec<&str> = TicketCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(labels, vec!["bug", "feature", "support", "question"]);
    }
}
