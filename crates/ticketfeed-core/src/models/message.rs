use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ticket::TicketCategory;

/// A single communication event owned by exactly one ticket.
///
/// Messages are created upstream and only received here. The engine never
/// updates or deletes one itself; removal happens remotely as a cascade of
/// the owning ticket's deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub ticket_id: String,
    #[serde(default)]
    pub slack_message_id: Option<String>,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    /// Thread root timestamp, absent for top-level messages
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub message_ts: Option<String>,
    /// Message-level category (may differ from the ticket's)
    pub category: TicketCategory,
    pub created_at: DateTime<Utc>,
}
