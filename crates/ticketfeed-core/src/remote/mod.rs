//! Remote store access: queries, write-through mutations and change feeds.

pub mod feed;
pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::constants::{MESSAGES_TABLE, TICKETS_TABLE};
use crate::error::RemoteError;
use crate::models::{ChangeEvent, HistoryEntry, Message, Ticket, TicketStatus};

pub use feed::{FeedSubscription, SubscriptionStatus};
pub use http::HttpRemoteStore;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The two collections that publish change feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedTable {
    Tickets,
    Messages,
}

impl FeedTable {
    pub const ALL: [FeedTable; 2] = [FeedTable::Tickets, FeedTable::Messages];

    pub fn table_name(&self) -> &'static str {
        match self {
            FeedTable::Tickets => TICKETS_TABLE,
            FeedTable::Messages => MESSAGES_TABLE,
        }
    }
}

/// Operations the engine needs from the remote store.
///
/// Implementations are shared behind an `Arc` and passed down explicitly;
/// there is no process-wide client.
pub trait RemoteStore: Send + Sync {
    /// Most recently updated tickets first, without messages attached
    fn fetch_recent_tickets(&self, limit: usize) -> BoxFuture<'_, RemoteResult<Vec<Ticket>>>;

    /// Messages of one ticket, ascending by `created_at`
    fn fetch_messages<'a>(&'a self, ticket_id: &'a str)
        -> BoxFuture<'a, RemoteResult<Vec<Message>>>;

    /// Every ticket id in the store, not capped by the load limit
    fn fetch_all_ticket_ids(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>>;

    /// Audit trail of one ticket, newest first
    fn fetch_history<'a>(&'a self, ticket_id: &'a str)
        -> BoxFuture<'a, RemoteResult<Vec<HistoryEntry>>>;

    /// Delete one ticket; messages cascade server-side
    fn delete_ticket<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, RemoteResult<()>>;

    fn delete_tickets<'a>(&'a self, ticket_ids: &'a [String]) -> BoxFuture<'a, RemoteResult<()>>;

    fn update_ticket_status<'a>(
        &'a self,
        ticket_id: &'a str,
        status: TicketStatus,
    ) -> BoxFuture<'a, RemoteResult<()>>;

    /// Open the change feed for `table`, forwarding every event into `sink`.
    /// Must be called from within a tokio runtime. The feed stays open until
    /// the returned handle is released or dropped.
    fn subscribe(&self, table: FeedTable, sink: mpsc::Sender<ChangeEvent>) -> FeedSubscription;
}
