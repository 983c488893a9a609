//! In-memory remote store for engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};

use super::feed::{FeedSubscription, SubscriptionStatus};
use super::{FeedTable, RemoteResult, RemoteStore};
use crate::error::RemoteError;
use crate::models::{ChangeEvent, EntityKind, HistoryEntry, Message, Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MockOp {
    LoadTickets,
    FetchMessages,
    FetchIds,
    DeleteTicket,
    UpdateStatus,
}

fn rejected(op: MockOp) -> RemoteError {
    RemoteError::Status {
        status: 503,
        body: format!("{op:?} rejected"),
    }
}

#[derive(Default)]
pub(crate) struct MockRemoteStore {
    tickets: Mutex<Vec<Ticket>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    history: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    failing: Mutex<HashSet<MockOp>>,
    failing_batch: Mutex<Option<usize>>,
    load_delay: Mutex<Option<Duration>>,
    message_gates: Mutex<HashMap<String, VecDeque<oneshot::Receiver<()>>>>,
    feeds: Mutex<HashMap<FeedTable, mpsc::UnboundedSender<ChangeEvent>>>,
    deleted_batches: Mutex<Vec<Vec<String>>>,
    message_fetches: Mutex<usize>,
}

impl MockRemoteStore {
    pub(crate) fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let store = Self::default();
        store.set_tickets(tickets);
        store
    }

    pub(crate) fn set_tickets(&self, tickets: Vec<Ticket>) {
        *self.tickets.lock() = tickets;
    }

    pub(crate) fn set_messages(&self, ticket_id: &str, messages: Vec<Message>) {
        self.messages.lock().insert(ticket_id.to_string(), messages);
    }

    pub(crate) fn set_history(&self, ticket_id: &str, entries: Vec<HistoryEntry>) {
        self.history.lock().insert(ticket_id.to_string(), entries);
    }

    pub(crate) fn fail(&self, op: MockOp) {
        self.failing.lock().insert(op);
    }

    pub(crate) fn recover(&self, op: MockOp) {
        self.failing.lock().remove(&op);
    }

    /// Zero-based index of the delete batch that should be rejected
    pub(crate) fn fail_delete_batch(&self, index: usize) {
        *self.failing_batch.lock() = Some(index);
    }

    pub(crate) fn delay_load(&self, delay: Duration) {
        *self.load_delay.lock() = Some(delay);
    }

    /// Hold the next message fetch for `ticket_id` until the sender fires
    pub(crate) fn gate_messages(&self, ticket_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.message_gates
            .lock()
            .entry(ticket_id.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub(crate) fn emit(&self, event: ChangeEvent) {
        let table = match event.entity() {
            EntityKind::Ticket => FeedTable::Tickets,
            EntityKind::Message => FeedTable::Messages,
        };
        if let Some(feed) = self.feeds.lock().get(&table) {
            let _ = feed.send(event);
        }
    }

    pub(crate) fn feed_open(&self, table: FeedTable) -> bool {
        self.feeds
            .lock()
            .get(&table)
            .is_some_and(|feed| !feed.is_closed())
    }

    pub(crate) fn remote_ids(&self) -> Vec<String> {
        self.tickets.lock().iter().map(|t| t.id.clone()).collect()
    }

    pub(crate) fn deleted_batches(&self) -> Vec<Vec<String>> {
        self.deleted_batches.lock().clone()
    }

    pub(crate) fn message_fetches(&self) -> usize {
        *self.message_fetches.lock()
    }

    fn check(&self, op: MockOp) -> RemoteResult<()> {
        if self.failing.lock().contains(&op) {
            return Err(rejected(op));
        }
        Ok(())
    }
}

impl RemoteStore for MockRemoteStore {
    fn fetch_recent_tickets(&self, limit: usize) -> BoxFuture<'_, RemoteResult<Vec<Ticket>>> {
        async move {
            let delay = *self.load_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.check(MockOp::LoadTickets)?;

            let mut rows = self.tickets.lock().clone();
            rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            rows.truncate(limit);
            Ok(rows)
        }
        .boxed()
    }

    fn fetch_messages<'a>(
        &'a self,
        ticket_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<Message>>> {
        async move {
            *self.message_fetches.lock() += 1;
            let gate = self
                .message_gates
                .lock()
                .get_mut(ticket_id)
                .and_then(|gates| gates.pop_front());
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.check(MockOp::FetchMessages)?;

            let mut messages = self
                .messages
                .lock()
                .get(ticket_id)
                .cloned()
                .unwrap_or_default();
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(messages)
        }
        .boxed()
    }

    fn fetch_all_ticket_ids(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        async move {
            self.check(MockOp::FetchIds)?;
            Ok(self.remote_ids())
        }
        .boxed()
    }

    fn fetch_history<'a>(
        &'a self,
        ticket_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<HistoryEntry>>> {
        async move {
            Ok(self
                .history
                .lock()
                .get(ticket_id)
                .cloned()
                .unwrap_or_default())
        }
        .boxed()
    }

    fn delete_ticket<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            self.check(MockOp::DeleteTicket)?;
            self.tickets.lock().retain(|t| t.id != ticket_id);
            Ok(())
        }
        .boxed()
    }

    fn delete_tickets<'a>(&'a self, ticket_ids: &'a [String]) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            let mut batches = self.deleted_batches.lock();
            if *self.failing_batch.lock() == Some(batches.len()) {
                return Err(RemoteError::Status {
                    status: 500,
                    body: format!("batch {} rejected", batches.len()),
                });
            }
            self.tickets
                .lock()
                .retain(|t| !ticket_ids.contains(&t.id));
            batches.push(ticket_ids.to_vec());
            Ok(())
        }
        .boxed()
    }

    fn update_ticket_status<'a>(
        &'a self,
        ticket_id: &'a str,
        status: TicketStatus,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            self.check(MockOp::UpdateStatus)?;
            if let Some(row) = self.tickets.lock().iter_mut().find(|t| t.id == ticket_id) {
                row.status = status;
            }
            Ok(())
        }
        .boxed()
    }

    fn subscribe(&self, table: FeedTable, sink: mpsc::Sender<ChangeEvent>) -> FeedSubscription {
        let (feed_tx, mut feed_rx) = mpsc::unbounded_channel();
        self.feeds.lock().insert(table, feed_tx);

        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::Subscribed);
        let task = tokio::spawn(async move {
            let _status = status_tx;
            while let Some(event) = feed_rx.recv().await {
                if sink.send(event).await.is_err() {
                    break;
                }
            }
        });
        FeedSubscription::new(table, status_rx, task)
    }
}
