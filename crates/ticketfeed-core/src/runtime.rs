//! Engine runtime: owns the reconciliation store, runs the change feed
//! dispatch loop and exposes the commands renderers call.

use std::sync::Arc;

use chrono::Utc;
use futures::future::{try_join_all, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::CoreConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{EngineError, RemoteError, WriteOp};
use crate::models::{
    Change, ChangeEvent, HistoryEntry, Ticket, TicketCategory, TicketStatus,
};
use crate::remote::{FeedSubscription, FeedTable, RemoteStore, SubscriptionStatus};
use crate::stats::{FeedStats, SharedFeedStats};
use crate::store::{Applied, LoadPhase, TicketStore};

struct EngineInner {
    remote: Arc<dyn RemoteStore>,
    config: CoreConfig,
    store: Mutex<TicketStore>,
    /// Bumped after every transition so renderers know when to redraw
    revision: watch::Sender<u64>,
    stats: SharedFeedStats,
}

/// Cloneable handle onto the ticket collection and its commands.
///
/// The store lock is only taken for synchronous transitions and never held
/// across a remote call. Anything read between an `.await` and the apply that
/// follows it may already be stale; no generation is checked beyond the
/// per-ticket `updated_at` watermark.
#[derive(Clone)]
pub struct TicketEngine {
    inner: Arc<EngineInner>,
}

impl TicketEngine {
    pub fn new(remote: Arc<dyn RemoteStore>, config: CoreConfig) -> Self {
        let store = TicketStore::new(config.pulse_window);
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(EngineInner {
                remote,
                config,
                store: Mutex::new(store),
                revision,
                stats: SharedFeedStats::new(),
            }),
        }
    }

    fn update<R>(&self, transition: impl FnOnce(&mut TicketStore) -> R) -> R {
        let result = transition(&mut self.inner.store.lock());
        self.inner.revision.send_modify(|rev| *rev += 1);
        result
    }

    fn read<R>(&self, view: impl FnOnce(&TicketStore) -> R) -> R {
        view(&self.inner.store.lock())
    }

    // ===== Reads =====

    pub fn visible_tickets(&self) -> Vec<Ticket> {
        self.read(|s| s.visible_tickets())
    }

    pub fn visible_by_category(&self) -> Vec<(TicketCategory, Vec<Ticket>)> {
        self.read(|s| s.visible_by_category())
    }

    /// Every loaded ticket, archived ones included
    pub fn all_tickets(&self) -> Vec<Ticket> {
        self.read(|s| s.all_tickets().to_vec())
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<Ticket> {
        self.read(|s| s.get(ticket_id).cloned())
    }

    pub fn phase(&self) -> LoadPhase {
        self.read(|s| s.phase().clone())
    }

    pub fn loading(&self) -> bool {
        self.read(|s| s.is_loading())
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error().map(str::to_string))
    }

    pub fn archived_count(&self) -> usize {
        self.read(|s| s.archived_count())
    }

    pub fn has_new_update(&self) -> bool {
        self.read(|s| s.has_new_update())
    }

    pub fn pulse_expires_at(&self) -> Option<Instant> {
        self.read(|s| s.pulse_expires_at())
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn stats(&self) -> FeedStats {
        self.inner.stats.snapshot()
    }

    /// Resolve once the current load has finished, successfully or not
    pub async fn wait_until_loaded(&self) -> LoadPhase {
        let mut changes = self.changes();
        loop {
            let phase = self.phase();
            if phase != LoadPhase::Loading || changes.changed().await.is_err() {
                return phase;
            }
        }
    }

    // ===== Loading =====

    /// Full reload from the remote store. Failure moves the store to the
    /// error phase and is also returned; there is no retry.
    pub async fn refetch(&self) -> Result<(), EngineError> {
        self.update(|s| s.begin_load());
        info!("loading tickets");

        match self.load_snapshot().await {
            Ok(tickets) => {
                let count = tickets.len();
                self.update(|s| s.finish_load(tickets));
                info!(count, "tickets loaded");
                Ok(())
            }
            Err(source) => {
                error!(error = %source, "failed to load tickets");
                self.update(|s| s.fail_load(source.to_string()));
                Err(EngineError::Load(source))
            }
        }
    }

    async fn load_snapshot(&self) -> Result<Vec<Ticket>, RemoteError> {
        let remote = &self.inner.remote;
        let timeout = self.inner.config.load_timeout;

        let tickets = tokio::time::timeout(
            timeout,
            remote.fetch_recent_tickets(self.inner.config.load_limit),
        )
        .await
        .map_err(|_| RemoteError::Timeout(timeout))??;

        if tickets.is_empty() {
            return Ok(tickets);
        }

        try_join_all(tickets.into_iter().map(|ticket| async move {
            let messages = remote.fetch_messages(&ticket.id).await?;
            Ok::<_, RemoteError>(ticket.with_messages(messages))
        }))
        .await
    }

    // ===== Archived overlay =====

    pub fn archive_ticket(&self, ticket_id: &str) {
        self.update(|s| s.archive(ticket_id));
    }

    pub fn archive_all_tickets(&self) {
        self.update(|s| s.archive_all());
    }

    pub fn restore_ticket(&self, ticket_id: &str) {
        self.update(|s| s.restore(ticket_id));
    }

    /// Empty the overlay and reload, since hidden tickets may have changed
    /// upstream in the meantime.
    pub async fn clear_archived(&self) -> Result<(), EngineError> {
        self.update(|s| s.clear_archived());
        self.refetch().await
    }

    // ===== Write-through commands =====

    pub async fn delete_ticket(&self, ticket_id: &str) -> Result<(), EngineError> {
        if let Err(source) = self.inner.remote.delete_ticket(ticket_id).await {
            error!(ticket_id, error = %source, "failed to delete ticket");
            return Err(EngineError::write(WriteOp::DeleteTicket, source));
        }

        self.update(|s| s.remove_ticket(ticket_id));
        info!(ticket_id, "ticket deleted");
        Ok(())
    }

    /// Delete every remote ticket in sequential batches.
    ///
    /// The id list comes from the remote store, not from the capped local
    /// collection. A failing batch stops the run; earlier batches stay
    /// deleted and local state is only cleared once every batch succeeded.
    pub async fn delete_all_tickets(&self) -> Result<(), EngineError> {
        let remote = &self.inner.remote;
        let ids = remote.fetch_all_ticket_ids().await.map_err(|source| {
            error!(error = %source, "failed to list tickets for deletion");
            EngineError::write(WriteOp::DeleteAllTickets, source)
        })?;

        let batch_size = self.inner.config.delete_batch_size.max(1);
        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if let Err(source) = remote.delete_tickets(batch).await {
                let done = index * batch_size;
                error!(batch = index, deleted = done, error = %source, "delete batch failed");
                if done == 0 {
                    return Err(EngineError::write(WriteOp::DeleteAllTickets, source));
                }
                return Err(EngineError::PartialBatch {
                    deleted: ids[..done].to_vec(),
                    remaining: ids[done..].to_vec(),
                    source,
                });
            }
            debug!(batch = index, size = batch.len(), "delete batch committed");
        }

        self.update(|s| s.clear());
        info!(count = ids.len(), "all tickets deleted");
        Ok(())
    }

    /// Status-only patch: the ticket keeps its position and `updated_at`.
    pub async fn update_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<(), EngineError> {
        if let Err(source) = self
            .inner
            .remote
            .update_ticket_status(ticket_id, status)
            .await
        {
            error!(ticket_id, %status, error = %source, "failed to update ticket status");
            return Err(EngineError::write(WriteOp::UpdateStatus, source));
        }

        if !self.update(|s| s.patch_status(ticket_id, status)) {
            debug!(ticket_id, "status updated for a ticket that is not loaded");
        }
        Ok(())
    }

    pub async fn ticket_history(&self, ticket_id: &str) -> Result<Vec<HistoryEntry>, RemoteError> {
        self.inner.remote.fetch_history(ticket_id).await
    }

    // ===== Change feed =====

    /// Apply an event, or return the pending handler when the event needs a
    /// remote pre-fetch first.
    fn handle_event(&self, event: ChangeEvent) -> Option<BoxFuture<'static, ()>> {
        self.inner.stats.record_received(event.entity(), event.op());
        debug!(%event, "change event received");

        match event {
            ChangeEvent::Ticket(Change::Insert(ticket)) => {
                Some(self.prefetch_then_apply(ticket, TicketStore::apply_ticket_insert))
            }
            ChangeEvent::Ticket(Change::Update(ticket)) => {
                Some(self.prefetch_then_apply(ticket, TicketStore::apply_ticket_update))
            }
            ChangeEvent::Ticket(Change::Delete { id }) => {
                let outcome = self.update(|s| s.apply_ticket_delete(&id));
                self.record_outcome(&id, outcome);
                None
            }
            ChangeEvent::Message(Change::Insert(message)) => {
                let ticket_id = message.ticket_id.clone();
                let outcome = self.update(|s| s.apply_message_insert(message, Utc::now()));
                self.record_outcome(&ticket_id, outcome);
                None
            }
            ChangeEvent::Message(Change::Update(_) | Change::Delete { .. }) => {
                self.inner.stats.record_ignored();
                None
            }
        }
    }

    fn prefetch_then_apply(
        &self,
        ticket: Ticket,
        apply: fn(&mut TicketStore, Ticket) -> Applied,
    ) -> BoxFuture<'static, ()> {
        let engine = self.clone();
        async move {
            match engine.inner.remote.fetch_messages(&ticket.id).await {
                Ok(messages) => {
                    let ticket_id = ticket.id.clone();
                    let ticket = ticket.with_messages(messages);
                    let outcome = engine.update(|s| apply(s, ticket));
                    engine.record_outcome(&ticket_id, outcome);
                }
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "dropping ticket change, message fetch failed");
                    engine.inner.stats.record_failed();
                }
            }
        }
        .boxed()
    }

    fn record_outcome(&self, ticket_id: &str, outcome: Applied) {
        match outcome {
            Applied::Applied => debug!(ticket_id, "change applied"),
            Applied::Duplicate => debug!(ticket_id, "duplicate change ignored"),
            Applied::Stale => warn!(ticket_id, "stale ticket update discarded"),
            Applied::UnknownTicket => debug!(ticket_id, "change for unknown ticket ignored"),
        }
        self.inner.stats.record_outcome(outcome);
    }
}

/// Single consumer of the change event channel.
///
/// Handlers that need a remote pre-fetch run concurrently inside this loop
/// and apply in whatever order their fetches resolve.
async fn dispatch(
    engine: TicketEngine,
    mut events: mpsc::Receiver<ChangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut in_flight: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(handler) = engine.handle_event(event) {
                        in_flight.push(handler);
                    }
                }
                None => {
                    while in_flight.next().await.is_some() {}
                    break;
                }
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
        }
    }
    debug!(pending = in_flight.len(), "dispatch loop stopped");
}

/// Running engine: feeds, dispatch loop and the engine handle.
///
/// Both feeds are released on `shutdown()` and, failing that, on drop.
pub struct EngineRuntime {
    engine: TicketEngine,
    event_tx: mpsc::Sender<ChangeEvent>,
    feeds: Vec<FeedSubscription>,
    shutdown_tx: watch::Sender<bool>,
    dispatch: Option<JoinHandle<()>>,
}

impl EngineRuntime {
    /// Open both change feeds, start the dispatch loop and kick off the
    /// initial load. Must be called from within a tokio runtime.
    pub fn start(remote: Arc<dyn RemoteStore>, config: CoreConfig) -> Self {
        let engine = TicketEngine::new(remote.clone(), config);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatch = tokio::spawn(dispatch(engine.clone(), event_rx, shutdown_rx));
        let feeds = FeedTable::ALL
            .into_iter()
            .map(|table| remote.subscribe(table, event_tx.clone()))
            .collect();

        let loader = engine.clone();
        tokio::spawn(async move {
            // Outcome is recorded in the store phase
            let _ = loader.refetch().await;
        });

        info!("ticket engine started");
        Self {
            engine,
            event_tx,
            feeds,
            shutdown_tx,
            dispatch: Some(dispatch),
        }
    }

    pub fn engine(&self) -> TicketEngine {
        self.engine.clone()
    }

    /// Sender into the dispatch loop, for injecting synthetic events
    pub fn event_sender(&self) -> mpsc::Sender<ChangeEvent> {
        self.event_tx.clone()
    }

    pub fn feed_status(&self) -> Vec<(FeedTable, SubscriptionStatus)> {
        self.feeds
            .iter()
            .map(|feed| (feed.table(), feed.status()))
            .collect()
    }

    /// Release both feeds and stop the dispatch loop
    pub async fn shutdown(mut self) {
        for feed in self.feeds.drain(..) {
            feed.release();
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(dispatch) = self.dispatch.take() {
            let _ = dispatch.await;
        }
        info!("ticket engine stopped");
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        self.feeds.clear();
        let _ = self.shutdown_tx.send(true);
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
    }
}
