//! Change feed plumbing shared by every transport.
//!
//! A feed delivers newline-delimited JSON records shaped like
//! `{"type":"INSERT","table":"tickets","record":{..},"old_record":null}`.
//! Deletes only carry the primary key in `old_record`.

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::FeedTable;
use crate::constants::MAX_FEED_LINE_BYTES;
use crate::models::{Change, ChangeEvent};

/// Connection state reported by an open feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Connecting,
    Subscribed,
    ChannelError(String),
    Closed,
}

/// Scoped handle for one open change feed.
///
/// The background task forwarding events is aborted when the handle is
/// released or dropped, whichever happens first.
#[derive(Debug)]
pub struct FeedSubscription {
    table: FeedTable,
    status: watch::Receiver<SubscriptionStatus>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(
        table: FeedTable,
        status: watch::Receiver<SubscriptionStatus>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            table,
            status,
            task: Some(task),
        }
    }

    pub fn table(&self) -> FeedTable {
        self.table
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status.borrow().clone()
    }

    pub fn status_changes(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status.clone()
    }

    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn release(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(table = self.table.table_name(), "change feed released");
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.abort();
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum RecordType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct FeedRecord {
    #[serde(rename = "type")]
    record_type: RecordType,
    table: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RecordKey {
    id: String,
}

fn missing(field: &'static str) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::missing_field(field)
}

fn into_change<T: DeserializeOwned>(record: FeedRecord) -> Result<Change<T>, serde_json::Error> {
    match record.record_type {
        RecordType::Insert => {
            let row = record.record.ok_or_else(|| missing("record"))?;
            Ok(Change::Insert(serde_json::from_value(row)?))
        }
        RecordType::Update => {
            let row = record.record.ok_or_else(|| missing("record"))?;
            Ok(Change::Update(serde_json::from_value(row)?))
        }
        RecordType::Delete => {
            let old = record.old_record.ok_or_else(|| missing("old_record"))?;
            let key: RecordKey = serde_json::from_value(old)?;
            Ok(Change::Delete { id: key.id })
        }
    }
}

/// Decode one feed line. Records addressed to another table yield `None`.
pub fn parse_feed_line(table: FeedTable, line: &str) -> Result<Option<ChangeEvent>, serde_json::Error> {
    let record: FeedRecord = serde_json::from_str(line)?;
    if record.table != table.table_name() {
        return Ok(None);
    }

    let event = match table {
        FeedTable::Tickets => ChangeEvent::Ticket(into_change(record)?),
        FeedTable::Messages => ChangeEvent::Message(into_change(record)?),
    };
    Ok(Some(event))
}

/// Why a feed line was rejected before decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum LineError {
    #[error("line exceeds {0} bytes")]
    Oversized(usize),
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Splits a byte stream into complete lines, holding back partial tails.
///
/// A line longer than the limit is reported once and skipped up to its
/// terminating newline.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_FEED_LINE_BYTES)
    }
}

impl LineBuffer {
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
            discarding: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, LineError>> {
        let mut lines = Vec::new();
        for segment in chunk.split_inclusive(|b| *b == b'\n') {
            let complete = segment.last() == Some(&b'\n');
            let body = if complete {
                &segment[..segment.len() - 1]
            } else {
                segment
            };

            if self.discarding {
                self.discarding = !complete;
                continue;
            }
            if self.pending.len() + body.len() > self.limit {
                self.pending.clear();
                self.discarding = !complete;
                lines.push(Err(LineError::Oversized(self.limit)));
                continue;
            }

            self.pending.extend_from_slice(body);
            if complete {
                if let Some(line) = decode_line(std::mem::take(&mut self.pending)) {
                    lines.push(line);
                }
            }
        }
        lines
    }

    pub(crate) fn finish(self) -> Option<Result<String, LineError>> {
        if self.discarding {
            return None;
        }
        decode_line(self.pending)
    }
}

fn decode_line(raw: Vec<u8>) -> Option<Result<String, LineError>> {
    match String::from_utf8(raw) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| Ok(text.to_string()))
        }
        Err(_) => Some(Err(LineError::InvalidUtf8)),
    }
}

async fn forward_line(table: FeedTable, line: &str, sink: &mpsc::Sender<ChangeEvent>) -> bool {
    match parse_feed_line(table, line) {
        Ok(Some(event)) => sink.send(event).await.is_ok(),
        Ok(None) => {
            debug!(table = table.table_name(), "skipping record for another table");
            true
        }
        Err(e) => {
            warn!(table = table.table_name(), error = %e, "malformed feed record");
            true
        }
    }
}

fn reject_line(table: FeedTable, error: &LineError) {
    warn!(table = table.table_name(), error = %error, "malformed feed record");
}

/// Pump a feed body into `sink` until the body ends or the sink closes.
pub(crate) async fn forward_lines<S, B, E>(
    table: FeedTable,
    mut body: S,
    sink: &mpsc::Sender<ChangeEvent>,
) -> Result<(), E>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = body.next().await {
        for line in buffer.push(chunk?.as_ref()) {
            let open = match line {
                Ok(line) => forward_line(table, &line, sink).await,
                Err(e) => {
                    reject_line(table, &e);
                    true
                }
            };
            if !open {
                debug!(table = table.table_name(), "event receiver dropped");
                return Ok(());
            }
        }
    }

    match buffer.finish() {
        Some(Ok(line)) => {
            forward_line(table, &line, sink).await;
        }
        Some(Err(e)) => reject_line(table, &e),
        None => {}
    }
    Ok(())
}
