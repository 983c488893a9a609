use std::fmt;
use std::time::Duration;

/// Failure talking to the remote store
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("remote store is not configured: {0}")]
    NotConfigured(String),
}

/// Write-through mutation that was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    DeleteTicket,
    DeleteAllTickets,
    UpdateStatus,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOp::DeleteTicket => "delete ticket",
            WriteOp::DeleteAllTickets => "delete all tickets",
            WriteOp::UpdateStatus => "update ticket status",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Initial or explicit reload failed (network error and timeout alike)
    #[error("failed to load tickets: {0}")]
    Load(#[source] RemoteError),
    #[error("{op} failed: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: RemoteError,
    },
    /// A delete-all batch failed after earlier batches were already deleted
    /// remotely. Nothing is rolled back and local state is left as it was.
    #[error(
        "delete all tickets stopped after {} of {} ids: {source}",
        .deleted.len(),
        .deleted.len() + .remaining.len()
    )]
    PartialBatch {
        deleted: Vec<String>,
        remaining: Vec<String>,
        #[source]
        source: RemoteError,
    },
}

impl EngineError {
    pub(crate) fn write(op: WriteOp, source: RemoteError) -> Self {
        EngineError::Write { op, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
