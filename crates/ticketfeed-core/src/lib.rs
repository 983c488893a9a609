//! Realtime ticket reconciliation: loads recent tickets from a remote store,
//! keeps them in sync through change feeds and applies write-through commands.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod remote;
pub mod runtime;
pub mod stats;
pub mod store;

pub use config::CoreConfig;
pub use error::{EngineError, RemoteError, WriteOp};
pub use remote::{FeedTable, HttpRemoteStore, RemoteStore, SubscriptionStatus};
pub use runtime::{EngineRuntime, TicketEngine};
pub use stats::FeedStats;
pub use store::LoadPhase;
