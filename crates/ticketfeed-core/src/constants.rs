//! Application-wide constants
//!
//! Centralized location for table names, limits and timing values
//! that are used across multiple modules.

use std::time::Duration;

/// Remote table holding parent tickets
pub const TICKETS_TABLE: &str = "tickets";

/// Remote table holding ticket messages
pub const MESSAGES_TABLE: &str = "messages";

/// Remote table holding the per-ticket audit trail
pub const HISTORY_TABLE: &str = "ticket_history";

/// Maximum number of tickets fetched by the initial bulk load
pub const LOAD_LIMIT: usize = 100;

/// Upper bound on the initial bulk load (tickets query only)
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of ids sent per remote delete when clearing every ticket
pub const DELETE_BATCH_SIZE: usize = 50;

/// How long the "new activity" pulse stays raised after the last event
pub const PULSE_WINDOW: Duration = Duration::from_secs(3);

/// Pause before a dropped change feed reconnects
pub const FEED_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Capacity of the change event channel feeding the dispatch loop
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Environment variable holding the remote store base URL
pub const ENV_STORE_URL: &str = "TICKETFEED_URL";

/// Environment variable holding the remote store API key
pub const ENV_API_KEY: &str = "TICKETFEED_KEY";

/// Longest change feed line accepted before the partial line is discarded
pub const MAX_FEED_LINE_BYTES: usize = 1024 * 1024;
