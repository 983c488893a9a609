pub mod pulse;
pub mod ticket_store;

pub use pulse::NotificationPulse;
pub use ticket_store::{Applied, LoadPhase, TicketStore};
