pub mod change;
pub mod history;
pub mod message;
pub mod ticket;

pub use change::{Change, ChangeEvent, ChangeOp, EntityKind};
pub use history::{HistoryAction, HistoryEntry};
pub use message::Message;
pub use ticket::{Ticket, TicketCategory, TicketStatus};
