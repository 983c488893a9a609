use std::fmt;

use super::message::Message;
use super::ticket::Ticket;

/// Which remote collection a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Ticket,
    Message,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ticket => "ticket",
            EntityKind::Message => "message",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

/// A single row-level change. Deletes only carry the primary key.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T> Change<T> {
    pub fn op(&self) -> ChangeOp {
        match self {
            Change::Insert(_) => ChangeOp::Insert,
            Change::Update(_) => ChangeOp::Update,
            Change::Delete { .. } => ChangeOp::Delete,
        }
    }
}

/// Notification delivered by one of the two change feeds
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Ticket(Change<Ticket>),
    Message(Change<Message>),
}

impl ChangeEvent {
    pub fn entity(&self) -> EntityKind {
        match self {
            ChangeEvent::Ticket(_) => EntityKind::Ticket,
            ChangeEvent::Message(_) => EntityKind::Message,
        }
    }

    pub fn op(&self) -> ChangeOp {
        match self {
            ChangeEvent::Ticket(change) => change.op(),
            ChangeEvent::Message(change) => change.op(),
        }
    }

    /// Primary key of the changed row
    pub fn record_id(&self) -> &str {
        match self {
            ChangeEvent::Ticket(Change::Insert(t) | Change::Update(t)) => &t.id,
            ChangeEvent::Message(Change::Insert(m) | Change::Update(m)) => &m.id,
            ChangeEvent::Ticket(Change::Delete { id })
            | ChangeEvent::Message(Change::Delete { id }) => id,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.entity().as_str(),
            self.op().as_str(),
            self.record_id()
        )
    }
}
