use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::pulse::NotificationPulse;
use crate::models::{Message, Ticket, TicketCategory, TicketStatus};

/// Lifecycle of the collection as seen by renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    Loading,
    Ready,
    Error(String),
}

/// Result of applying one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Entity already present (redelivery)
    Duplicate,
    /// Payload older than what was already applied for this id
    Stale,
    /// Referenced ticket is not in the collection
    UnknownTicket,
}

/// Canonical in-memory ticket collection plus the archived overlay.
///
/// Every method is a complete synchronous transition: callers hold the lock
/// for one call and never observe a half-applied change.
///
/// Ordering is recency: whatever an insert, update or new message touches
/// moves to index 0, everything else keeps its relative order.
#[derive(Debug)]
pub struct TicketStore {
    tickets: Vec<Ticket>,
    archived: HashSet<String>,
    /// Newest remote `updated_at` applied per ticket. Local stamps from
    /// message inserts never move it.
    watermarks: HashMap<String, DateTime<Utc>>,
    phase: LoadPhase,
    pulse: NotificationPulse,
}

impl TicketStore {
    pub fn new(pulse_window: Duration) -> Self {
        Self {
            tickets: Vec::new(),
            archived: HashSet::new(),
            watermarks: HashMap::new(),
            phase: LoadPhase::Loading,
            pulse: NotificationPulse::new(pulse_window),
        }
    }

    // ===== Load lifecycle =====

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            LoadPhase::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn begin_load(&mut self) {
        self.phase = LoadPhase::Loading;
    }

    /// Replace the whole collection with a fresh snapshot (already ordered
    /// by `updated_at` descending) and become ready.
    pub fn finish_load(&mut self, tickets: Vec<Ticket>) {
        self.tickets = dedup_by_id(tickets);
        self.watermarks = self
            .tickets
            .iter()
            .map(|t| (t.id.clone(), t.updated_at))
            .collect();
        self.phase = LoadPhase::Ready;
    }

    /// Keep whatever is loaded and surface the failure
    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.phase = LoadPhase::Error(message.into());
    }

    // ===== Change feed transitions =====

    pub fn apply_ticket_insert(&mut self, ticket: Ticket) -> Applied {
        if self.position(&ticket.id).is_some() {
            return Applied::Duplicate;
        }
        self.advance_watermark(&ticket);
        self.tickets.insert(0, ticket);
        self.pulse.raise();
        Applied::Applied
    }

    /// Replace (or add) the entry and move it to the front, unless a newer
    /// remote version of the same ticket was already applied.
    pub fn apply_ticket_update(&mut self, ticket: Ticket) -> Applied {
        if self
            .watermarks
            .get(&ticket.id)
            .is_some_and(|seen| ticket.updated_at < *seen)
        {
            return Applied::Stale;
        }

        if let Some(index) = self.position(&ticket.id) {
            self.tickets.remove(index);
        }
        self.advance_watermark(&ticket);
        self.tickets.insert(0, ticket);
        self.pulse.raise();
        Applied::Applied
    }

    /// Drop the ticket and reclaim its id from the overlay
    pub fn apply_ticket_delete(&mut self, ticket_id: &str) -> Applied {
        self.archived.remove(ticket_id);
        self.watermarks.remove(ticket_id);
        match self.position(ticket_id) {
            Some(index) => {
                self.tickets.remove(index);
                Applied::Applied
            }
            None => Applied::UnknownTicket,
        }
    }

    pub fn apply_message_insert(&mut self, message: Message, now: DateTime<Utc>) -> Applied {
        let Some(index) = self.position(&message.ticket_id) else {
            return Applied::UnknownTicket;
        };
        if self.tickets[index].has_message(&message.id) {
            return Applied::Duplicate;
        }

        let mut ticket = self.tickets.remove(index);
        ticket.messages.push(message);
        ticket.sort_messages();
        ticket.message_count += 1;
        ticket.updated_at = now;
        self.tickets.insert(0, ticket);
        self.pulse.raise();
        Applied::Applied
    }

    // ===== Confirmed write-through patches =====

    /// Remove after a confirmed remote delete
    pub fn remove_ticket(&mut self, ticket_id: &str) -> bool {
        self.apply_ticket_delete(ticket_id) == Applied::Applied
    }

    /// Empty collection, overlay and pulse after a confirmed delete-all
    pub fn clear(&mut self) {
        self.tickets.clear();
        self.archived.clear();
        self.watermarks.clear();
        self.pulse.clear();
    }

    /// Field-only patch: neither `updated_at` nor position changes.
    pub fn patch_status(&mut self, ticket_id: &str, status: TicketStatus) -> bool {
        match self.tickets.iter_mut().find(|t| t.id == ticket_id) {
            Some(ticket) => {
                ticket.status = status;
                true
            }
            None => false,
        }
    }

    // ===== Archived overlay =====

    pub fn archive(&mut self, ticket_id: &str) {
        self.archived.insert(ticket_id.to_string());
    }

    pub fn archive_all(&mut self) {
        self.archived
            .extend(self.tickets.iter().map(|t| t.id.clone()));
    }

    pub fn restore(&mut self, ticket_id: &str) -> bool {
        self.archived.remove(ticket_id)
    }

    pub fn clear_archived(&mut self) {
        self.archived.clear();
    }

    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    pub fn is_archived(&self, ticket_id: &str) -> bool {
        self.archived.contains(ticket_id)
    }

    // ===== Views =====

    /// Full collection in recency order, archived tickets included
    pub fn all_tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn get(&self, ticket_id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    /// Collection minus the overlay, computed on every call
    pub fn visible_tickets(&self) -> Vec<Ticket> {
        self.tickets
            .iter()
            .filter(|t| !self.is_archived(&t.id))
            .cloned()
            .collect()
    }

    /// Visible tickets grouped in fixed category order; empty groups omitted
    pub fn visible_by_category(&self) -> Vec<(TicketCategory, Vec<Ticket>)> {
        let visible = self.visible_tickets();
        TicketCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let group: Vec<Ticket> = visible
                    .iter()
                    .filter(|t| t.category == category)
                    .cloned()
                    .collect();
                (!group.is_empty()).then_some((category, group))
            })
            .collect()
    }

    pub fn has_new_update(&self) -> bool {
        self.pulse.is_active()
    }

    pub fn pulse_expires_at(&self) -> Option<Instant> {
        self.pulse.expires_at()
    }

    fn position(&self, ticket_id: &str) -> Option<usize> {
        self.tickets.iter().position(|t| t.id == ticket_id)
    }

    fn advance_watermark(&mut self, ticket: &Ticket) {
        let seen = self
            .watermarks
            .entry(ticket.id.clone())
            .or_insert(ticket.updated_at);
        if ticket.updated_at > *seen {
            *seen = ticket.updated_at;
        }
    }
}

fn dedup_by_id(tickets: Vec<Ticket>) -> Vec<Ticket> {
    let mut seen = HashSet::new();
    tickets
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}
