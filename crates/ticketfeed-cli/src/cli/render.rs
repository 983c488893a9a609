use std::fmt::Write;

use ticketfeed_core::models::{HistoryEntry, Ticket, TicketCategory};
use ticketfeed_core::{LoadPhase, TicketEngine};

/// Snapshot of everything the grouped board shows
#[derive(Debug, Clone)]
pub struct BoardView {
    pub phase: LoadPhase,
    pub groups: Vec<(TicketCategory, Vec<Ticket>)>,
    pub archived_count: usize,
    pub new_update: bool,
}

impl BoardView {
    pub fn capture(engine: &TicketEngine) -> Self {
        Self {
            phase: engine.phase(),
            groups: engine.visible_by_category(),
            archived_count: engine.archived_count(),
            new_update: engine.has_new_update(),
        }
    }

    fn visible_count(&self) -> usize {
        self.groups.iter().map(|(_, tickets)| tickets.len()).sum()
    }
}

pub fn render_board(view: &BoardView) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "Tickets: {} visible, {} archived",
        view.visible_count(),
        view.archived_count
    );
    if view.new_update {
        out.push_str("  * new update");
    }
    out.push('\n');
    if view.phase == LoadPhase::Ready && view.groups.is_empty() {
        out.push_str("No tickets\n");
    }

    match &view.phase {
        LoadPhase::Loading => {
            out.push_str("Loading tickets...\n");
            return out;
        }
        LoadPhase::Error(message) => {
            let _ = writeln!(out, "Error: {message}");
            return out;
        }
        LoadPhase::Ready => {}
    }

    for (category, tickets) in &view.groups {
        let _ = writeln!(out, "\n{} ({})", category.heading(), tickets.len());
        for ticket in tickets {
            out.push_str(&ticket_line(ticket));
            out.push('\n');
        }
    }
    out
}

fn ticket_line(ticket: &Ticket) -> String {
    let mut line = format!(
        "  [{}] {} ({} msgs, updated {})",
        ticket.status,
        ticket.title,
        ticket.message_count,
        ticket.updated_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(channel) = &ticket.channel_name {
        let _ = write!(line, " #{channel}");
    }
    if let Some(last) = ticket.last_message() {
        let _ = write!(line, " last: {}: {}", last.user_name, preview(&last.text, 60));
    }
    line
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{cut}...")
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No history\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = write!(
            out,
            "{}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.describe()
        );
        if let Some(by) = &entry.changed_by {
            let _ = write!(out, " by {by}");
        }
        out.push('\n');
    }
    out
}
