use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use ticketfeed_core::models::{Ticket, TicketStatus};
use ticketfeed_core::stats::FeedStats;
use ticketfeed_core::{
    CoreConfig, EngineError, EngineRuntime, HttpRemoteStore, LoadPhase, RemoteStore, TicketEngine,
};
use tracing::info;

use super::render::{render_board, render_history, BoardView};

/// Command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Live grouped view until interrupted
    Watch,
    /// Visible tickets, most recent first
    List,
    /// Audit trail of one ticket
    History { ticket_id: String, json: bool },
    DeleteTicket { ticket_id: String },
    DeleteAll,
    SetStatus { ticket_id: String, status: TicketStatus },
    /// Load state, feed state and event counters after a short watch
    Status { watch_secs: u64 },
}

/// Outcome printed for one-shot commands
#[derive(Debug, Serialize)]
struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

impl Response {
    fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    fn failure(err: &EngineError) -> Self {
        let code = match err {
            EngineError::Load(_) => "load_failed",
            EngineError::Write { .. } => "write_failed",
            EngineError::PartialBatch { .. } => "partial_batch",
        };
        Self {
            result: None,
            error: Some(ErrorInfo {
                code,
                message: err.to_string(),
            }),
        }
    }
}

/// Run one command against the remote store described by `config`.
///
/// Returns whether the command succeeded; transport and engine failures are
/// printed as a JSON error response rather than propagated.
pub async fn run_command(command: CliCommand, config: CoreConfig, pretty: bool) -> Result<bool> {
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::from_config(&config));

    match command {
        CliCommand::Watch => {
            watch(EngineRuntime::start(remote, config)).await?;
            Ok(true)
        }
        CliCommand::History { ticket_id, json } => {
            let engine = TicketEngine::new(remote, config);
            let entries = engine
                .ticket_history(&ticket_id)
                .await
                .with_context(|| format!("Failed to fetch history for {ticket_id}"))?;
            if json {
                print_json(&Response::success(serde_json::to_value(&entries)?), pretty)?;
            } else {
                print!("{}", render_history(&entries));
            }
            Ok(true)
        }
        CliCommand::Status { watch_secs } => {
            let runtime = EngineRuntime::start(remote, config);
            let engine = runtime.engine();
            let phase = engine.wait_until_loaded().await;
            tokio::time::sleep(std::time::Duration::from_secs(watch_secs)).await;

            let feeds: Vec<Value> = runtime
                .feed_status()
                .into_iter()
                .map(|(table, status)| json!({ "table": table.table_name(), "status": format!("{status:?}") }))
                .collect();
            let result = json!({
                "phase": phase_json(&phase),
                "ticket_count": engine.all_tickets().len(),
                "visible_count": engine.visible_tickets().len(),
                "feeds": feeds,
                "events": stats_json(&engine.stats()),
            });
            runtime.shutdown().await;
            print_json(&Response::success(result), pretty)?;
            Ok(matches!(phase, LoadPhase::Ready))
        }
        CliCommand::List => {
            let engine = TicketEngine::new(remote, config);
            let outcome = engine.refetch().await.map(|()| tickets_json(&engine.visible_tickets()));
            respond(outcome, pretty)
        }
        CliCommand::DeleteTicket { ticket_id } => {
            let engine = TicketEngine::new(remote, config);
            let outcome = engine
                .delete_ticket(&ticket_id)
                .await
                .map(|()| json!({ "deleted": ticket_id }));
            respond(outcome, pretty)
        }
        CliCommand::DeleteAll => {
            let engine = TicketEngine::new(remote, config);
            let outcome = engine
                .delete_all_tickets()
                .await
                .map(|()| json!({ "deleted_all": true }));
            if let Err(EngineError::PartialBatch {
                deleted, remaining, ..
            }) = &outcome
            {
                eprintln!(
                    "Deleted {} tickets before failing; {} remain",
                    deleted.len(),
                    remaining.len()
                );
            }
            respond(outcome, pretty)
        }
        CliCommand::SetStatus { ticket_id, status } => {
            let engine = TicketEngine::new(remote, config);
            let outcome = engine
                .update_ticket_status(&ticket_id, status)
                .await
                .map(|()| json!({ "id": ticket_id, "status": status }));
            respond(outcome, pretty)
        }
    }
}

/// Redraw on every engine revision and whenever the pulse runs out, until
/// Ctrl-C.
async fn watch(runtime: EngineRuntime) -> Result<()> {
    let engine = runtime.engine();
    let mut changes = engine.changes();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        draw(&engine)?;
        let pulse_expiry = engine.pulse_expires_at();

        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = async {
                match pulse_expiry {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {}
        }
    }

    info!("watch interrupted");
    runtime.shutdown().await;
    Ok(())
}

fn draw(engine: &TicketEngine) -> Result<()> {
    let frame = render_board(&BoardView::capture(engine));
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\x1b[2J\x1b[H{frame}")?;
    stdout.flush()?;
    Ok(())
}

fn respond(outcome: Result<Value, EngineError>, pretty: bool) -> Result<bool> {
    let response = match &outcome {
        Ok(result) => Response::success(result.clone()),
        Err(err) => Response::failure(err),
    };
    print_json(&response, pretty)?;
    Ok(outcome.is_ok())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn tickets_json(tickets: &[Ticket]) -> Value {
    tickets
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "title": t.title,
                "category": t.category,
                "status": t.status,
                "channel_name": t.channel_name,
                "message_count": t.message_count,
                "updated_at": t.updated_at,
            })
        })
        .collect()
}

fn phase_json(phase: &LoadPhase) -> Value {
    match phase {
        LoadPhase::Loading => json!({ "state": "loading" }),
        LoadPhase::Ready => json!({ "state": "ready" }),
        LoadPhase::Error(message) => json!({ "state": "error", "message": message }),
    }
}

fn stats_json(stats: &FeedStats) -> Value {
    let by_event: Vec<Value> = stats
        .events_by_count()
        .into_iter()
        .map(|((entity, op), count)| {
            json!({ "entity": entity.as_str(), "op": op.as_str(), "count": count })
        })
        .collect();
    json!({
        "total": stats.total,
        "applied": stats.applied,
        "duplicates": stats.duplicates,
        "stale": stats.stale,
        "orphaned": stats.orphaned,
        "failed": stats.failed,
        "ignored": stats.ignored,
        "by_event": by_event,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ticketfeed_core::{RemoteError, WriteOp};

    use super::*;

    #[test]
    fn test_failure_codes() {
        let load = EngineError::Load(RemoteError::Timeout(Duration::from_secs(10)));
        let response = serde_json::to_value(Response::failure(&load)).unwrap();
        assert_eq!(response["error"]["code"], "load_failed");
        assert!(response.get("result").is_none());

        let partial = EngineError::PartialBatch {
            deleted: vec!["a".into()],
            remaining: vec!["b".into(), "c".into()],
            source: RemoteError::Status {
                status: 500,
                body: String::new(),
            },
        };
        let response = serde_json::to_value(Response::failure(&partial)).unwrap();
        assert_eq!(response["error"]["code"], "partial_batch");

        let write = EngineError::Write {
            op: WriteOp::DeleteTicket,
            source: RemoteError::NotConfigured("TICKETFEED_URL".into()),
        };
        let response = serde_json::to_value(Response::failure(&write)).unwrap();
        assert_eq!(response["error"]["code"], "write_failed");
    }

    #[test]
    fn test_phase_json() {
        assert_eq!(phase_json(&LoadPhase::Ready), json!({ "state": "ready" }));
        assert_eq!(
            phase_json(&LoadPhase::Error("boom".into())),
            json!({ "state": "error", "message": "boom" })
        );
    }

    #[test]
    fn test_stats_json_counts() {
        let stats = FeedStats {
            total: 3,
            applied: 2,
            ignored: 1,
            ..FeedStats::default()
        };
        let value = stats_json(&stats);
        assert_eq!(value["total"], 3);
        assert_eq!(value["applied"], 2);
        assert_eq!(value["by_event"], json!([]));
    }

    #[tokio::test]
    async fn test_list_without_configuration_reports_load_failure() {
        let ok = run_command(CliCommand::List, CoreConfig::default(), false)
            .await
            .unwrap();
        assert!(!ok);
    }
}
