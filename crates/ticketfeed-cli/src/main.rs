use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ticketfeed_cli::cli::{run_command, CliCommand, CliConfig};
use ticketfeed_cli::tracing_setup::init_tracing;
use ticketfeed_core::models::TicketStatus;
use ticketfeed_core::CoreConfig;

#[derive(Parser)]
#[command(name = "ticketfeed")]
#[command(about = "Live view and maintenance of the support ticket store")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (storeUrl, apiKey); overrides TICKETFEED_URL / TICKETFEED_KEY
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live grouped view, redrawn on every change
    Watch,

    /// List visible tickets, most recent first
    List,

    /// Show the audit trail of a ticket
    History {
        /// Ticket ID
        ticket_id: String,
        /// Print JSON instead of a timeline
        #[arg(long)]
        json: bool,
    },

    /// Delete a ticket (messages are removed with it)
    Delete {
        /// Ticket ID
        ticket_id: String,
    },

    /// Delete every ticket in the store
    DeleteAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Change a ticket's status
    SetStatus {
        /// Ticket ID
        ticket_id: String,
        /// open, pending, in_progress, resolved or closed
        status: TicketStatus,
    },

    /// Report load phase, feed state and event counters
    Status {
        /// Seconds to keep the feeds open before reporting
        #[arg(long, default_value_t = 0)]
        watch: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {:#}", e);
    }

    let config = load_config(&cli);

    let command = match cli.command {
        Some(Commands::Watch) => CliCommand::Watch,
        Some(Commands::List) => CliCommand::List,
        Some(Commands::History { ticket_id, json }) => CliCommand::History { ticket_id, json },
        Some(Commands::Delete { ticket_id }) => CliCommand::DeleteTicket { ticket_id },
        Some(Commands::DeleteAll { yes }) => {
            if !yes {
                eprintln!("Refusing to delete every ticket without --yes");
                std::process::exit(2);
            }
            CliCommand::DeleteAll
        }
        Some(Commands::SetStatus { ticket_id, status }) => {
            CliCommand::SetStatus { ticket_id, status }
        }
        Some(Commands::Status { watch }) => CliCommand::Status { watch_secs: watch },
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    match run_command(command, config, cli.pretty).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Environment first, then the config file (explicit path or the default location)
fn load_config(cli: &Cli) -> CoreConfig {
    let base = CoreConfig::from_env();
    let path = cli.config.clone().or_else(CliConfig::default_path);

    match path {
        Some(path) => match CliConfig::load(&path) {
            Ok(file) => file.apply(base),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        None => base,
    }
}
