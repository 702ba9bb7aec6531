use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "heartbeam-cli", version, about = "HeartBEAM adherence status and reminders")]
struct Cli {
    /// SQLite database to use instead of the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Evaluate as of this RFC 3339 instant instead of now
    #[arg(long, global = true, value_parser = commands::parse_instant)]
    as_of: Option<DateTime<Utc>>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Participant adherence status
    Status {
        #[command(subcommand)]
        action: commands::status::StatusAction,
    },
    /// Reminder planning
    Reminders {
        #[command(subcommand)]
        action: commands::reminders::RemindersAction,
    },
    /// Study data management
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("heartbeam_core={0},heartbeam_cli={0}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = commands::Context::new(cli.db, cli.as_of);
    let result = match cli.command {
        Commands::Status { action } => commands::status::run(&ctx, action),
        Commands::Reminders { action } => commands::reminders::run(&ctx, action),
        Commands::Data { action } => commands::data::run(&ctx, action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
