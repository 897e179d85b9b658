//! Tally CLI
//!
//! Command-line interface for the Tally ledger.
//!
//! # Commands
//!
//! - `add` - Record a transaction
//! - `list` - List transactions (optionally with a monthly summary)
//! - `delete` - Mark a transaction deleted
//! - `sync` - Run one push+pull cycle against the remote store
//! - `status` - Show remote connection health
//!
//! The remote endpoint is configured via the `TALLY_REMOTE_URL` and
//! `TALLY_REMOTE_TOKEN` environment variables.

mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_core::TransactionKind;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Tally command-line ledger tools.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local ledger database
    #[arg(global = true, long, default_value = "tally.db")]
    db: PathBuf,

    /// User whose ledger to operate on
    #[arg(global = true, short, long, default_value = "local")]
    user: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a transaction
    Add {
        /// Amount
        #[arg(short, long)]
        amount: f64,

        /// income or expense
        #[arg(short, long, default_value = "expense")]
        kind: TransactionKind,

        /// Category label
        #[arg(short, long)]
        category: String,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,

        /// ISO 4217 currency code
        #[arg(long, default_value = "USD")]
        currency: String,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List transactions, newest first
    List {
        /// Maximum rows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Also print a summary for the given month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Mark a transaction deleted
    Delete {
        /// Transaction id
        id: Uuid,
    },

    /// Run one sync cycle against the remote store
    Sync,

    /// Show remote connection health
    Status,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Add {
            amount,
            kind,
            category,
            note,
            currency,
            date,
        } => {
            commands::add::run(&cli.db, &cli.user, amount, kind, &category, note, &currency, date)?;
        }
        Commands::List { limit, month } => {
            commands::list::run(&cli.db, &cli.user, limit, month.as_deref())?;
        }
        Commands::Delete { id } => {
            commands::delete::run(&cli.db, &cli.user, id)?;
        }
        Commands::Sync => {
            commands::sync::run(&cli.db, &cli.user).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Version => {
            println!("Tally CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
