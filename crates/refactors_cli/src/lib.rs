//! Command-line surface for the refactor ledger.
//!
//! Host applications embed this crate with their own [`RefactorRegistry`]; the bundled
//! `refactor` binary ships an empty one and is mostly useful for `install`, `reset` and `status`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::debug;
use refactors_core::{
    ConsoleReporter, LogReporter, RefactorRegistry, RefactorReporter, RefactorStatus, status_for,
};
use refactors_store::{RefactorLedgerApi, Refactorer, open_ledger};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run and track data refactors alongside migrations")]
pub struct Cli {
    /// Directory holding refactors.json and the default sqlite ledger.
    #[arg(long, global = true, default_value = ".refactors")]
    pub datastore: PathBuf,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the refactor table if it does not exist yet.
    Install,
    /// Remove every ledger record.
    Reset,
    /// Show which refactors have run, with their migration and batch.
    Status,
    /// Run a single refactor outside of any migration.
    Run(RunArgs),
}

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct RunArgs {
    /// Registered refactor name (its fully-qualified type name).
    #[arg(long)]
    pub class: String,
    /// Run `down` instead of `up`.
    #[arg(long, default_value_t = false)]
    pub rollback: bool,
    /// Send progress lines to the log instead of stdout.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

pub async fn run(cli: Cli, registry: RefactorRegistry) -> Result<()> {
    let ledger = open_ledger(&cli.datastore)
        .await
        .with_context(|| format!("open ledger in {}", cli.datastore.display()))?;
    debug!("refactors: datastore {}", cli.datastore.display());

    match cli.command {
        Command::Install => {
            if ledger.repository_exists().await? {
                println!("Refactor table already exists.");
                return Ok(());
            }
            ledger.create_repository().await?;
            println!("Refactor table created successfully.");
        }
        Command::Reset => {
            if !ledger.repository_exists().await? {
                println!("Refactor table does not exist, nothing to reset.");
                return Ok(());
            }
            let removed = ledger.reset().await?;
            debug!("refactors: reset removed {removed} records");
            println!("Refactor table reset successful.");
        }
        Command::Status => {
            let available = ledger.available_refactor_units(&registry)?;
            if available.is_empty() {
                bail!("No refactors found");
            }
            let runs = ledger.get_run().await?;
            print!("{}", render_status_table(&status_for(&runs, &available)));
        }
        Command::Run(args) => {
            let reporter: Arc<dyn RefactorReporter> = if args.quiet {
                Arc::new(LogReporter)
            } else {
                Arc::new(ConsoleReporter)
            };
            let refactorer = Refactorer::new(registry, ledger).with_reporter(reporter);
            refactorer.run(&args.class, args.rollback).await?;
        }
    }
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|err| anyhow!("install log subscriber: {err}"))
}

pub fn render_status_table(rows: &[RefactorStatus]) -> String {
    let header = ["Ran?", "Refactor", "Migration", "Batch"];
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|row| {
            let ran = if row.ran { "Yes" } else { "No" };
            [
                ran.to_string(),
                row.refactor.clone(),
                row.migration.clone().unwrap_or_else(|| "-".to_string()),
                row.batch.map(|batch| batch.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let border = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{border}+\n");
    let line = |row: &[&str]| {
        let inner = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!(" {cell:<width$} "))
            .collect::<Vec<_>>()
            .join("|");
        format!("|{inner}|\n")
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&line(&header));
    out.push_str(&border);
    for row in &cells {
        let row: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&row));
    }
    out.push_str(&border);
    out
}
