// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tally - a token usage meter for LLM chat pipelines.
//!
//! This is the CLI entry point over the persisted usage ledger.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tally_core::ImportStrategy;
use tracing_subscriber::EnvFilter;

mod status;
mod transfer;

/// Tally - a token usage meter for LLM chat pipelines.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show usage and cost totals from the persisted ledger.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Write a usage export file.
    Export {
        /// Output path (stdout when omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge a usage export file into the ledger.
    Import {
        /// Export file to import.
        file: PathBuf,
        /// Merge strategy: `add` (default, re-import doubles counts) or
        /// `replace`.
        #[arg(long)]
        strategy: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match tally_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tally_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.meter.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Export { out }) => transfer::run_export(&config, out.as_deref()).await,
        Some(Commands::Import { file, strategy }) => {
            let strategy = match strategy {
                Some(raw) => match ImportStrategy::from_str(&raw) {
                    Ok(strategy) => strategy,
                    Err(_) => {
                        eprintln!("tally: unknown strategy `{raw}` (use `add` or `replace`)");
                        std::process::exit(2);
                    }
                },
                None => config.import.default_strategy,
            };
            transfer::run_import(&config, &file, strategy).await
        }
        None => {
            println!("tally: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("tally: {e}");
        std::process::exit(1);
    }
}
