//! Asgard CLI - operate the offline-first CRM sync from a terminal
//!
//! Manual syncs, settings, snapshots and a foreground autosync loop.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::autosync::run_autosync;
use crate::commands::collections::run_collections;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("asgard=info".parse().expect("Invalid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Sync(args)) => run_sync(args, &db_path).await?,
        Some(Commands::Status { json }) => run_status(json, &db_path).await?,
        Some(Commands::Config { command }) => run_config(command, &db_path).await?,
        Some(Commands::Collections { json }) => run_collections(json, &db_path).await?,
        Some(Commands::Export { output, stdout }) => {
            run_export(output.as_deref(), stdout, &db_path).await?;
        }
        Some(Commands::Import { from_file, yes }) => {
            run_import(from_file.as_deref(), yes, &db_path).await?;
        }
        Some(Commands::Autosync { initial_delay }) => {
            run_autosync(initial_delay, &db_path).await?;
        }
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
