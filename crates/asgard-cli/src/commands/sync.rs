use std::path::Path;

use asgard_core::{SyncOptions, SyncRunResult};

use crate::cli::SyncArgs;
use crate::commands::common::{format_run_lines, open_sync_service, parse_collections};
use crate::error::CliError;

pub async fn run_sync(args: SyncArgs, db_path: &Path) -> Result<(), CliError> {
    let service = open_sync_service(db_path).await?;
    let options = sync_options(&args, service.collections())?;

    let result = service.orchestrator().sync_all(options).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_run_lines(&result) {
            println!("{line}");
        }
    }

    ensure_success(&result)
}

pub fn sync_options(
    args: &SyncArgs,
    known: &[asgard_core::Collection],
) -> Result<SyncOptions, CliError> {
    let mut options = if args.pull_only {
        SyncOptions::pull_only()
    } else if args.push_only {
        SyncOptions::push_only()
    } else {
        SyncOptions::default()
    };
    if !args.collections.is_empty() {
        options = options.with_collections(parse_collections(&args.collections, known)?);
    }
    Ok(options)
}

pub fn ensure_success(result: &SyncRunResult) -> Result<(), CliError> {
    if result.success {
        return Ok(());
    }
    let reason = result.error.clone().unwrap_or_else(|| {
        let failed = result.failed_collections().count();
        format!("{failed} collection(s) failed")
    });
    Err(CliError::SyncFailed(reason))
}
