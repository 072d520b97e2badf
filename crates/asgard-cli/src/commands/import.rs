use std::path::Path;

use asgard_core::sync::{parse_snapshot, ImportReport};

use crate::commands::common::{open_service, open_sync_service};
use crate::error::CliError;

pub async fn run_import(
    from_file: Option<&Path>,
    confirmed: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ImportNotConfirmed);
    }

    let report = if let Some(path) = from_file {
        let raw = std::fs::read_to_string(path)?;
        let snapshot = parse_snapshot(&raw)?;
        let service = open_service(db_path).await?;
        service.restore_snapshot(&snapshot).await?
    } else {
        let service = open_sync_service(db_path).await?;
        service.import_from_server().await?
    };

    report_import(&report)
}

fn report_import(report: &ImportReport) -> Result<(), CliError> {
    println!("Imported {} record(s)", report.imported);
    for error in &report.errors {
        eprintln!("error: {error}");
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::ImportFailed(report.errors.len()))
    }
}
