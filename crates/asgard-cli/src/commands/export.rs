use std::path::{Path, PathBuf};

use asgard_core::sync::{render_snapshot_json, suggested_snapshot_file_name};
use chrono::Utc;

use crate::commands::common::open_service;
use crate::error::CliError;

pub async fn run_export(
    output_path: Option<&Path>,
    to_stdout: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let snapshot = service.export_snapshot().await;
    let rendered = render_snapshot_json(&snapshot)?;

    if to_stdout {
        println!("{rendered}");
        return Ok(());
    }

    let path = output_path.map_or_else(
        || PathBuf::from(suggested_snapshot_file_name(Utc::now().date_naive())),
        Path::to_path_buf,
    );
    std::fs::write(&path, rendered)?;
    tracing::info!(records = snapshot.record_count(), "Snapshot exported");
    println!("{}", path.display());
    Ok(())
}
