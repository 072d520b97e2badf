use std::path::Path;

use asgard_core::sync::HealthStatus;
use asgard_core::{SyncRunResult, SyncStatus};
use chrono::Utc;
use serde::Serialize;

use crate::commands::common::{describe_run, open_service, SettingsView};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub status: SyncStatus,
    pub health: HealthStatus,
    pub settings: SettingsView,
    pub last_run: Option<SyncRunResult>,
    pub last_successful_run: Option<SyncRunResult>,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let settings = service.settings().await?;
    let health = service.health().await;
    let last_run = service.last_run().await?;
    let last_successful_run = service.last_successful_run().await?;

    let report = StatusReport {
        db_path: db_path.display().to_string(),
        status: derive_status(&health, last_run.as_ref()),
        health,
        settings: SettingsView::from(&settings),
        last_run,
        last_successful_run,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

/// Status shown to the operator: connectivity first, then the last outcome.
pub fn derive_status(health: &HealthStatus, last_run: Option<&SyncRunResult>) -> SyncStatus {
    if !health.connected {
        return SyncStatus::Offline;
    }
    match last_run {
        Some(run) if run.success => SyncStatus::Success,
        Some(_) => SyncStatus::Error,
        None => SyncStatus::Idle,
    }
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let now = Utc::now();
    let settings = &report.settings;
    let mut lines = vec![
        format!("Status:    {}", report.status.label()),
        format!("Database:  {}", report.db_path),
        format!(
            "Server:    {}",
            settings.api_url.as_deref().unwrap_or("(not configured)")
        ),
        format!(
            "API key:   {}",
            settings.api_key.as_deref().unwrap_or("(none)")
        ),
        format!(
            "Autosync:  {} every {} min",
            if settings.enabled { "on" } else { "off" },
            settings.auto_sync_minutes
        ),
    ];
    if let Some(error) = &report.health.error {
        lines.push(format!("Health:    {error}"));
    }
    lines.push(format!(
        "Last run:  {}",
        report
            .last_run
            .as_ref()
            .map_or_else(|| "never".to_string(), |run| describe_run(run, now))
    ));
    lines.push(format!(
        "Last ok:   {}",
        report
            .last_successful_run
            .as_ref()
            .map_or_else(|| "never".to_string(), |run| describe_run(run, now))
    ));
    if let Some(run) = report.last_run.as_ref().filter(|run| !run.success) {
        if let Some(error) = &run.error {
            lines.push(format!("  error: {error}"));
        }
        for error in &run.errors {
            lines.push(format!("  error: {error}"));
        }
    }
    lines
}
