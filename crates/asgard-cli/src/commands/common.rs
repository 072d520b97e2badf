use std::env;
use std::path::{Path, PathBuf};

use asgard_core::services::{CollectionSummary, ServiceOptions, SyncService};
use asgard_core::util::redact_secret;
use asgard_core::{Collection, SyncRunResult, SyncSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

/// Settings as shown to the operator, with the API key masked.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub auto_sync_minutes: u32,
}

impl From<&SyncSettings> for SettingsView {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            enabled: settings.enabled,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.as_deref().map(redact_secret),
            auto_sync_minutes: settings.interval_minutes(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionItem {
    pub collection: String,
    pub records: usize,
    pub cursor: Option<String>,
}

impl From<&CollectionSummary> for CollectionItem {
    fn from(summary: &CollectionSummary) -> Self {
        Self {
            collection: summary.collection.to_string(),
            records: summary.records,
            cursor: summary.cursor.map(asgard_core::util::format_timestamp),
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("ASGARD_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asgard")
        .join("asgard.db")
}

pub async fn open_service(db_path: &Path) -> Result<SyncService, CliError> {
    Ok(SyncService::open_path(db_path, ServiceOptions::default()).await?)
}

/// Open the service and make sure a server is configured.
pub async fn open_sync_service(db_path: &Path) -> Result<SyncService, CliError> {
    let service = open_service(db_path).await?;
    if !service.settings().await?.has_api_url() {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(service)
}

/// Map collection names given on the command line onto the configured list.
pub fn parse_collections(
    names: &[String],
    known: &[Collection],
) -> Result<Vec<Collection>, CliError> {
    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        let collection = known
            .iter()
            .find(|collection| collection.as_str() == name)
            .cloned()
            .ok_or_else(|| CliError::UnknownCollection(name.to_string()))?;
        if !collections.contains(&collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}

pub fn format_sync_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// One-line summary of a run, e.g. for `status`.
pub fn describe_run(result: &SyncRunResult, now: DateTime<Utc>) -> String {
    let when = result.finished_at.unwrap_or(result.started_at);
    let outcome = if result.success { "ok" } else { "failed" };
    format!(
        "{} ({}) {outcome}: pulled {}, pushed {}, conflicts {}",
        format_sync_timestamp(when),
        format_relative_time(when, now),
        result.total_pulled,
        result.total_pushed,
        result.total_conflicts,
    )
}

pub fn format_run_lines(result: &SyncRunResult) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = &result.error {
        lines.push(format!("Sync not started: {error}"));
        return lines;
    }

    for item in result.collections.values() {
        let marker = if item.is_success() { "ok" } else { "!!" };
        lines.push(format!(
            "{marker} {:<22} pulled {:>5}  pushed {:>5}  conflicts {:>4}",
            item.collection, item.pulled, item.pushed, item.conflicts
        ));
    }
    lines.push(format!(
        "Total: pulled {}, pushed {}, conflicts {}",
        result.total_pulled, result.total_pushed, result.total_conflicts
    ));
    for error in &result.errors {
        lines.push(format!("error: {error}"));
    }
    lines
}

pub fn format_collection_lines(items: &[CollectionItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{:<22} {:>7} records  cursor {}",
                item.collection,
                item.records,
                item.cursor.as_deref().unwrap_or("never")
            )
        })
        .collect()
}
