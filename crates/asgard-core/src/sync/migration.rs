//! Full-snapshot export and import for provisioning and recovery.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::client::RemoteSync;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{Collection, Record};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Every record of every collection at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub collections: BTreeMap<String, Vec<Record>>,
}

impl Snapshot {
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Collections whose records were all written.
    #[serde(default)]
    pub written: Vec<Collection>,
    /// Failures, each prefixed with `"<collection>: "`.
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Read every collection from the local store.
///
/// A collection that cannot be read is exported as an empty list.
pub async fn export_snapshot(store: &dyn LocalStore, collections: &[Collection]) -> Snapshot {
    let mut exported = BTreeMap::new();
    for collection in collections {
        let records = match store.get_all(collection).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(collection = %collection, "Exporting empty collection after read failure: {error}");
                Vec::new()
            }
        };
        exported.insert(collection.to_string(), records);
    }

    Snapshot {
        version: SNAPSHOT_VERSION,
        exported_at: Utc::now(),
        collections: exported,
    }
}

pub fn render_snapshot_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn parse_snapshot(raw: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(raw)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// File name for a snapshot taken on `date`.
pub fn suggested_snapshot_file_name(date: NaiveDate) -> String {
    format!("asgard-migration-{}.json", date.format("%Y-%m-%d"))
}

/// Pull every record of every collection and overwrite the local copies.
///
/// No timestamps are compared. A failing collection is reported and the
/// remaining collections are still imported.
pub async fn import_from_server(
    remote: &dyn RemoteSync,
    store: &dyn LocalStore,
    collections: &[Collection],
) -> ImportReport {
    let mut report = ImportReport::default();
    for collection in collections {
        let records = match remote.pull(collection, None).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(collection = %collection, "Import failed: {error}");
                report.errors.push(format!("{collection}: {error}"));
                continue;
            }
        };
        write_collection(store, collection, &records, &mut report).await;
    }

    tracing::info!(
        imported = report.imported,
        errors = report.errors.len(),
        "Import from server finished"
    );
    report
}

/// Write a previously exported snapshot back into the local store.
///
/// Collections missing from `known` are reported instead of written.
pub async fn restore_snapshot(
    store: &dyn LocalStore,
    snapshot: &Snapshot,
    known: &[Collection],
) -> ImportReport {
    let mut report = ImportReport::default();
    for (name, records) in &snapshot.collections {
        let collection = match Collection::new(name.as_str()) {
            Ok(collection) if known.contains(&collection) => collection,
            _ => {
                report
                    .errors
                    .push(format!("{name}: unknown collection"));
                continue;
            }
        };
        write_collection(store, &collection, records, &mut report).await;
    }
    report
}

async fn write_collection(
    store: &dyn LocalStore,
    collection: &Collection,
    records: &[Record],
    report: &mut ImportReport,
) {
    for record in records {
        if let Err(error) = store.put(collection, record).await {
            tracing::warn!(collection = %collection, "Import stopped: {error}");
            report.errors.push(format!("{collection}: {error}"));
            return;
        }
        report.imported += 1;
    }
    report.written.push(collection.clone());
}
