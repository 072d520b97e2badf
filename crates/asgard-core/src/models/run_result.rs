//! Outcome of a collection pass and of a whole sync run

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Collection;

/// Counts for one collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSyncResult {
    pub collection: Collection,
    /// Remote records written to the local store.
    pub pulled: usize,
    /// Local records accepted by the server.
    pub pushed: usize,
    /// Remote records discarded because the local copy was newer.
    pub conflicts: usize,
    pub errors: Vec<String>,
}

impl CollectionSyncResult {
    pub const fn new(collection: Collection) -> Self {
        Self {
            collection,
            pulled: 0,
            pushed: 0,
            conflicts: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate result of one orchestrator run.
///
/// Created when the run starts, filled as collections finish, and persisted
/// once at the end. A persisted result is never modified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    /// Run-level failure that prevented any collection from being attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionSyncResult>,
    pub total_pulled: usize,
    pub total_pushed: usize,
    pub total_conflicts: usize,
    /// Collection errors, each prefixed with `"<collection>: "`.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SyncRunResult {
    /// Start a fresh, empty run.
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at,
            finished_at: None,
            success: false,
            error: None,
            collections: BTreeMap::new(),
            total_pulled: 0,
            total_pushed: 0,
            total_conflicts: 0,
            errors: Vec::new(),
        }
    }

    /// A run that never started any collection.
    pub fn rejected(error: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut result = Self::begin(now);
        result.finished_at = Some(now);
        result.error = Some(error.into());
        result
    }

    /// Fold one collection pass into the totals.
    pub fn record(&mut self, result: CollectionSyncResult) {
        self.total_pulled += result.pulled;
        self.total_pushed += result.pushed;
        self.total_conflicts += result.conflicts;
        self.errors.extend(
            result
                .errors
                .iter()
                .map(|error| format!("{}: {error}", result.collection)),
        );
        self.collections
            .insert(result.collection.to_string(), result);
    }

    /// Close the run; success means no run-level and no collection errors.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        self.success = self.error.is_none() && self.errors.is_empty();
    }

    /// Collections whose pass reported at least one error.
    pub fn failed_collections(&self) -> impl Iterator<Item = &CollectionSyncResult> {
        self.collections
            .values()
            .filter(|result| !result.is_success())
    }
}
