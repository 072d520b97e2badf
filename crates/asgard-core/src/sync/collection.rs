//! Synchronization of a single collection.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::client::RemoteSync;
use crate::config::EngineConfig;
use crate::db::{CursorStore, LocalStore};
use crate::error::{Error, Result};
use crate::models::{Collection, CollectionSyncResult, Record};

/// Which phases of a pass run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub pull: bool,
    pub push: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            pull: true,
            push: true,
        }
    }
}

/// Pulls, reconciles and pushes one collection.
///
/// A pass reads the collection cursor, applies remote changes with
/// last-writer-wins (the server wins ties), pushes local changes made after
/// the cursor, and then moves the cursor to the moment the pass started.
/// Any failure ends the pass and leaves the cursor where it was.
#[derive(Clone)]
pub struct CollectionSynchronizer {
    remote: Arc<dyn RemoteSync>,
    store: Arc<dyn LocalStore>,
    cursors: Arc<dyn CursorStore>,
    config: EngineConfig,
}

impl CollectionSynchronizer {
    pub fn new(
        remote: Arc<dyn RemoteSync>,
        store: Arc<dyn LocalStore>,
        cursors: Arc<dyn CursorStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            remote,
            store,
            cursors,
            config,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSync> {
        &self.remote
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one pass. Errors are reported in the result, never returned.
    pub async fn sync_collection(
        &self,
        collection: &Collection,
        options: PassOptions,
    ) -> CollectionSyncResult {
        let started_at = Utc::now();
        let mut result = CollectionSyncResult::new(collection.clone());

        match self
            .run_pass(collection, options, started_at, &mut result)
            .await
        {
            Ok(()) => tracing::debug!(
                collection = %collection,
                pulled = result.pulled,
                pushed = result.pushed,
                conflicts = result.conflicts,
                "Collection synced"
            ),
            Err(error) => {
                tracing::warn!(collection = %collection, "Collection sync failed: {error}");
                result.errors.push(error.to_string());
            }
        }

        result
    }

    async fn run_pass(
        &self,
        collection: &Collection,
        options: PassOptions,
        started_at: DateTime<Utc>,
        result: &mut CollectionSyncResult,
    ) -> Result<()> {
        let since = self.cursors.get_cursor(collection).await?;

        if options.pull {
            let remote = self.call(self.remote.pull(collection, since)).await?;
            self.apply_remote(collection, remote, result).await?;
        }

        if options.push {
            let changes = self.local_changes(collection, since).await?;
            result.pushed = self.push_changes(collection, &changes).await?;
        }

        if options.pull || options.push {
            self.cursors.set_cursor(collection, started_at).await?;
        }
        Ok(())
    }

    /// Apply pulled records, counting applied records and conflicts.
    async fn apply_remote(
        &self,
        collection: &Collection,
        remote: Vec<Record>,
        result: &mut CollectionSyncResult,
    ) -> Result<()> {
        for incoming in remote {
            let Some(id) = incoming.id_key() else {
                tracing::warn!(collection = %collection, "Skipping remote record without id");
                continue;
            };

            let remote_wins = match self.store.get(collection, &id).await? {
                None => true,
                Some(local) => incoming.timestamp() >= local.timestamp(),
            };

            if remote_wins {
                self.store.put(collection, &incoming).await?;
                result.pulled += 1;
            } else {
                tracing::debug!(collection = %collection, id = %id, "Local record is newer, keeping it");
                result.conflicts += 1;
            }
        }
        Ok(())
    }

    /// Local records changed strictly after the cursor (all of them without one).
    async fn local_changes(
        &self,
        collection: &Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>> {
        let records = self.store.get_all(collection).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.changed_since(since))
            .collect())
    }

    async fn push_changes(&self, collection: &Collection, changes: &[Record]) -> Result<usize> {
        let mut pushed = 0;
        for batch in changes.chunks(self.config.push_batch_size.max(1)) {
            pushed += self.call(self.remote.push(collection, batch)).await?;
        }
        Ok(pushed)
    }

    async fn call<T>(&self, future: impl Future<Output = Result<T>> + Send) -> Result<T> {
        tokio::time::timeout(self.config.call_timeout, future)
            .await
            .map_err(|_| Error::Timeout(self.config.call_timeout))?
    }
}
