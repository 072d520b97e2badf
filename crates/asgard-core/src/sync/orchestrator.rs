//! Runs collection passes across the configured collections.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use super::collection::{CollectionSynchronizer, PassOptions};
use crate::config::SettingsProvider;
use crate::db::RunLog;
use crate::models::{Collection, SyncRunResult};
use crate::state::SyncStatus;

/// Message of a run rejected because another one is in flight.
pub const ALREADY_RUNNING: &str = "Sync already in progress";

/// Options for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub pull: bool,
    pub push: bool,
    /// Restrict the run to these collections instead of the configured list.
    pub collections: Option<Vec<Collection>>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pull: true,
            push: true,
            collections: None,
        }
    }
}

impl SyncOptions {
    pub fn pull_only() -> Self {
        Self {
            push: false,
            ..Self::default()
        }
    }

    pub fn push_only() -> Self {
        Self {
            pull: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = Some(collections);
        self
    }

    const fn pass(&self) -> PassOptions {
        PassOptions {
            pull: self.pull,
            push: self.push,
        }
    }
}

/// Clears the running flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives [`CollectionSynchronizer`] over every configured collection.
///
/// At most one run is in flight per orchestrator; a concurrent call is
/// rejected rather than queued. `sync_all` always returns a result.
pub struct SyncOrchestrator {
    synchronizer: CollectionSynchronizer,
    settings: Arc<dyn SettingsProvider>,
    run_log: Arc<dyn RunLog>,
    collections: Vec<Collection>,
    running: AtomicBool,
    status: watch::Sender<SyncStatus>,
    last_completed_at: Mutex<Option<DateTime<Utc>>>,
}

impl SyncOrchestrator {
    pub fn new(
        synchronizer: CollectionSynchronizer,
        settings: Arc<dyn SettingsProvider>,
        run_log: Arc<dyn RunLog>,
        collections: Vec<Collection>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            synchronizer,
            settings,
            run_log,
            collections,
            running: AtomicBool::new(false),
            status,
            last_completed_at: Mutex::new(None),
        }
    }

    /// Current status, without waiting.
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Observe status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Report a failed health check.
    pub fn mark_offline(&self) {
        self.status.send_replace(SyncStatus::Offline);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// When the last accepted run finished, if any finished in this process.
    pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        self.last_completed_at
            .lock()
            .ok()
            .and_then(|completed| *completed)
    }

    /// Carry over the finish time of a run persisted by an earlier process.
    pub fn restore_last_completed_at(&self, finished_at: DateTime<Utc>) {
        if let Ok(mut completed) = self.last_completed_at.lock() {
            if completed.map_or(true, |current| current < finished_at) {
                *completed = Some(finished_at);
            }
        }
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub const fn synchronizer(&self) -> &CollectionSynchronizer {
        &self.synchronizer
    }

    /// Run one sync across all (or the selected) collections.
    pub async fn sync_all(&self, options: SyncOptions) -> SyncRunResult {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::debug!("Sync requested while another run is in progress");
            return SyncRunResult::rejected(ALREADY_RUNNING);
        };

        self.status.send_replace(SyncStatus::Syncing);
        let mut result = SyncRunResult::begin(Utc::now());

        match self.check_settings().await {
            Ok(()) => self.run_collections(&options, &mut result).await,
            Err(error) => result.error = Some(error),
        }

        let finished_at = Utc::now();
        result.finish(finished_at);
        self.finish_run(&result, finished_at).await;
        result
    }

    async fn check_settings(&self) -> Result<(), String> {
        let settings = self
            .settings
            .current()
            .await
            .map_err(|error| error.to_string())?;
        settings.base_url().map_err(|error| error.to_string())?;
        Ok(())
    }

    async fn run_collections(&self, options: &SyncOptions, result: &mut SyncRunResult) {
        let mut collections = options
            .collections
            .clone()
            .unwrap_or_else(|| self.collections.clone());
        // A repeated name would be synced and counted twice
        let mut seen = HashSet::new();
        collections.retain(|collection| seen.insert(collection.clone()));
        let pass = options.pass();
        let concurrency = self.synchronizer.config().concurrency.max(1);

        tracing::info!(
            collections = collections.len(),
            pull = pass.pull,
            push = pass.push,
            "Starting sync run"
        );

        if concurrency == 1 {
            for collection in &collections {
                result.record(self.synchronizer.sync_collection(collection, pass).await);
            }
            return;
        }

        let mut passes = stream::iter(collections.iter())
            .map(|collection| self.synchronizer.sync_collection(collection, pass))
            .buffer_unordered(concurrency);
        while let Some(pass_result) = passes.next().await {
            result.record(pass_result);
        }
    }

    async fn finish_run(&self, result: &SyncRunResult, finished_at: DateTime<Utc>) {
        if let Ok(mut completed) = self.last_completed_at.lock() {
            *completed = Some(finished_at);
        }

        if let Err(error) = self.run_log.save_run_result(result).await {
            tracing::warn!("Failed to persist sync result: {error}");
        }

        let status = if result.success {
            SyncStatus::Success
        } else {
            SyncStatus::Error
        };
        self.status.send_replace(status);

        if result.success {
            tracing::info!(
                pulled = result.total_pulled,
                pushed = result.total_pushed,
                conflicts = result.total_conflicts,
                "Sync run finished"
            );
        } else {
            tracing::warn!(
                errors = result.errors.len(),
                error = result.error.as_deref().unwrap_or_default(),
                "Sync run finished with errors"
            );
        }
    }
}
