//! Wiring of the local database, the HTTP client and the sync engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{ClientOptions, EngineConfig, SettingsProvider, StoredSettings};
use crate::db::{
    Database, LibSqlMetaRepository, LibSqlRecordStore, LibSqlSettingsRepository,
    LocalStore, RunLog, SettingsRepository,
};
use crate::models::{Collection, SyncRunResult, SyncSettings};
use crate::sync::{
    export_snapshot, import_from_server, restore_snapshot, AutoSyncScheduler,
    CollectionSynchronizer, HealthStatus, HttpSyncClient, ImportReport, RemoteSync,
    SchedulerConfig, Snapshot, SyncOrchestrator,
};
use crate::Result;

/// Knobs for [`SyncService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub engine: EngineConfig,
    pub client: ClientOptions,
    pub collections: Vec<Collection>,
    /// Apply `ASGARD_*` environment overrides to stored settings.
    pub use_env: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            client: ClientOptions::default(),
            collections: Collection::defaults(),
            use_env: true,
        }
    }
}

/// Local state of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub collection: Collection,
    pub records: usize,
    pub cursor: Option<DateTime<Utc>>,
}

/// One process-wide sync session over a local database.
pub struct SyncService {
    _db: Database,
    db_path: Option<PathBuf>,
    store: Arc<LibSqlRecordStore>,
    meta: Arc<LibSqlMetaRepository>,
    settings_repo: LibSqlSettingsRepository,
    settings: Arc<dyn SettingsProvider>,
    remote: Arc<dyn RemoteSync>,
    orchestrator: Arc<SyncOrchestrator>,
    collections: Vec<Collection>,
}

impl SyncService {
    /// Open the service on a database file, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>, options: ServiceOptions) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        let mut service = Self::build(db, options)?;
        service.db_path = Some(db_path);
        Ok(service)
    }

    /// Open an in-memory service (primarily for tests).
    pub async fn open_in_memory(options: ServiceOptions) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Self::build(db, options)
    }

    fn build(db: Database, options: ServiceOptions) -> Result<Self> {
        let conn = db.connection().clone();
        let store = Arc::new(LibSqlRecordStore::new(conn.clone()));
        let meta = Arc::new(LibSqlMetaRepository::new(conn.clone()));
        let settings_repo = LibSqlSettingsRepository::new(conn);

        let stored = StoredSettings::new(settings_repo.clone());
        let settings: Arc<dyn SettingsProvider> = if options.use_env {
            Arc::new(stored)
        } else {
            Arc::new(stored.without_env())
        };

        let remote: Arc<dyn RemoteSync> =
            Arc::new(HttpSyncClient::new(Arc::clone(&settings), options.client)?);
        let synchronizer = CollectionSynchronizer::new(
            Arc::clone(&remote),
            store.clone(),
            meta.clone(),
            options.engine,
        );
        let orchestrator = Arc::new(SyncOrchestrator::new(
            synchronizer,
            Arc::clone(&settings),
            meta.clone(),
            options.collections.clone(),
        ));

        Ok(Self {
            _db: db,
            db_path: None,
            store,
            meta,
            settings_repo,
            settings,
            remote,
            orchestrator,
            collections: options.collections,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn store(&self) -> &LibSqlRecordStore {
        &self.store
    }

    /// Build a scheduler bound to this service's orchestrator.
    ///
    /// The spacing clock starts from the last persisted run so a restart does
    /// not trigger an early sync.
    pub async fn scheduler(&self, config: SchedulerConfig) -> Result<AutoSyncScheduler> {
        if let Some(finished_at) = self
            .meta
            .last_run_result()
            .await?
            .and_then(|result| result.finished_at)
        {
            self.orchestrator.restore_last_completed_at(finished_at);
        }
        Ok(AutoSyncScheduler::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.settings),
            config,
        ))
    }

    /// Effective settings, including environment overrides.
    pub async fn settings(&self) -> Result<SyncSettings> {
        self.settings.current().await
    }

    /// Settings as persisted, without environment overrides.
    pub async fn stored_settings(&self) -> Result<SyncSettings> {
        self.settings_repo.load().await
    }

    pub async fn save_settings(&self, settings: &SyncSettings) -> Result<()> {
        self.settings_repo.save(settings).await
    }

    pub async fn health(&self) -> HealthStatus {
        self.remote.health().await
    }

    pub async fn last_run(&self) -> Result<Option<SyncRunResult>> {
        self.meta.last_run_result().await
    }

    pub async fn last_successful_run(&self) -> Result<Option<SyncRunResult>> {
        self.meta.last_successful_run().await
    }

    /// Record counts and cursors for every configured collection.
    pub async fn collection_summaries(&self) -> Result<Vec<CollectionSummary>> {
        let cursors = self.meta.cursors().await?.into_iter().collect::<HashMap<_, _>>();
        let mut summaries = Vec::with_capacity(self.collections.len());
        for collection in &self.collections {
            summaries.push(CollectionSummary {
                collection: collection.clone(),
                records: self.store.count(collection).await?,
                cursor: cursors.get(collection.as_str()).copied(),
            });
        }
        Ok(summaries)
    }

    pub async fn export_snapshot(&self) -> Snapshot {
        export_snapshot(self.store.as_ref(), &self.collections).await
    }

    /// Full pull of every collection. Cursors are left as they were.
    pub async fn import_from_server(&self) -> Result<ImportReport> {
        Ok(import_from_server(self.remote.as_ref(), self.store.as_ref(), &self.collections).await)
    }

    /// Write a snapshot file's records into the local store.
    ///
    /// Collections restored without errors lose their cursor so the next run
    /// pushes the restored records to the server.
    pub async fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<ImportReport> {
        let report = restore_snapshot(self.store.as_ref(), snapshot, &self.collections).await;
        self.meta.reset_cursors(&report.written).await?;
        Ok(report)
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "asgard.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale database file {}", path.display());
            }
        }

        Ok(())
    }
}
