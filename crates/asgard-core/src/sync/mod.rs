//! Offline-first synchronization between the local store and the CRM API.

mod client;
mod collection;
mod migration;
mod orchestrator;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HealthStatus, HttpSyncClient, RemoteSync};
pub use collection::{CollectionSynchronizer, PassOptions};
pub use migration::{
    export_snapshot, import_from_server, parse_snapshot, render_snapshot_json, restore_snapshot,
    suggested_snapshot_file_name, ImportReport, Snapshot, SNAPSHOT_VERSION,
};
pub use orchestrator::{SyncOptions, SyncOrchestrator, ALREADY_RUNNING};
pub use scheduler::{AutoSyncScheduler, SchedulerConfig, TickOutcome};
