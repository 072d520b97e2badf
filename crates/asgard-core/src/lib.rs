//! asgard-core - Core library for Asgard sync
//!
//! Offline-first synchronization of CRM collections between a local libSQL
//! store and the central server: the record model, local bookkeeping, the
//! HTTP sync client, and the engine that reconciles the two sides.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Collection, CollectionSyncResult, Record, SyncRunResult, SyncSettings};
pub use services::{ServiceOptions, SyncService};
pub use state::SyncStatus;
pub use sync::{SyncOptions, SyncOrchestrator};
