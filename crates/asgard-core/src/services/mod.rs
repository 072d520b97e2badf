//! High-level services shared by front ends.

mod sync_service;

pub use sync_service::{CollectionSummary, ServiceOptions, SyncService};
