//! Data models for Asgard sync

mod collection;
mod record;
mod run_result;
mod settings;

pub use collection::{Collection, DEFAULT_COLLECTIONS};
pub use record::{parse_timestamp, Record};
pub use run_result::{CollectionSyncResult, SyncRunResult};
pub use settings::{SyncSettings, DEFAULT_AUTO_SYNC_MINUTES, MAX_AUTO_SYNC_MINUTES};
