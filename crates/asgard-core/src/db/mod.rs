//! Database layer for Asgard sync

mod connection;
mod meta_repository;
mod migrations;
mod record_store;
mod settings_repository;

pub use connection::Database;
pub use meta_repository::{CursorStore, LibSqlMetaRepository, RunLog};
pub use record_store::{LibSqlRecordStore, LocalStore};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
