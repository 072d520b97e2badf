use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] asgard_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Import overwrites local records. Re-run with --yes to continue.")]
    ImportNotConfirmed,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Import finished with {0} error(s)")]
    ImportFailed(usize),
    #[error(
        "Sync is not configured. Run `asgard config set --api-url <URL>` or set ASGARD_API_URL."
    )]
    SyncNotConfigured,
}
