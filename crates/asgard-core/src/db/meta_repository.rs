//! Sync bookkeeping: per-collection cursors and the last run result

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::Connection;

use super::settings_repository::{get_setting, set_setting};
use crate::error::Result;
use crate::models::{Collection, SyncRunResult};
use crate::util::format_timestamp;

const LAST_RUN_KEY: &str = "last_sync_result";
const LAST_SUCCESS_KEY: &str = "last_successful_sync";

/// Per-collection "last successful sync" timestamps.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get_cursor(&self, collection: &Collection) -> Result<Option<DateTime<Utc>>>;

    /// Store a new cursor. A value older than the stored one is ignored.
    async fn set_cursor(&self, collection: &Collection, cursor: DateTime<Utc>) -> Result<()>;
}

/// Persisted summaries of past runs.
#[async_trait]
pub trait RunLog: Send + Sync {
    /// Record a finished run; successful runs also become the last success.
    async fn save_run_result(&self, result: &SyncRunResult) -> Result<()>;

    /// The last attempted run, successful or not.
    async fn last_run_result(&self) -> Result<Option<SyncRunResult>>;

    /// The last run that finished without errors.
    async fn last_successful_run(&self) -> Result<Option<SyncRunResult>>;
}

/// libSQL implementation of `CursorStore` and `RunLog`
#[derive(Clone)]
pub struct LibSqlMetaRepository {
    conn: Connection,
}

impl LibSqlMetaRepository {
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Forget the cursors of `collections` so their next pass starts from scratch.
    pub async fn reset_cursors(&self, collections: &[Collection]) -> Result<()> {
        for collection in collections {
            self.conn
                .execute(
                    "DELETE FROM sync_meta WHERE collection = ?",
                    [collection.as_str()],
                )
                .await?;
        }
        Ok(())
    }

    /// All stored cursors, ordered by collection name.
    pub async fn cursors(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT collection, last_sync FROM sync_meta ORDER BY collection",
                (),
            )
            .await?;

        let mut cursors = Vec::new();
        while let Some(row) = rows.next().await? {
            let collection: String = row.get(0)?;
            let raw: String = row.get(1)?;
            if let Some(cursor) = parse_cursor(&collection, &raw) {
                cursors.push((collection, cursor));
            }
        }
        Ok(cursors)
    }

    async fn load_run(&self, key: &str) -> Result<Option<SyncRunResult>> {
        let Some(value) = get_setting(&self.conn, key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&value)?))
    }
}

fn parse_cursor(collection: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(cursor) => Some(cursor.with_timezone(&Utc)),
        Err(error) => {
            // A full pull is the safe fallback
            tracing::warn!("Ignoring unreadable cursor for {collection}: {error}");
            None
        }
    }
}

#[async_trait]
impl CursorStore for LibSqlMetaRepository {
    async fn get_cursor(&self, collection: &Collection) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_sync FROM sync_meta WHERE collection = ?",
                [collection.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(parse_cursor(collection.as_str(), &raw))
            }
            None => Ok(None),
        }
    }

    async fn set_cursor(&self, collection: &Collection, cursor: DateTime<Utc>) -> Result<()> {
        // Fixed-width RFC 3339 strings compare in time order
        self.conn
            .execute(
                "INSERT INTO sync_meta (collection, last_sync, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(collection) DO UPDATE SET
                     last_sync = excluded.last_sync,
                     updated_at = excluded.updated_at
                 WHERE excluded.last_sync > sync_meta.last_sync",
                libsql::params![
                    collection.as_str(),
                    format_timestamp(cursor),
                    Utc::now().timestamp_millis()
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RunLog for LibSqlMetaRepository {
    async fn save_run_result(&self, result: &SyncRunResult) -> Result<()> {
        let value = serde_json::to_string(result)?;
        set_setting(&self.conn, LAST_RUN_KEY, &value).await?;
        if result.success {
            set_setting(&self.conn, LAST_SUCCESS_KEY, &value).await?;
        }
        Ok(())
    }

    async fn last_run_result(&self) -> Result<Option<SyncRunResult>> {
        self.load_run(LAST_RUN_KEY).await
    }

    async fn last_successful_run(&self) -> Result<Option<SyncRunResult>> {
        self.load_run(LAST_SUCCESS_KEY).await
    }
}
