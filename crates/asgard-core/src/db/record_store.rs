//! Local record store

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // COUNT(*) is never negative

use async_trait::async_trait;
use libsql::{Connection, Value};

use crate::error::{Error, Result};
use crate::models::{Collection, Record};
use crate::util::format_timestamp;

/// Per-collection record storage keyed by id.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All records of a collection.
    async fn get_all(&self, collection: &Collection) -> Result<Vec<Record>>;

    /// One record by id.
    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Record>>;

    /// Insert or replace a record by its id.
    async fn put(&self, collection: &Collection, record: &Record) -> Result<()>;

    /// Remove a record; returns whether it existed.
    async fn delete(&self, collection: &Collection, id: &str) -> Result<bool>;

    /// Number of records in a collection.
    async fn count(&self, collection: &Collection) -> Result<usize>;
}

/// libSQL implementation of `LocalStore`
#[derive(Clone)]
pub struct LibSqlRecordStore {
    conn: Connection,
}

impl LibSqlRecordStore {
    /// Create a store on a shared connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn parse_record(data: &str) -> Result<Record> {
        Record::from_value(serde_json::from_str(data)?)
    }
}

#[async_trait]
impl LocalStore for LibSqlRecordStore {
    async fn get_all(&self, collection: &Collection) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT data FROM records WHERE collection = ? ORDER BY rowid",
                [collection.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: String = row.get(0)?;
            records.push(Self::parse_record(&data)?);
        }
        Ok(records)
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT data FROM records WHERE collection = ? AND id = ?",
                [collection.as_str(), id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let data: String = row.get(0)?;
                Ok(Some(Self::parse_record(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, collection: &Collection, record: &Record) -> Result<()> {
        let id = record.id_key().ok_or_else(|| {
            Error::InvalidInput(format!("record in '{collection}' has no usable id"))
        })?;
        let data = serde_json::to_string(record)?;
        let updated_at = record
            .timestamp()
            .map_or(Value::Null, |timestamp| Value::Text(format_timestamp(timestamp)));

        self.conn
            .execute(
                "INSERT INTO records (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                     data = excluded.data,
                     updated_at = excluded.updated_at",
                vec![
                    Value::Text(collection.to_string()),
                    Value::Text(id),
                    Value::Text(data),
                    updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND id = ?",
                [collection.as_str(), id],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM records WHERE collection = ?",
                [collection.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count as usize)
    }
}
