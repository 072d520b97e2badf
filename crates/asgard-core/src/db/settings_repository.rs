//! Settings repository implementation

use crate::error::Result;
use crate::models::SyncSettings;
use libsql::Connection;

/// Settings key holding the sync settings JSON
const SYNC_SETTINGS_KEY: &str = "sync";

/// Trait for settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load settings from the database, falling back to defaults
    async fn load(&self) -> Result<SyncSettings>;

    /// Save settings to the database
    async fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
#[derive(Clone)]
pub struct LibSqlSettingsRepository {
    conn: Connection,
}

impl LibSqlSettingsRepository {
    /// Create a new repository with the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository {
    async fn load(&self) -> Result<SyncSettings> {
        let Some(value) = get_setting(&self.conn, SYNC_SETTINGS_KEY).await? else {
            return Ok(SyncSettings::default());
        };

        match serde_json::from_str(&value) {
            Ok(settings) => Ok(settings),
            Err(error) => {
                tracing::warn!("Ignoring unreadable sync settings: {error}");
                Ok(SyncSettings::default())
            }
        }
    }

    async fn save(&self, settings: &SyncSettings) -> Result<()> {
        let value = serde_json::to_string(settings)?;
        set_setting(&self.conn, SYNC_SETTINGS_KEY, &value).await
    }
}

/// Read a raw value from the `settings` table
pub(crate) async fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut rows = conn
        .query("SELECT value FROM settings WHERE key = ?", [key])
        .await?;

    if let Some(row) = rows.next().await? {
        let value: String = row.get(0)?;
        Ok(Some(value))
    } else {
        Ok(None)
    }
}

/// Write a raw value into the `settings` table
pub(crate) async fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
        [key, value],
    )
    .await?;
    Ok(())
}
