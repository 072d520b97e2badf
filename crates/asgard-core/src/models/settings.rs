//! Sync settings model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Default autosync interval in minutes.
pub const DEFAULT_AUTO_SYNC_MINUTES: u32 = 5;

/// Longest accepted autosync interval (one day).
pub const MAX_AUTO_SYNC_MINUTES: u32 = 1440;

/// User-editable synchronization settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Whether the autosync scheduler may run.
    pub enabled: bool,
    /// Base URL of the CRM API, e.g. `https://crm.example.com/api`.
    pub api_url: Option<String>,
    /// Bearer token sent with every request.
    pub api_key: Option<String>,
    /// Minimum spacing between scheduled runs.
    pub auto_sync_minutes: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: None,
            api_key: None,
            auto_sync_minutes: DEFAULT_AUTO_SYNC_MINUTES,
        }
    }
}

impl SyncSettings {
    /// Base URL without surrounding whitespace or trailing slashes.
    pub fn base_url(&self) -> Result<String> {
        let url = normalize_text_option(self.api_url.clone())
            .ok_or_else(|| Error::Config("API URL is not configured".into()))?;
        let url = url.trim_end_matches('/');
        if !is_http_url(url) {
            return Err(Error::Config(format!(
                "API URL must start with http:// or https://: {url}"
            )));
        }
        Ok(url.to_string())
    }

    /// Bearer token, if one is set.
    pub fn token(&self) -> Option<String> {
        normalize_text_option(self.api_key.clone())
    }

    /// Whether a base URL is present at all.
    pub fn has_api_url(&self) -> bool {
        normalize_text_option(self.api_url.clone()).is_some()
    }

    /// Autosync interval clamped to the accepted range.
    pub fn interval_minutes(&self) -> u32 {
        self.auto_sync_minutes.clamp(1, MAX_AUTO_SYNC_MINUTES)
    }

    /// Autosync interval as a duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.interval_minutes()) * 60)
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("enabled", &self.enabled)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auto_sync_minutes", &self.auto_sync_minutes)
            .finish()
    }
}
