//! Runtime configuration for the sync engine.
//!
//! Sync settings are user data and are re-read for every operation through a
//! [`SettingsProvider`]; engine and client tuning is fixed at construction.

use std::time::Duration;

use async_trait::async_trait;

use crate::db::{LibSqlSettingsRepository, SettingsRepository};
use crate::error::Result;
use crate::models::SyncSettings;
use crate::util::normalize_text_option;

pub const ENV_API_URL: &str = "ASGARD_API_URL";
pub const ENV_API_KEY: &str = "ASGARD_API_KEY";
pub const ENV_SYNC_ENABLED: &str = "ASGARD_SYNC_ENABLED";
pub const ENV_AUTO_SYNC_MINUTES: &str = "ASGARD_AUTO_SYNC_MINUTES";

const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PUSH_BATCH_SIZE: usize = 500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Source of the current sync settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn current(&self) -> Result<SyncSettings>;
}

/// Fixed settings, for tests and one-off overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub SyncSettings);

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn current(&self) -> Result<SyncSettings> {
        Ok(self.0.clone())
    }
}

/// Settings persisted in the local database, with environment overrides.
#[derive(Clone)]
pub struct StoredSettings {
    repo: LibSqlSettingsRepository,
    use_env: bool,
}

impl StoredSettings {
    pub const fn new(repo: LibSqlSettingsRepository) -> Self {
        Self {
            repo,
            use_env: true,
        }
    }

    /// Ignore `ASGARD_*` environment overrides.
    #[must_use]
    pub const fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }
}

#[async_trait]
impl SettingsProvider for StoredSettings {
    async fn current(&self) -> Result<SyncSettings> {
        let mut settings = self.repo.load().await?;
        if self.use_env {
            apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
        }
        Ok(settings)
    }
}

/// Overlay `ASGARD_*` values onto persisted settings.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut SyncSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
        settings.api_url = Some(url);
    }
    if let Some(key) = normalize_text_option(lookup(ENV_API_KEY)) {
        settings.api_key = Some(key);
    }
    if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_ENABLED)) {
        match parse_bool(&raw) {
            Some(enabled) => settings.enabled = enabled,
            None => tracing::warn!("Ignoring {ENV_SYNC_ENABLED}={raw}: expected a boolean"),
        }
    }
    if let Some(raw) = normalize_text_option(lookup(ENV_AUTO_SYNC_MINUTES)) {
        match raw.parse::<u32>() {
            Ok(minutes) if minutes >= 1 => settings.auto_sync_minutes = minutes,
            _ => tracing::warn!("Ignoring {ENV_AUTO_SYNC_MINUTES}={raw}: expected minutes >= 1"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Tuning for collection passes and orchestrator runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deadline for each remote call, on top of the client's own timeout.
    pub call_timeout: Duration,
    /// Largest number of records sent in one push request.
    pub push_batch_size: usize,
    /// Collections synchronized at the same time; 1 is sequential.
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
            concurrency: 1,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Bounded exponential backoff for transient remote failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

/// HTTP client tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
