//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::orchestrator::{SyncOptions, SyncOrchestrator, ALREADY_RUNNING};
use crate::config::SettingsProvider;
use crate::models::SyncRunResult;

const DEFAULT_INITIAL_DELAY_SECS: u64 = 10;
const DEFAULT_POLL_PERIOD_SECS: u64 = 30;

/// What a single scheduler tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Autosync is switched off or no usable server URL is configured.
    Disabled,
    /// The configured interval has not elapsed since the last run.
    NotDue { remaining: Duration },
    AlreadyRunning,
    /// The health check failed; nothing was attempted.
    Offline { error: String },
    Completed(SyncRunResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Wait before the first tick after start-up.
    pub initial_delay: Duration,
    /// How often the loop re-checks settings and spacing.
    pub poll_period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            poll_period: Duration::from_secs(DEFAULT_POLL_PERIOD_SECS),
        }
    }
}

/// Triggers full runs on the user-configured interval.
///
/// Spacing is measured from the end of the previous run, so a run slower
/// than the interval never overlaps the next one.
pub struct AutoSyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    settings: Arc<dyn SettingsProvider>,
    config: SchedulerConfig,
}

impl AutoSyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        settings: Arc<dyn SettingsProvider>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            orchestrator,
            settings,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Check settings, spacing and connectivity, then run if everything allows.
    pub async fn tick(&self) -> TickOutcome {
        let settings = match self.settings.current().await {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!("Autosync skipped, settings unavailable: {error}");
                return TickOutcome::Disabled;
            }
        };
        if !settings.enabled {
            return TickOutcome::Disabled;
        }
        if let Err(error) = settings.base_url() {
            if settings.has_api_url() {
                tracing::warn!("Autosync skipped: {error}");
            }
            return TickOutcome::Disabled;
        }

        if self.orchestrator.is_running() {
            return TickOutcome::AlreadyRunning;
        }

        if let Some(last) = self.orchestrator.last_completed_at() {
            let elapsed = (Utc::now() - last).to_std().unwrap_or_default();
            let interval = settings.interval();
            if elapsed < interval {
                return TickOutcome::NotDue {
                    remaining: interval - elapsed,
                };
            }
        }

        let health = self.orchestrator.synchronizer().remote().health().await;
        if !health.connected {
            let error = health
                .error
                .unwrap_or_else(|| "server unreachable".to_string());
            tracing::info!("Autosync skipped, server offline: {error}");
            self.orchestrator.mark_offline();
            return TickOutcome::Offline { error };
        }

        let result = self.orchestrator.sync_all(SyncOptions::default()).await;
        if result.error.as_deref() == Some(ALREADY_RUNNING) {
            return TickOutcome::AlreadyRunning;
        }
        TickOutcome::Completed(result)
    }

    /// Tick until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = self.config.initial_delay;
        tracing::info!(
            first_tick_in = ?delay,
            poll_period = ?self.config.poll_period,
            "Autosync scheduler started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.tick().await {
                TickOutcome::Completed(result) if result.success => tracing::info!(
                    pulled = result.total_pulled,
                    pushed = result.total_pushed,
                    conflicts = result.total_conflicts,
                    "Autosync completed"
                ),
                TickOutcome::Completed(result) => tracing::warn!(
                    errors = result.errors.len(),
                    "Autosync completed with errors"
                ),
                outcome => tracing::debug!(?outcome, "Autosync tick"),
            }

            delay = self.config.poll_period;
        }

        tracing::info!("Autosync scheduler stopped");
    }
}
