use std::path::Path;
use std::time::Duration;

use asgard_core::sync::SchedulerConfig;
use tokio::sync::watch;

use crate::commands::common::open_service;
use crate::error::CliError;

pub async fn run_autosync(initial_delay_secs: Option<u64>, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let settings = service.settings().await?;
    if !settings.enabled || !settings.has_api_url() {
        tracing::warn!(
            "Autosync is disabled or no server is configured; ticks will be skipped until \
             `asgard config set --enable --api-url <URL>` is run"
        );
    }

    let scheduler = service
        .scheduler(scheduler_config(initial_delay_secs))
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {error}");
            return;
        }
        tracing::info!("Stopping autosync");
        let _ = shutdown_tx.send(true);
    });

    let mut status = service.orchestrator().subscribe();
    let status_log = async {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            tracing::info!(status = %current, "Sync status changed");
        }
    };

    tokio::select! {
        () = scheduler.run(shutdown_rx) => {}
        () = status_log => {}
    }
    Ok(())
}

pub fn scheduler_config(initial_delay_secs: Option<u64>) -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    if let Some(seconds) = initial_delay_secs {
        config.initial_delay = Duration::from_secs(seconds);
    }
    config
}
