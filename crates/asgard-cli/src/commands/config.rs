use std::path::Path;

use asgard_core::models::MAX_AUTO_SYNC_MINUTES;
use asgard_core::util::{is_http_url, normalize_text_option};
use asgard_core::SyncSettings;

use crate::cli::{ConfigCommands, ConfigSetArgs};
use crate::commands::common::{open_service, SettingsView};
use crate::error::CliError;

pub async fn run_config(command: ConfigCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_config_show(json, db_path).await,
        ConfigCommands::Set(args) => run_config_set(args, db_path).await,
    }
}

async fn run_config_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let stored = service.stored_settings().await?;
    let effective = service.settings().await?;
    let view = SettingsView::from(&effective);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("enabled            {}", view.enabled);
    println!(
        "api_url            {}",
        view.api_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "api_key            {}",
        view.api_key.as_deref().unwrap_or("(not set)")
    );
    println!("auto_sync_minutes  {}", view.auto_sync_minutes);
    if stored != effective {
        println!("(ASGARD_* environment overrides are active)");
    }
    Ok(())
}

async fn run_config_set(args: ConfigSetArgs, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let mut settings = service.stored_settings().await?;
    apply_config_changes(&mut settings, args)?;
    service.save_settings(&settings).await?;
    println!("Settings saved");
    Ok(())
}

/// Apply `config set` flags to stored settings.
#[allow(clippy::needless_pass_by_value)]
pub fn apply_config_changes(
    settings: &mut SyncSettings,
    args: ConfigSetArgs,
) -> Result<(), CliError> {
    let has_changes = args.api_url.is_some()
        || args.api_key.is_some()
        || args.interval.is_some()
        || args.enable
        || args.disable;
    if !has_changes {
        return Err(CliError::Config(
            "nothing to change; pass --api-url, --api-key, --interval, --enable or --disable"
                .to_string(),
        ));
    }

    if let Some(api_url) = args.api_url {
        let api_url = normalize_text_option(Some(api_url));
        if let Some(url) = api_url.as_deref() {
            if !is_http_url(url) {
                return Err(CliError::Config(format!(
                    "API URL must start with http:// or https://: {url}"
                )));
            }
        }
        settings.api_url = api_url;
    }
    if let Some(api_key) = args.api_key {
        settings.api_key = normalize_text_option(Some(api_key));
    }
    if let Some(minutes) = args.interval {
        if minutes == 0 || minutes > MAX_AUTO_SYNC_MINUTES {
            return Err(CliError::Config(format!(
                "interval must be between 1 and {MAX_AUTO_SYNC_MINUTES} minutes"
            )));
        }
        settings.auto_sync_minutes = minutes;
    }
    if args.enable {
        settings.enabled = true;
    }
    if args.disable {
        settings.enabled = false;
    }
    Ok(())
}
