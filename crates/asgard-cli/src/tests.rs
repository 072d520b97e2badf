use std::path::PathBuf;

use asgard_core::db::LocalStore;
use asgard_core::services::{ServiceOptions, SyncService};
use asgard_core::sync::HealthStatus;
use asgard_core::{Collection, CollectionSyncResult, Record, SyncRunResult, SyncSettings, SyncStatus};
use chrono::{Duration, TimeZone, Utc};
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::cli::{Cli, Commands, CompletionShell, ConfigSetArgs, SyncArgs};
use crate::commands::autosync::scheduler_config;
use crate::commands::common::{
    format_collection_lines, format_relative_time, format_run_lines, parse_collections,
    resolve_db_path, CollectionItem, SettingsView,
};
use crate::commands::completions::render_completions;
use crate::commands::config::apply_config_changes;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::status::derive_status;
use crate::commands::sync::{ensure_success, run_sync, sync_options};
use crate::error::CliError;

fn collections(names: &[&str]) -> Vec<Collection> {
    names
        .iter()
        .map(|name| Collection::new(*name).unwrap())
        .collect()
}

fn finished_run(success: bool) -> SyncRunResult {
    let mut result = SyncRunResult::begin(Utc::now());
    let mut users = CollectionSyncResult::new(Collection::new("users").unwrap());
    users.pulled = 2;
    users.pushed = 1;
    if !success {
        users.errors.push("API error 500: boom".to_string());
    }
    result.record(users);
    result.finish(Utc::now());
    result
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn sync_flags_parse() {
    let cli = Cli::try_parse_from([
        "asgard",
        "sync",
        "--pull-only",
        "--collection",
        "users",
        "-c",
        "tenders",
        "--json",
    ])
    .unwrap();
    let Some(Commands::Sync(args)) = cli.command else {
        panic!("expected sync command");
    };
    assert!(args.pull_only);
    assert!(!args.push_only);
    assert!(args.json);
    assert_eq!(args.collections, vec!["users", "tenders"]);
}

#[test]
fn pull_only_and_push_only_conflict() {
    assert!(Cli::try_parse_from(["asgard", "sync", "--pull-only", "--push-only"]).is_err());
}

#[test]
fn enable_and_disable_conflict() {
    assert!(Cli::try_parse_from(["asgard", "config", "set", "--enable", "--disable"]).is_err());
}

#[test]
fn global_db_path_is_accepted_after_subcommand() {
    let cli = Cli::try_parse_from(["asgard", "status", "--db-path", "/tmp/a.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/a.db")));
}

#[test]
fn explicit_db_path_wins() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn parse_collections_rejects_unknown_and_dedupes() {
    let known = collections(&["users", "tenders"]);

    let parsed = parse_collections(
        &["users".to_string(), " tenders ".to_string(), "users".to_string()],
        &known,
    )
    .unwrap();
    assert_eq!(parsed, known);

    let error = parse_collections(&["spaceships".to_string()], &known).unwrap_err();
    assert!(matches!(error, CliError::UnknownCollection(name) if name == "spaceships"));
}

#[test]
fn sync_options_follow_flags() {
    let known = collections(&["users", "tenders"]);

    let options = sync_options(&SyncArgs::default(), &known).unwrap();
    assert!(options.pull && options.push);
    assert_eq!(options.collections, None);

    let args = SyncArgs {
        push_only: true,
        collections: vec!["tenders".to_string()],
        ..SyncArgs::default()
    };
    let options = sync_options(&args, &known).unwrap();
    assert!(!options.pull);
    assert!(options.push);
    assert_eq!(options.collections, Some(collections(&["tenders"])));
}

#[test]
fn ensure_success_reports_failures() {
    assert!(ensure_success(&finished_run(true)).is_ok());

    let error = ensure_success(&finished_run(false)).unwrap_err();
    assert_eq!(error.to_string(), "Sync failed: 1 collection(s) failed");

    let rejected = SyncRunResult::rejected("Sync already in progress");
    let error = ensure_success(&rejected).unwrap_err();
    assert_eq!(error.to_string(), "Sync failed: Sync already in progress");
}

#[test]
fn run_lines_list_collections_and_errors() {
    let lines = format_run_lines(&finished_run(false));
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("!! users"));
    assert_eq!(lines[1], "Total: pulled 2, pushed 1, conflicts 0");
    assert_eq!(lines[2], "error: users: API error 500: boom");

    let rejected = format_run_lines(&SyncRunResult::rejected("Sync already in progress"));
    assert_eq!(rejected, vec!["Sync not started: Sync already in progress"]);
}

#[test]
fn collection_lines_show_missing_cursor() {
    let items = vec![CollectionItem {
        collection: "users".to_string(),
        records: 3,
        cursor: None,
    }];
    let lines = format_collection_lines(&items);
    assert!(lines[0].starts_with("users "));
    assert!(lines[0].ends_with("cursor never"));
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
    assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
    assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
    assert_eq!(format_relative_time(now + Duration::minutes(5), now), "just now");
}

#[test]
fn config_changes_validate_and_apply() {
    let mut settings = SyncSettings::default();
    apply_config_changes(
        &mut settings,
        ConfigSetArgs {
            api_url: Some(" https://crm.example.com/api ".to_string()),
            api_key: Some("secret-key".to_string()),
            interval: Some(15),
            enable: true,
            ..ConfigSetArgs::default()
        },
    )
    .unwrap();
    assert_eq!(settings.api_url.as_deref(), Some("https://crm.example.com/api"));
    assert_eq!(settings.api_key.as_deref(), Some("secret-key"));
    assert_eq!(settings.auto_sync_minutes, 15);
    assert!(settings.enabled);

    apply_config_changes(
        &mut settings,
        ConfigSetArgs {
            api_key: Some(String::new()),
            disable: true,
            ..ConfigSetArgs::default()
        },
    )
    .unwrap();
    assert_eq!(settings.api_key, None);
    assert!(!settings.enabled);
}

#[test]
fn config_changes_reject_bad_values() {
    let mut settings = SyncSettings::default();
    assert!(apply_config_changes(&mut settings, ConfigSetArgs::default()).is_err());
    assert!(apply_config_changes(
        &mut settings,
        ConfigSetArgs {
            api_url: Some("crm.example.com".to_string()),
            ..ConfigSetArgs::default()
        }
    )
    .is_err());
    assert!(apply_config_changes(
        &mut settings,
        ConfigSetArgs {
            interval: Some(0),
            ..ConfigSetArgs::default()
        }
    )
    .is_err());
    assert_eq!(settings, SyncSettings::default());
}

#[test]
fn settings_view_masks_api_key() {
    let settings = SyncSettings {
        api_key: Some("abcdefgh".to_string()),
        ..SyncSettings::default()
    };
    let view = SettingsView::from(&settings);
    assert_eq!(view.api_key.as_deref(), Some("abcd…"));
}

#[test]
fn status_prefers_offline_then_last_outcome() {
    let online = HealthStatus {
        connected: true,
        info: None,
        error: None,
    };
    let offline = HealthStatus {
        connected: false,
        info: None,
        error: Some("connection refused".to_string()),
    };

    assert_eq!(derive_status(&offline, Some(&finished_run(true))), SyncStatus::Offline);
    assert_eq!(derive_status(&online, None), SyncStatus::Idle);
    assert_eq!(derive_status(&online, Some(&finished_run(true))), SyncStatus::Success);
    assert_eq!(derive_status(&online, Some(&finished_run(false))), SyncStatus::Error);
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("asgard"));
}

#[test]
fn scheduler_config_overrides_initial_delay() {
    assert_eq!(
        scheduler_config(Some(0)).initial_delay,
        std::time::Duration::ZERO
    );
    assert_eq!(
        scheduler_config(None).initial_delay,
        std::time::Duration::from_secs(10)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn import_requires_confirmation() {
    let tmp = tempdir().unwrap();
    let result = run_import(None, false, &tmp.path().join("asgard.db")).await;
    assert!(matches!(result, Err(CliError::ImportNotConfirmed)));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_without_server_is_not_configured() {
    let tmp = tempdir().unwrap();
    let result = run_sync(SyncArgs::default(), &tmp.path().join("asgard.db")).await;
    assert!(matches!(result, Err(CliError::SyncNotConfigured)));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_command_runs_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sync/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{"id": 1, "updated_at": "2024-01-01T00:00:00Z"}]
        })))
        .mount(&server)
        .await;

    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("asgard.db");
    {
        let service = SyncService::open_path(&db_path, ServiceOptions::default())
            .await
            .unwrap();
        service
            .save_settings(&SyncSettings {
                api_url: Some(server.uri()),
                ..SyncSettings::default()
            })
            .await
            .unwrap();
    }

    let args = SyncArgs {
        pull_only: true,
        collections: vec!["users".to_string()],
        ..SyncArgs::default()
    };
    run_sync(args, &db_path).await.unwrap();

    let service = SyncService::open_path(&db_path, ServiceOptions::default())
        .await
        .unwrap();
    let last = service.last_run().await.unwrap().unwrap();
    assert_eq!(last.total_pulled, 1);
    assert_eq!(last.collections.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn export_then_import_from_file_restores_records() {
    let tmp = tempdir().unwrap();
    let source_path = tmp.path().join("source.db");
    let target_path = tmp.path().join("target.db");
    let snapshot_path = tmp.path().join("snapshot.json");
    let users = Collection::new("users").unwrap();

    {
        let source = SyncService::open_path(&source_path, ServiceOptions::default())
            .await
            .unwrap();
        for id in 1..=2 {
            source
                .store()
                .put(
                    &users,
                    &Record::from_value(json!({"id": id, "name": format!("User {id}")})).unwrap(),
                )
                .await
                .unwrap();
        }
    }

    run_export(Some(snapshot_path.as_path()), false, &source_path)
        .await
        .unwrap();
    assert!(snapshot_path.exists());

    run_import(Some(snapshot_path.as_path()), true, &target_path)
        .await
        .unwrap();

    let target = SyncService::open_path(&target_path, ServiceOptions::default())
        .await
        .unwrap();
    let summaries = target.collection_summaries().await.unwrap();
    let restored = summaries
        .iter()
        .find(|summary| summary.collection == users)
        .unwrap();
    assert_eq!(restored.records, 2);
    assert_eq!(restored.cursor, None);
}
