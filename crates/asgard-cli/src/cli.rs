use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "asgard")]
#[command(about = "Synchronize the local CRM store with the Asgard server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a sync pass over every collection
    Sync(SyncArgs),
    /// Show connectivity, settings and the last sync runs
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List collections with local record counts and cursors
    Collections {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export every local record to a snapshot file
    Export {
        /// Output path (defaults to asgard-migration-<date>.json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Write the snapshot to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Overwrite local records from the server or a snapshot file
    Import {
        /// Restore from a snapshot file instead of the server
        #[arg(long, value_name = "PATH")]
        from_file: Option<PathBuf>,
        /// Confirm that local records may be overwritten
        #[arg(long)]
        yes: bool,
    },
    /// Run the autosync scheduler until interrupted
    Autosync {
        /// Seconds before the first tick
        #[arg(long, value_name = "SECONDS")]
        initial_delay: Option<u64>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Only pull remote changes
    #[arg(long, conflicts_with = "push_only")]
    pub pull_only: bool,
    /// Only push local changes
    #[arg(long)]
    pub push_only: bool,
    /// Restrict the run to these collections (repeatable)
    #[arg(short, long = "collection", value_name = "NAME")]
    pub collections: Vec<String>,
    /// Output the run result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the stored settings (API key redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update stored settings
    Set(ConfigSetArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Base URL of the sync API
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,
    /// API key sent as a bearer token (empty string clears it)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,
    /// Autosync interval in minutes
    #[arg(long, value_name = "MINUTES")]
    pub interval: Option<u32>,
    /// Turn autosync on
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,
    /// Turn autosync off
    #[arg(long)]
    pub disable: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
