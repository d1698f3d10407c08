use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetsync")]
#[command(about = "Rebuild a versioned SQLite database from spreadsheet JSON endpoints")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch every endpoint, then rebuild the database if anything changed
    Run(SyncArgs),

    /// Fetch every endpoint into the responses directory
    Fetch,

    /// Rebuild the database from the current responses if anything changed
    Sync(SyncArgs),

    /// Show the database version, tables and snapshot files
    Status(StatusArgs),
}

#[derive(Args, Default)]
pub struct GlobalArgs {
    /// Path to a config file (defaults to ./sheetsync.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the fetched payloads
    #[arg(long, global = true)]
    pub responses_dir: Option<PathBuf>,

    /// Directory mirroring the payloads of the last rebuild
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// SQLite database file to rebuild
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// JSON file holding the database version
    #[arg(long, global = true)]
    pub version_file: Option<PathBuf>,

    /// Endpoint list, one `SECRET_NAME,endpoint` pair per line
    #[arg(long, global = true)]
    pub requirements: Option<PathBuf>,

    /// Show debug output
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Rebuild even when no snapshot changed
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
