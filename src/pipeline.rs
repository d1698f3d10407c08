//! The change-gated rebuild.
//!
//! Order is fixed: detect, rebuild and commit, advance the version, refresh
//! the backup. The backup goes last so that a crash anywhere earlier leaves
//! the change visible to the next run, which simply redoes every step.

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{self, FetchReport, Source};
use crate::load::{self, LoadReport};
use crate::store::diff::{self, Change};
use crate::store::{self, backup};
use crate::version::{Ledger, Version};

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Unchanged,
    Rebuilt {
        /// first differing snapshot; `None` when forced
        trigger: Option<Change>,
        version: Version,
        load: LoadReport,
        backed_up: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub fetch: FetchReport,
    pub sync: SyncOutcome,
}

/// Rebuilds the database if any snapshot differs from its backup, or
/// unconditionally with `force`.
pub fn sync(config: &Config, force: bool) -> Result<SyncOutcome> {
    let snapshots = store::list(&config.responses_dir)?;

    let trigger = diff::detect_change(&snapshots, &config.backup_dir, config.detection);
    match &trigger {
        Some(change) => tracing::info!("change detected: {change}"),
        None if force => tracing::info!("no changes detected, rebuilding anyway"),
        None => {
            tracing::info!("no changes detected, database and version left as they are");
            return Ok(SyncOutcome::Unchanged);
        }
    }

    let load = load::rebuild_database(&config.database, &snapshots)?;
    let version = Ledger::new(&config.version_file).advance()?;
    tracing::info!(
        "database updated to version {version}: {} tables, {} rows",
        load.tables.len(),
        load.total_rows()
    );

    let backed_up = backup::mirror(&snapshots, &config.backup_dir)?;

    Ok(SyncOutcome::Rebuilt {
        trigger,
        version,
        load,
        backed_up,
    })
}

/// Fetches every endpoint, then syncs.
pub fn run<F>(config: &Config, source: &dyn Source, lookup: F, force: bool) -> Result<RunReport>
where
    F: Fn(&str) -> Option<String>,
{
    let fetch = fetch::fetch_all(config, source, lookup)?;
    tracing::info!(
        "fetched {} endpoints, {} failures",
        fetch.stored.len(),
        fetch.failures.len()
    );

    let sync = sync(config, force)?;
    Ok(RunReport { fetch, sync })
}
