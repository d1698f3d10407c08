//! Status and run summaries.
//!
//! Collects a read-only view of the current state:
//! - database version
//! - tables with row counts
//! - snapshot files, and whether they differ from the backup
//!
//! Rendered as a text table or as JSON.

pub mod json;
pub mod table;

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::store::{self, diff::{self, Change}};
use crate::util::quote_ident;
use crate::version::{Ledger, Version};

#[derive(Debug, Serialize)]
pub struct Status {
    pub version: Option<Version>,
    pub database: PathBuf,
    pub tables: Vec<TableStatus>,
    pub snapshots: Vec<SnapshotStatus>,
    /// first snapshot the next sync would rebuild for
    pub pending: Option<Change>,
}

#[derive(Debug, Serialize)]
pub struct TableStatus {
    pub name: String,
    pub rows: i64,
}

#[derive(Debug, Serialize)]
pub struct SnapshotStatus {
    pub name: String,
    pub size: u64,
    /// unix seconds
    pub modified: i64,
}

pub fn collect(config: &Config) -> Result<Status> {
    let snapshots = store::list(&config.responses_dir)?;
    let pending = diff::detect_change(&snapshots, &config.backup_dir, config.detection);

    Ok(Status {
        version: Ledger::new(&config.version_file).current(),
        database: config.database.clone(),
        tables: list_tables(&config.database)?,
        snapshots: snapshots
            .iter()
            .map(|s| SnapshotStatus {
                name: s.name.clone(),
                size: s.size,
                modified: s
                    .modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
                    .unwrap_or(0),
            })
            .collect(),
        pending,
    })
}

/// User tables and their row counts. A missing database has none.
fn list_tables(path: &Path) -> Result<Vec<TableStatus>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let rows = conn.query_row(
            &format!("SELECT count(*) FROM {}", quote_ident(&name)),
            [],
            |row| row.get(0),
        )?;
        tables.push(TableStatus { name, rows });
    }

    Ok(tables)
}

pub fn print_status(status: &Status, json_output: bool) {
    if json_output {
        println!("{}", json::render(status));
    } else {
        print!("{}", table::render_status(status));
    }
}
