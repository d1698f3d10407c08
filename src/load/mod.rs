//! Schema inference and table rebuild.
//!
//! Every `.json` snapshot becomes one table:
//! - name: the endpoint with non-word runs replaced by `_`
//! - columns: keys of the first record, in payload order, all TEXT
//! - rows: every record in order, missing keys stored as ""
//!
//! The whole batch runs in one transaction. A payload that cannot be
//! decoded or has no usable records is skipped with a diagnostic and any
//! table already holding its name is left alone. Storage errors abort.

pub mod record;

use std::fs;
use std::path::Path;

use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::SnapshotFile;
use crate::util::quote_ident;
use record::Shape;

/// SQLite refuses to create tables under this prefix.
const RESERVED_PREFIX: &str = "sqlite_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    /// snapshot file the table was built from
    pub source: String,
    pub columns: usize,
    pub rows: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableSummary>,
    pub diagnostics: Vec<String>,
}

impl LoadReport {
    fn diagnostic(&mut self, message: String) {
        tracing::warn!("{message}");
        self.diagnostics.push(message);
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Opens the database at `path`, rebuilds it from `snapshots` and closes it.
pub fn rebuild_database(path: &Path, snapshots: &[SnapshotFile]) -> Result<LoadReport> {
    let mut conn = Connection::open(path)?;
    let report = rebuild(&mut conn, snapshots)?;
    conn.close().map_err(|(_, e)| Error::Sqlite(e))?;
    Ok(report)
}

/// Rebuilds one table per payload snapshot and commits once at the end.
pub fn rebuild(conn: &mut Connection, snapshots: &[SnapshotFile]) -> Result<LoadReport> {
    let tx = conn.transaction()?;
    let mut report = LoadReport::default();

    for snapshot in snapshots.iter().filter(|s| s.is_payload()) {
        let bytes = fs::read(&snapshot.path).map_err(|e| Error::io(&snapshot.path, e))?;
        let table = record::sanitize_table_name(snapshot.endpoint());

        let Some(summary) = load_payload(&tx, &table, &snapshot.name, &bytes, &mut report)? else {
            continue;
        };

        // table names are case-insensitive, a later file silently reuses the table
        if let Some(pos) = report
            .tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(&summary.name))
        {
            let replaced = report.tables.remove(pos);
            report.diagnostic(format!(
                "table '{}' from {} replaces the one built from {}",
                summary.name, summary.source, replaced.source
            ));
        }

        report.tables.push(summary);
    }

    tx.commit()?;
    Ok(report)
}

/// Decodes one payload and, if it holds records, rebuilds `table` from it.
///
/// Returns `None` when the payload was skipped.
pub fn load_payload(
    conn: &Connection,
    table: &str,
    source: &str,
    bytes: &[u8],
    report: &mut LoadReport,
) -> Result<Option<TableSummary>> {
    if table
        .get(..RESERVED_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(RESERVED_PREFIX))
    {
        report.diagnostic(format!("{source}: table name '{table}' is reserved by SQLite, skipped"));
        return Ok(None);
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        report.diagnostic(format!("{source}: {}, skipped", Shape::Empty));
        return Ok(None);
    }

    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            report.diagnostic(format!("{source}: error decoding JSON: {e}"));
            return Ok(None);
        }
    };

    let records = match record::normalize(value) {
        Ok(records) => records,
        Err(shape) => {
            report.diagnostic(format!("{source}: {shape}, skipped"));
            return Ok(None);
        }
    };

    let Some(first) = records.first().and_then(Value::as_object) else {
        report.diagnostic(format!("{source}: no records to insert into '{table}'"));
        return Ok(None);
    };

    let columns = match record::columns_of(first) {
        Ok(columns) => columns,
        Err(shape) => {
            report.diagnostic(format!("{source}: {shape}, skipped"));
            return Ok(None);
        }
    };

    let rows = write_table(conn, table, &columns, &records, source, report)?;
    tracing::info!("table '{table}' rebuilt from {source}: {} columns, {rows} rows", columns.len());

    Ok(Some(TableSummary {
        name: table.to_string(),
        source: source.to_string(),
        columns: columns.len(),
        rows,
    }))
}

fn write_table(
    conn: &Connection,
    table: &str,
    columns: &[String],
    records: &[Value],
    source: &str,
    report: &mut LoadReport,
) -> Result<usize> {
    let quoted = quote_ident(table);

    conn.execute(&format!("DROP TABLE IF EXISTS {quoted}"), [])?;

    let column_defs = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(&format!("CREATE TABLE {quoted} ({column_defs})"), [])?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut stmt = conn.prepare(&format!("INSERT INTO {quoted} VALUES ({placeholders})"))?;

    let mut rows = 0;
    for (index, record) in records.iter().enumerate() {
        let Some(record) = record.as_object() else {
            report.diagnostic(format!(
                "{source}: record {} is not an object, skipped",
                index + 1
            ));
            continue;
        };

        stmt.execute(params_from_iter(record::row_values(record, columns)))?;
        rows += 1;
    }

    Ok(rows)
}
