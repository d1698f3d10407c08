//! Plain text rendering for status and run summaries.

use super::Status;
use crate::fetch::FetchReport;
use crate::pipeline::SyncOutcome;
use crate::util::format_bytes;

pub fn render_status(status: &Status) -> String {
    let mut output = String::new();

    let version = status
        .version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string());
    output.push_str(&format!("version:  {version}\n"));
    output.push_str(&format!("database: {}\n", status.database.display()));

    output.push_str("\nTables\n");
    output.push_str(&"-".repeat(44));
    output.push('\n');
    if status.tables.is_empty() {
        output.push_str("  (none)\n");
    }
    for table in &status.tables {
        output.push_str(&format!("  {:30} {:>10}\n", truncate(&table.name, 30), table.rows));
    }

    output.push_str("\nSnapshots\n");
    output.push_str(&"-".repeat(44));
    output.push('\n');
    if status.snapshots.is_empty() {
        output.push_str("  (none)\n");
    }
    for snapshot in &status.snapshots {
        let modified = chrono::DateTime::from_timestamp(snapshot.modified, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        output.push_str(&format!(
            "  {:30} {:>10}  {modified}\n",
            truncate(&snapshot.name, 30),
            format_bytes(snapshot.size)
        ));
    }

    match &status.pending {
        Some(change) => output.push_str(&format!("\npending change: {change}\n")),
        None => output.push_str("\nbackup is up to date\n"),
    }

    output
}

pub fn render_outcome(outcome: &SyncOutcome) -> String {
    let SyncOutcome::Rebuilt {
        version,
        load,
        backed_up,
        ..
    } = outcome
    else {
        return String::from("No changes detected. Database and version file not updated.\n");
    };

    let mut output = format!("Database updated to version {version}\n");
    for table in &load.tables {
        output.push_str(&format!(
            "  {:30} {:>4} columns {:>8} rows\n",
            truncate(&table.name, 30),
            table.columns,
            table.rows
        ));
    }
    output.push_str(&format!("backed up {backed_up} snapshot files\n"));

    if !load.diagnostics.is_empty() {
        output.push('\n');
        for diagnostic in &load.diagnostics {
            output.push_str(&format!("[diagnostic] {diagnostic}\n"));
        }
    }

    output
}

pub fn render_fetch(report: &FetchReport) -> String {
    let mut output = format!("fetched {} endpoints\n", report.stored.len());
    for failure in &report.failures {
        output.push_str(&format!("[failed] {failure}\n"));
    }
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
