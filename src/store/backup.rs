//! Backup refresh after a rebuild.
//!
//! Copies every response into the backup directory and stamps the copy
//! with the source's modification time, so size and mtime match on the
//! next run regardless of detection mode.

use std::fs::{self, File};
use std::path::Path;

use super::SnapshotFile;
use crate::error::{Error, Result};

/// Mirrors `snapshots` into `backup_dir`. Returns the number of files copied.
pub fn mirror(snapshots: &[SnapshotFile], backup_dir: &Path) -> Result<usize> {
    fs::create_dir_all(backup_dir).map_err(|e| Error::io(backup_dir, e))?;

    for snapshot in snapshots {
        let dest = backup_dir.join(&snapshot.name);
        fs::copy(&snapshot.path, &dest).map_err(|e| Error::io(&snapshot.path, e))?;

        let modified = fs::metadata(&snapshot.path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(&snapshot.path, e))?;

        File::options()
            .write(true)
            .open(&dest)
            .and_then(|f| f.set_modified(modified))
            .map_err(|e| Error::io(&dest, e))?;

        tracing::debug!("backed up {}", snapshot.name);
    }

    Ok(snapshots.len())
}
