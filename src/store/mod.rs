//! Snapshot and backup stores.
//!
//! Both stores are flat directories with one file per endpoint:
//! - responses: the payload fetched on the latest run
//! - backup: a mirror of the responses as of the last rebuild
//!
//! Supports:
//! - Listing a store in file name order
//! - Deciding whether the responses differ from the backup (diff)
//! - Refreshing the backup after a rebuild (backup)

pub mod backup;
pub mod diff;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extension of files the loader turns into tables.
pub const PAYLOAD_EXTENSION: &str = "json";

/// One file in a store.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    /// file name including extension, identical in both stores
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl SnapshotFile {
    /// Endpoint identity: the file name without its extension.
    pub fn endpoint(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn is_payload(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext == PAYLOAD_EXTENSION)
    }
}

/// Lists the regular files directly inside `dir`, sorted by name.
///
/// A missing directory is an empty store.
pub fn list(dir: &Path) -> Result<Vec<SnapshotFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| Error::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        // non-utf8 names cannot become table names or be mirrored by name
        let Some(name) = entry.file_name().to_str() else {
            tracing::warn!("skipping {}: file name is not valid UTF-8", entry.path().display());
            continue;
        };

        let metadata = entry.metadata().map_err(|e| Error::io(entry.path(), e.into()))?;
        let modified = metadata
            .modified()
            .map_err(|e| Error::io(entry.path(), e))?;

        files.push(SnapshotFile {
            name: name.to_string(),
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            modified,
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let files = list(&tmp.path().join("nope")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn lists_files_sorted_and_skips_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.json"), "[]").unwrap();
        fs::write(tmp.path().join("a.json"), "[1]").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/c.json"), "[]").unwrap();

        let files = list(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert_eq!(files[0].size, 3);
    }

    #[test]
    fn endpoint_and_payload_detection() {
        let file = SnapshotFile {
            name: "user stats!.json".to_string(),
            path: PathBuf::from("user stats!.json"),
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(file.endpoint(), "user stats!");
        assert!(file.is_payload());

        let other = SnapshotFile {
            name: "notes.txt".to_string(),
            ..file
        };
        assert!(!other.is_payload());
    }
}
