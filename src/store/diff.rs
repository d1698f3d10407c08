//! Change detection between the responses and the backup.
//!
//! The whole batch gets one verdict. Each response is matched with the
//! backup file of the same name:
//! - no backup file: changed
//! - sizes differ: changed
//! - sizes match: compared by content digest or by modification time
//!
//! Stops at the first change. Nothing here fails: a file that cannot be
//! read counts as changed.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::SnapshotFile;
use crate::config::Detection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    MissingBackup,
    SizeChanged { old: u64, new: u64 },
    ModifiedChanged,
    ContentChanged,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::MissingBackup => write!(f, "no backup"),
            ChangeReason::SizeChanged { old, new } => write!(f, "size {old} -> {new} bytes"),
            ChangeReason::ModifiedChanged => write!(f, "modification time changed"),
            ChangeReason::ContentChanged => write!(f, "content changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub name: String,
    pub reason: ChangeReason,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.reason)
    }
}

/// Returns the first response that differs from its backup, if any.
pub fn detect_change(
    snapshots: &[SnapshotFile],
    backup_dir: &Path,
    detection: Detection,
) -> Option<Change> {
    snapshots.iter().find_map(|snapshot| {
        compare(snapshot, backup_dir, detection).map(|reason| Change {
            name: snapshot.name.clone(),
            reason,
        })
    })
}

fn compare(snapshot: &SnapshotFile, backup_dir: &Path, detection: Detection) -> Option<ChangeReason> {
    let backup_path = backup_dir.join(&snapshot.name);

    let backup = match fs::metadata(&backup_path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Some(ChangeReason::MissingBackup),
    };

    if backup.len() != snapshot.size {
        return Some(ChangeReason::SizeChanged {
            old: backup.len(),
            new: snapshot.size,
        });
    }

    match detection {
        Detection::Metadata => match backup.modified() {
            Ok(modified) if modified == snapshot.modified => None,
            _ => Some(ChangeReason::ModifiedChanged),
        },
        Detection::Content => {
            match (file_digest(&snapshot.path), file_digest(&backup_path)) {
                (Ok(new), Ok(old)) if new == old => None,
                (Ok(_), Ok(_)) => Some(ChangeReason::ContentChanged),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("could not hash {}: {e}", snapshot.name);
                    Some(ChangeReason::ContentChanged)
                }
            }
        }
    }
}

pub fn file_digest(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}
