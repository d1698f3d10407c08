//! Database version ledger.
//!
//! The version is a generation counter for the database, stored as
//! `{"version": "major.minor"}`. Each advance bumps the minor component;
//! at 10 it wraps to 0 and carries into the major, which is unbounded.
//! An unreadable or malformed record restarts from 1.0 instead of failing.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Components below the most significant one roll over at this value.
const ROLLOVER: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

impl Version {
    pub const INITIAL: Version = Version { major: 1, minor: 0 };

    /// Parses `major.minor`; anything else is `None`.
    ///
    /// A component too large for `u64` saturates so the counter never
    /// moves backwards.
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.split_once('.')?;
        Some(Version {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
        })
    }

    pub fn is_saturated(&self) -> bool {
        self.major == u64::MAX || self.minor == u64::MAX
    }

    pub fn next(self) -> Self {
        let minor = self.minor.saturating_add(1);
        if minor >= ROLLOVER {
            Version {
                major: self.major.saturating_add(1),
                minor: 0,
            }
        } else {
            Version {
                major: self.major,
                minor,
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse().unwrap_or(u64::MAX))
}

#[derive(Serialize, Deserialize)]
struct VersionRecord {
    version: String,
}

/// What was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    Missing,
    Corrupt,
    Valid(Version),
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Ledger { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Stored {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Stored::Missing,
            Err(e) => {
                tracing::warn!("could not read {}: {e}", self.path.display());
                return Stored::Corrupt;
            }
        };

        let Some(version) = serde_json::from_str::<VersionRecord>(&text)
            .ok()
            .and_then(|record| Version::parse(&record.version))
        else {
            return Stored::Corrupt;
        };

        if version.is_saturated() {
            tracing::warn!(
                "version record {} is out of range, clamped to {version}",
                self.path.display()
            );
        }
        Stored::Valid(version)
    }

    /// Current version without advancing it.
    pub fn current(&self) -> Option<Version> {
        match self.read() {
            Stored::Valid(v) => Some(v),
            Stored::Missing | Stored::Corrupt => None,
        }
    }

    /// Advances and persists the version, returning the new value.
    ///
    /// A missing record starts at 1.0. A corrupt one is reset to 1.0 and
    /// then advanced.
    pub fn advance(&self) -> Result<Version> {
        let next = match self.read() {
            Stored::Missing => Version::INITIAL,
            Stored::Corrupt => {
                tracing::warn!(
                    "version record {} is corrupt, restarting from {}",
                    self.path.display(),
                    Version::INITIAL
                );
                Version::INITIAL.next()
            }
            Stored::Valid(v) => v.next(),
        };

        self.write(next)?;
        Ok(next)
    }

    fn write(&self, version: Version) -> Result<()> {
        let record = VersionRecord {
            version: version.to_string(),
        };
        let body = serde_json::to_string(&record).map_err(|source| Error::Json {
            what: "version record".to_string(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        // write beside the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;

        Ok(())
    }
}
