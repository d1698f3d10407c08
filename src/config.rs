use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::GlobalArgs;
use crate::error::{Error, Result};

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://script.google.com/macros/s/{deployment_id}/exec?action=read&sheet={endpoint}";

const LOCAL_CONFIG_FILE: &str = "sheetsync.toml";

/// How a snapshot is compared against its backup once sizes match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detection {
    /// SHA-256 of both files
    Content,
    /// modification timestamps
    Metadata,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub responses_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub database: PathBuf,
    pub version_file: PathBuf,
    pub requirements: PathBuf,
    pub url_template: String,
    pub detection: Detection,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            responses_dir: PathBuf::from("api_responses"),
            backup_dir: PathBuf::from("api_responses_backup"),
            database: PathBuf::from("database/database.db"),
            version_file: PathBuf::from("db_version.json"),
            requirements: PathBuf::from("requirements.txt"),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            detection: Detection::Content,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    responses_dir: Option<PathBuf>,
    backup_dir: Option<PathBuf>,
    database: Option<PathBuf>,
    version_file: Option<PathBuf>,
    requirements: Option<PathBuf>,
    url_template: Option<String>,
    detection: Option<Detection>,
    fetch_timeout: Option<String>,
}

impl Config {
    /// Defaults, then the config file, then command line overrides.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let mut config = match locate_config_file(args.config.as_deref())? {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                Config::from_toml_str(&text)?
            }
            None => Config::default(),
        };

        if let Some(dir) = &args.responses_dir {
            config.responses_dir = dir.clone();
        }
        if let Some(dir) = &args.backup_dir {
            config.backup_dir = dir.clone();
        }
        if let Some(db) = &args.database {
            config.database = db.clone();
        }
        if let Some(file) = &args.version_file {
            config.version_file = file.clone();
        }
        if let Some(file) = &args.requirements {
            config.requirements = file.clone();
        }

        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        let mut config = Config::default();

        if let Some(v) = file.responses_dir {
            config.responses_dir = v;
        }
        if let Some(v) = file.backup_dir {
            config.backup_dir = v;
        }
        if let Some(v) = file.database {
            config.database = v;
        }
        if let Some(v) = file.version_file {
            config.version_file = v;
        }
        if let Some(v) = file.requirements {
            config.requirements = v;
        }
        if let Some(v) = file.url_template {
            config.url_template = v;
        }
        if let Some(v) = file.detection {
            config.detection = v;
        }
        if let Some(v) = file.fetch_timeout {
            config.fetch_timeout = humantime::parse_duration(&v)
                .map_err(|e| Error::Config(format!("invalid fetch_timeout '{v}': {e}")))?;
        }

        Ok(config)
    }

    /// Creates the responses, backup and database directories.
    ///
    /// Call once before fetching or syncing.
    pub fn ensure_dirs(&self) -> Result<()> {
        create_dir(&self.responses_dir)?;
        create_dir(&self.backup_dir)?;
        if let Some(parent) = self.database.parent() {
            create_dir(parent)?;
        }
        if let Some(parent) = self.version_file.parent() {
            create_dir(parent)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    // "" is the parent of a bare file name
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    let user = directories::ProjectDirs::from("", "", "sheetsync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|path| path.is_file());

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.responses_dir, PathBuf::from("api_responses"));
        assert_eq!(config.detection, Detection::Content);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.url_template, DEFAULT_URL_TEMPLATE);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            responses_dir = "in"
            database = "out/sheets.db"
            detection = "metadata"
            fetch_timeout = "2m"
            "#,
        )
        .unwrap();
        assert_eq!(config.responses_dir, PathBuf::from("in"));
        assert_eq!(config.database, PathBuf::from("out/sheets.db"));
        assert_eq!(config.detection, Detection::Metadata);
        assert_eq!(config.fetch_timeout, Duration::from_secs(120));
        assert_eq!(config.backup_dir, PathBuf::from("api_responses_backup"));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = Config::from_toml_str("respones_dir = \"x\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_timeout_rejected() {
        let err = Config::from_toml_str("fetch_timeout = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("fetch_timeout"));
    }

    #[test]
    fn cli_overrides_win() {
        let args = GlobalArgs {
            config: None,
            responses_dir: Some(PathBuf::from("/tmp/r")),
            database: Some(PathBuf::from("/tmp/d.db")),
            ..GlobalArgs::default()
        };
        // only meaningful when no local sheetsync.toml is lying around
        if PathBuf::from(LOCAL_CONFIG_FILE).is_file() {
            return;
        }
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.responses_dir, PathBuf::from("/tmp/r"));
        assert_eq!(config.database, PathBuf::from("/tmp/d.db"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let args = GlobalArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..GlobalArgs::default()
        };
        assert!(Config::from_args(&args).is_err());
    }

    #[test]
    fn ensure_dirs_creates_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            responses_dir: tmp.path().join("r"),
            backup_dir: tmp.path().join("b"),
            database: tmp.path().join("db/nested/x.db"),
            version_file: tmp.path().join("v/db_version.json"),
            ..Config::default()
        };
        config.ensure_dirs().unwrap();
        assert!(tmp.path().join("r").is_dir());
        assert!(tmp.path().join("b").is_dir());
        assert!(tmp.path().join("db/nested").is_dir());
        assert!(tmp.path().join("v").is_dir());
    }
}
