//! Endpoint fetching.
//!
//! Reads the requirements list, resolves each endpoint's deployment id
//! from the environment and stores the response body as
//! `<responses_dir>/<endpoint>.json`.
//!
//! A failed endpoint only logs a warning: its previous snapshot stays in
//! place, which the change detector reads as "unchanged".

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::PAYLOAD_EXTENSION;

/// Bytes of a response body shown at debug level.
const PREVIEW_LEN: usize = 500;

/// One line of the requirements file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// environment variable holding the deployment id
    pub secret: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    Status(u16),
    Transport(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "status code {code}"),
            FetchFailure::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

/// Transport for a single GET.
pub trait Source {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure>;
}

pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpSource { client })
    }
}

impl Source for HttpSource {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchFailure::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchFailure::Transport(e.without_url().to_string()))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct FetchReport {
    /// endpoints whose snapshot was rewritten
    pub stored: Vec<String>,
    pub failures: Vec<String>,
}

impl FetchReport {
    fn failure(&mut self, message: String) {
        tracing::warn!("{message}");
        self.failures.push(message);
    }
}

/// Parses `SECRET_NAME,endpoint` lines. Blank lines and `#` comments are
/// ignored; malformed lines come back as messages.
pub fn parse_requirements(text: &str) -> (Vec<Endpoint>, Vec<String>) {
    let mut endpoints = Vec::new();
    let mut problems = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = line
            .split_once(',')
            .map(|(secret, name)| (secret.trim(), name.trim()))
            .filter(|(secret, name)| !secret.is_empty() && valid_endpoint_name(name));

        match parsed {
            Some((secret, name)) => endpoints.push(Endpoint {
                secret: secret.to_string(),
                name: name.to_string(),
            }),
            None => problems.push(format!(
                "requirements line {}: expected SECRET_NAME,endpoint, got '{line}'",
                index + 1
            )),
        }
    }

    (endpoints, problems)
}

/// The name becomes a file name, so no separators or dot-only names.
fn valid_endpoint_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', ','])
        && name != "."
        && name != ".."
}

pub fn read_requirements(path: &Path) -> Result<(Vec<Endpoint>, Vec<String>)> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_requirements(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::MissingRequirements(path.to_path_buf()))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

pub fn endpoint_url(template: &str, deployment_id: &str, endpoint: &str) -> String {
    template
        .replace("{deployment_id}", deployment_id)
        .replace("{endpoint}", endpoint)
}

/// Fetches every endpoint in the requirements file into the responses
/// directory. `lookup` resolves secret names, normally from the environment.
pub fn fetch_all<F>(config: &Config, source: &dyn Source, lookup: F) -> Result<FetchReport>
where
    F: Fn(&str) -> Option<String>,
{
    let (endpoints, problems) = read_requirements(&config.requirements)?;
    let mut report = FetchReport::default();
    for problem in problems {
        report.failure(problem);
    }

    for endpoint in &endpoints {
        let Some(deployment_id) = lookup(&endpoint.secret).filter(|id| !id.is_empty()) else {
            report.failure(format!(
                "{}: no deployment id in environment variable '{}'",
                endpoint.name, endpoint.secret
            ));
            continue;
        };

        // the url embeds the deployment id, keep it out of the logs
        tracing::info!("fetching '{}'", endpoint.name);
        let url = endpoint_url(&config.url_template, &deployment_id, &endpoint.name);

        match source.get(&url) {
            Ok(body) => {
                tracing::debug!(
                    "response for '{}': {}",
                    endpoint.name,
                    String::from_utf8_lossy(&body[..body.len().min(PREVIEW_LEN)])
                );

                let path = config
                    .responses_dir
                    .join(format!("{}.{PAYLOAD_EXTENSION}", endpoint.name));
                fs::write(&path, &body).map_err(|e| Error::io(&path, e))?;

                tracing::info!("stored '{}' in {}", endpoint.name, path.display());
                report.stored.push(endpoint.name.clone());
            }
            Err(failure) => {
                report.failure(format!("{}: fetch failed: {failure}", endpoint.name));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSource(HashMap<String, std::result::Result<Vec<u8>, FetchFailure>>);

    impl Source for FakeSource {
        fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
            self.0
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchFailure::Transport("no route".into())))
        }
    }

    #[test]
    fn parses_requirements() {
        let (endpoints, problems) = parse_requirements(
            "# sheets\nORDERS_ID,orders\n\n  STATS_ID , user stats! \nbroken line\nX,\n,y\nA,../etc\n",
        );
        assert_eq!(
            endpoints,
            vec![
                Endpoint { secret: "ORDERS_ID".into(), name: "orders".into() },
                Endpoint { secret: "STATS_ID".into(), name: "user stats!".into() },
            ]
        );
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("line 5"));
    }

    #[test]
    fn url_template_substitution() {
        assert_eq!(
            endpoint_url(crate::config::DEFAULT_URL_TEMPLATE, "abc123", "orders"),
            "https://script.google.com/macros/s/abc123/exec?action=read&sheet=orders"
        );
    }

    #[test]
    fn missing_requirements_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_requirements(&tmp.path().join("requirements.txt")).unwrap_err();
        assert!(matches!(err, Error::MissingRequirements(_)));
    }

    #[test]
    fn stores_successes_and_keeps_old_snapshot_on_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            responses_dir: tmp.path().join("responses"),
            requirements: tmp.path().join("requirements.txt"),
            url_template: "http://sheets.test/{deployment_id}/{endpoint}".into(),
            ..Config::default()
        };
        fs::create_dir_all(&config.responses_dir).unwrap();
        fs::write(
            &config.requirements,
            "ORDERS_ID,orders\nSTOCK_ID,stock\nMISSING_ID,ghost\n",
        )
        .unwrap();
        fs::write(config.responses_dir.join("stock.json"), "previous").unwrap();

        let source = FakeSource(HashMap::from([
            ("http://sheets.test/o1/orders".to_string(), Ok(br#"[{"id":"1"}]"#.to_vec())),
            ("http://sheets.test/s1/stock".to_string(), Err(FetchFailure::Status(500))),
        ]));
        let env = HashMap::from([("ORDERS_ID", "o1"), ("STOCK_ID", "s1")]);

        let report = fetch_all(&config, &source, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(report.stored, vec!["orders"]);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].contains("status code 500"));
        assert!(report.failures[1].contains("MISSING_ID"));
        assert_eq!(
            fs::read_to_string(config.responses_dir.join("orders.json")).unwrap(),
            r#"[{"id":"1"}]"#
        );
        assert_eq!(
            fs::read_to_string(config.responses_dir.join("stock.json")).unwrap(),
            "previous"
        );
    }
}
