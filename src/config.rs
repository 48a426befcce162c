//! Reporter settings, resolved once at startup.
//!
//! Options come from an optional JSON file (`reporterOptions` in the cypress.json layout,
//! or the bare object) with CLI flags and environment variables layered on top. Activation
//! hinges on the build number: without one the reporter stays disabled and nothing is
//! validated.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing reporterOptions. Provide --config or the TESTRAIL_* options")]
    MissingOptions,
    #[error("Missing {0} value. Please update reporterOptions")]
    MissingField(&'static str),
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw, possibly incomplete reporter options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterOptions {
    pub domain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub project_id: Option<u64>,
    pub milestone_id: Option<u64>,
    pub suite_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CypressJson {
    reporter_options: ReporterOptions,
}

impl ReporterOptions {
    /// Load options from a JSON file, accepting either layout.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if value.get("reporterOptions").is_some() {
            Ok(serde_json::from_value::<CypressJson>(value)?.reporter_options)
        } else {
            serde_json::from_value(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-by-field overlay; values set in `other` win.
    pub fn merge(self, other: ReporterOptions) -> Self {
        Self {
            domain: other.domain.or(self.domain),
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            project_id: other.project_id.or(self.project_id),
            milestone_id: other.milestone_id.or(self.milestone_id),
            suite_id: other.suite_id.or(self.suite_id),
        }
    }

    /// Check required fields in declaration order and report the first one missing.
    pub fn validate(self) -> Result<TestRailConfig, ConfigError> {
        Ok(TestRailConfig {
            domain: self.domain.ok_or(ConfigError::MissingField("domain"))?,
            username: self.username.ok_or(ConfigError::MissingField("username"))?,
            password: self.password.ok_or(ConfigError::MissingField("password"))?,
            project_id: self.project_id.ok_or(ConfigError::MissingField("projectId"))?,
            milestone_id: self
                .milestone_id
                .ok_or(ConfigError::MissingField("milestoneId"))?,
            suite_id: self.suite_id.ok_or(ConfigError::MissingField("suiteId"))?,
        })
    }
}

/// Fully specified TestRail connection and run placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRailConfig {
    pub domain: String,
    pub username: String,
    pub password: String,
    pub project_id: u64,
    pub milestone_id: u64,
    pub suite_id: u64,
}

impl TestRailConfig {
    /// Base URL of the v2 API.
    pub fn api_base(&self) -> String {
        format!("https://{}/index.php?/api/v2", self.domain)
    }

    /// Browser link to a run.
    pub fn run_url(&self, run_id: u64) -> String {
        format!("https://{}/index.php?/runs/view/{}", self.domain, run_id)
    }
}

/// Activation decision plus everything an enabled reporter needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub enabled: bool,
    pub build_number: String,
    pub run_label: String,
    pub testrail: Option<TestRailConfig>,
}

impl Settings {
    /// Resolve activation. A missing or blank build number disables the reporter
    /// without looking at the options; otherwise every required option must be present.
    pub fn resolve(
        build_number: Option<String>,
        run_label: String,
        options: Option<ReporterOptions>,
    ) -> Result<Self, ConfigError> {
        let build_number = match build_number.filter(|b| !b.trim().is_empty()) {
            Some(b) => b,
            None => {
                return Ok(Self {
                    enabled: false,
                    build_number: String::new(),
                    run_label,
                    testrail: None,
                })
            }
        };
        let options = options.ok_or(ConfigError::MissingOptions)?;
        Ok(Self {
            enabled: true,
            build_number,
            run_label,
            testrail: Some(options.validate()?),
        })
    }
}
