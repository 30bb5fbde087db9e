use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_FETCH_TIMEOUT: &str = "30s";
const DEFAULT_EVAL_TIMEOUT: &str = "10s";

/// Intervention tracking configuration, loaded from a TOML file.
///
/// `sources` maps distribution -> type -> URL of the remote script that
/// publishes the interventions for that cell. `load` rejects configs with a
/// hole in the matrix so the import loop never has to handle a missing URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub distributions: Vec<String>,
    pub types: Vec<String>,
    pub platforms: Vec<String>,
    pub sources: HashMap<String, HashMap<String, String>>,

    /// Per-request fetch timeout, humantime format ("30s", "2m").
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,

    /// Wall-clock budget for evaluating one fetched script.
    #[serde(default = "default_eval_timeout")]
    pub eval_timeout: String,
}

fn default_fetch_timeout() -> String {
    DEFAULT_FETCH_TIMEOUT.to_string()
}

fn default_eval_timeout() -> String {
    DEFAULT_EVAL_TIMEOUT.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.distributions.is_empty() {
            return Err(Error::Validation("no distributions configured".into()));
        }
        if self.types.is_empty() {
            return Err(Error::Validation("no types configured".into()));
        }
        if self.platforms.is_empty() {
            return Err(Error::Validation("no platforms configured".into()));
        }

        for distribution in &self.distributions {
            for type_name in &self.types {
                if self.source_url(distribution, type_name).is_none() {
                    return Err(Error::Validation(format!(
                        "no source url configured for {distribution}/{type_name}"
                    )));
                }
            }
        }

        parse_duration(&self.fetch_timeout, "fetch_timeout")?;
        parse_duration(&self.eval_timeout, "eval_timeout")?;
        Ok(())
    }

    pub fn source_url(&self, distribution: &str, type_name: &str) -> Option<&str> {
        self.sources
            .get(distribution)?
            .get(type_name)
            .map(String::as_str)
    }

    pub fn fetch_timeout(&self) -> Duration {
        // validated at load time
        humantime::parse_duration(&self.fetch_timeout)
            .unwrap_or(Duration::from_secs(30))
    }

    pub fn eval_timeout(&self) -> Duration {
        humantime::parse_duration(&self.eval_timeout)
            .unwrap_or(Duration::from_secs(10))
    }

    pub fn has_distribution(&self, distribution: &str) -> bool {
        self.distributions.iter().any(|d| d == distribution)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }
}

fn parse_duration(value: &str, field: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| Error::Validation(format!("invalid {field} '{value}': {e}")))
}

/// Default database path (~/.local/share/intrack/intrack.db or platform equivalent)
pub fn default_db_path() -> Result<PathBuf> {
    let data_dir = directories::ProjectDirs::from("", "", "intrack")
        .ok_or_else(|| Error::Validation("could not determine data directory".into()))?
        .data_dir()
        .to_path_buf();

    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join("intrack.db"))
}
