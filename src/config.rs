use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::{
    redirect::{LoadError, RedirectEngine, RuleDefinition},
    telemetry::TelemetryConfig,
};

pub const DEFAULT_NOT_FOUND_PAGE: &str = include_str!("../assets/404.html");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub rules_path: PathBuf,
    pub not_found_path: Option<PathBuf>,
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        Self {
            rules_path: rules_path.into(),
            not_found_path: None,
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Reads and compiles everything the engine needs. Any bad rule fails the whole load.
    pub fn load_engine(&self) -> Result<RedirectEngine, ConfigError> {
        let rules = load_rules(&self.rules_path)?;
        let not_found_page = load_not_found_page(self.not_found_path.as_deref())?;
        let engine = RedirectEngine::new(rules, not_found_page)?;
        info!(
            "loaded {} rules from {}",
            engine.rules().len(),
            self.rules_path.display()
        );
        Ok(engine)
    }
}

pub fn parse_rules(yaml: &str) -> Result<Vec<RuleDefinition>, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(vec![]);
    }
    serde_yaml::from_str(yaml)
}

pub fn load_rules(path: &Path) -> Result<Vec<RuleDefinition>, ConfigError> {
    let yaml = read(path)?;
    parse_rules(&yaml).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

pub fn load_not_found_page(path: Option<&Path>) -> Result<String, ConfigError> {
    match path {
        Some(path) => read(path),
        None => Ok(DEFAULT_NOT_FOUND_PAGE.to_owned()),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}
