use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use lokiscope_logs::{
    LabelFilter, SavedFilter, SelectorError, SessionConfig, is_label_name, parse_selector,
};

use crate::Args;

const DEFAULT_LOOKBACK_MINUTES: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no endpoint configured; pass --endpoint or set `endpoint` in the config file")]
    MissingEndpoint,

    #[error("no namespace configured; pass --namespace, --selector or set `namespace`")]
    MissingNamespace,

    #[error("invalid label '{0}', expected name=value")]
    InvalidLabel(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("lookback of {0} minutes is too large")]
    LookbackTooLarge(u64),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Settings read from `config.toml`. Every field is optional; the CLI wins.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub search: Option<String>,
    pub token: Option<String>,
    pub org_id: Option<String>,
    pub limit: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub lookback_minutes: Option<u64>,
    pub scroll_margin: Option<usize>,
    pub presets: Vec<SavedFilter>,
}

impl FileConfig {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Load an explicit path, or the default location if it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `$XDG_CONFIG_HOME/lokiscope/config.toml` (or the platform equivalent)
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lokiscope").join("config.toml"))
}

/// Fully resolved startup settings
#[derive(Debug)]
pub struct Settings {
    pub endpoint: String,
    pub token: Option<String>,
    pub org_id: Option<String>,
    pub lookback: Duration,
    pub session: SessionConfig,
    pub filter: LabelFilter,
    pub presets: Vec<SavedFilter>,
}

impl Settings {
    /// Layer CLI arguments over the config file
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let endpoint = args
            .endpoint
            .clone()
            .or(file.endpoint)
            .ok_or(ConfigError::MissingEndpoint)?;

        let filter = match &args.selector {
            Some(selector) => parse_selector(selector)?,
            None => {
                let namespace = args
                    .namespace
                    .clone()
                    .or(file.namespace)
                    .ok_or(ConfigError::MissingNamespace)?;

                if let Some(name) = file.labels.keys().find(|name| !is_label_name(name)) {
                    return Err(ConfigError::InvalidLabel(name.clone()));
                }
                let mut filter = LabelFilter::from_params(namespace, file.labels);
                for raw in &args.labels {
                    let (name, value) = parse_label(raw)?;
                    filter.add_label(name, value);
                }
                if let Some(search) = args.search.clone().or(file.search) {
                    filter.set_search(search);
                }
                filter
            }
        };

        let defaults = SessionConfig::default();
        let page_limit = args.limit.or(file.limit).unwrap_or(defaults.page_limit);
        if page_limit == 0 {
            return Err(ConfigError::Zero("limit"));
        }

        let poll_interval = match args.poll_interval.or(file.poll_interval_secs) {
            Some(0) => return Err(ConfigError::Zero("poll interval")),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.poll_interval,
        };

        let lookback_minutes = args
            .lookback
            .or(file.lookback_minutes)
            .unwrap_or(DEFAULT_LOOKBACK_MINUTES);
        if lookback_minutes == 0 {
            return Err(ConfigError::Zero("lookback"));
        }
        let lookback_secs = lookback_minutes
            .checked_mul(60)
            .ok_or(ConfigError::LookbackTooLarge(lookback_minutes))?;

        Ok(Self {
            endpoint,
            token: args.token.clone().or(file.token),
            org_id: args.org_id.clone().or(file.org_id),
            lookback: Duration::from_secs(lookback_secs),
            session: SessionConfig {
                poll_interval,
                page_limit,
                scroll_margin: file.scroll_margin.unwrap_or(defaults.scroll_margin),
            },
            filter,
            presets: file.presets,
        })
    }

    pub fn lookback_minutes(&self) -> u64 {
        self.lookback.as_secs() / 60
    }
}

fn parse_label(raw: &str) -> Result<(&str, &str), ConfigError> {
    match raw.split_once('=') {
        Some((name, value)) if is_label_name(name.trim()) => Ok((name.trim(), value.trim())),
        _ => Err(ConfigError::InvalidLabel(raw.to_string())),
    }
}
