//! Layered configuration for `indicators-watch`.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file, then
//! environment variables and CLI flags (clap resolves those two together).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

use lib_indicators::indicators::HistoryPeriod;

/// Config file read when `--config-path` is not given.
const DEFAULT_CONFIG_FILE: &str = "indicators_watch.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(
    name = "indicators-watch",
    version,
    author = "ckir",
    about = "Watches Argentine economic indicators and prints every refresh."
)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(
        long,
        env = "INDICATORS_API_BASE",
        help = "API root, e.g. http://localhost:8000/api/v1. Unset falls back to .env, then the library default."
    )]
    pub api_base: Option<String>,

    #[clap(long, env = "INDICATORS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "INDICATORS_LOG_DIR", help = "Directory for JSON log files. Unset disables file logging.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "INDICATORS_LOG_LEVEL", help = "Log filter used when RUST_LOG is unset.")]
    pub log_level: Option<String>,

    #[clap(long, env = "INDICATORS_TIMEOUT_SECS", help = "Per-request timeout in seconds.")]
    pub timeout_secs: Option<u64>,

    #[clap(long, env = "INDICATORS_INTERVAL_SECS", help = "Refresh period of the current snapshot in seconds.")]
    pub interval_secs: Option<u64>,

    #[clap(long, env = "INDICATORS_HISTORY_DAYS", help = "History window for tracked series.")]
    pub history_days: Option<u32>,

    #[clap(
        long,
        env = "INDICATORS_HISTORY_PERIOD",
        help = "Chart preset for tracked series (1D, 1W, 1M, 3M, 6M, 1Y, MAX). Overrides --history-days."
    )]
    pub history_period: Option<String>,

    #[clap(
        long = "track",
        env = "INDICATORS_TRACK",
        value_delimiter = ',',
        help = "Indicator ids whose history should be tracked (repeatable or comma separated)."
    )]
    #[serde(default)]
    pub track: Vec<String>,

    #[clap(long, action = ArgAction::SetTrue, help = "Fetch once, print and exit.")]
    #[serde(default)]
    pub once: bool,

    #[clap(long, action = ArgAction::SetTrue, help = "Ask the API to recompute its cache before fetching.")]
    #[serde(default)]
    pub trigger_refresh: bool,
}

impl Config {
    /// History window for tracked series: the period preset if one is set,
    /// else `history_days`.
    pub fn history_window(&self) -> Option<u32> {
        self.history_period
            .as_deref()
            .map(|label| HistoryPeriod::from_label(label).days())
            .or(self.history_days)
    }

    /// Merges two configs; `other` wins wherever it has a value.
    fn merge(self, other: Config) -> Config {
        Config {
            api_base: other.api_base.or(self.api_base),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            interval_secs: other.interval_secs.or(self.interval_secs),
            history_days: other.history_days.or(self.history_days),
            history_period: other.history_period.or(self.history_period),
            track: if other.track.is_empty() { self.track } else { other.track },
            once: other.once || self.once,
            trigger_refresh: other.trigger_refresh || self.trigger_refresh,
        }
    }

    fn defaults() -> Config {
        Config {
            log_level: Some("info".to_string()),
            timeout_secs: Some(10),
            interval_secs: Some(300),
            history_days: Some(30),
            ..Default::default()
        }
    }
}

/// Resolves the effective configuration for `cli`.
pub fn resolve(cli: Config) -> Result<Config> {
    let path = cli.config_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = Config::defaults();

    if path.exists() {
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let file: Config = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config = config.merge(file);
    } else if cli.config_path.is_some() {
        anyhow::bail!("config file {} not found", path.display());
    }

    Ok(config.merge(cli))
}

/// Parses the command line and resolves the configuration.
pub fn load_config() -> Result<Config> {
    resolve(Config::parse())
}
