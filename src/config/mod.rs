mod file_config;

pub use file_config::{FetcherConfig, FileConfig};

use crate::fetcher::{Credential, CredentialSet, UPSTREAM_MAX_RESULTS};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub search_query: String,
    pub fetch_interval_sec: u64,
    pub cooldown_interval_sec: u64,
    pub max_results: u32,
    pub lookback_minutes: u64,
    /// Raw comma-separated credential list.
    pub api_keys: Option<String>,
    pub upstream_base_url: String,
    pub upstream_timeout_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            port: 8000,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            search_query: "cricket".to_string(),
            fetch_interval_sec: 10,
            cooldown_interval_sec: 60,
            max_results: UPSTREAM_MAX_RESULTS,
            lookback_minutes: 60,
            api_keys: None,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_timeout_sec: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub fetcher: FetcherSettings,
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub search_query: String,
    pub fetch_interval: Duration,
    pub cooldown_interval: Duration,
    /// Always within `1..=UPSTREAM_MAX_RESULTS`.
    pub max_results: u32,
    pub lookback: Duration,
    pub credentials: CredentialSet,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
}

/// Publicly visible fetcher configuration. Exposes how many credentials exist, never their values.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetcherSummary {
    pub search_query: String,
    pub fetch_interval: u64,
    pub cooldown_interval: u64,
    pub max_results: u32,
    pub api_keys_count: usize,
}

impl FetcherSettings {
    pub fn summary(&self) -> FetcherSummary {
        FetcherSummary {
            search_query: self.search_query.clone(),
            fetch_interval: self.fetch_interval.as_secs(),
            cooldown_interval: self.cooldown_interval.as_secs(),
            max_results: self.max_results,
            api_keys_count: self.credentials.len(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let fetcher = resolve_fetcher(cli, file.fetcher.unwrap_or_default())?;

        Ok(AppConfig {
            db_path,
            port,
            metrics_port,
            logging_level,
            fetcher,
        })
    }
}

fn resolve_fetcher(cli: &CliConfig, file: FetcherConfig) -> Result<FetcherSettings> {
    let search_query = file
        .search_query
        .unwrap_or_else(|| cli.search_query.clone())
        .trim()
        .to_string();
    if search_query.is_empty() {
        bail!("search_query must not be empty");
    }

    let fetch_interval_sec = file.fetch_interval_sec.unwrap_or(cli.fetch_interval_sec);
    let cooldown_interval_sec = file
        .cooldown_interval_sec
        .unwrap_or(cli.cooldown_interval_sec);
    if fetch_interval_sec == 0 {
        bail!("fetch_interval must be greater than 0");
    }
    if cooldown_interval_sec <= fetch_interval_sec {
        bail!(
            "cooldown_interval ({}s) must be longer than fetch_interval ({}s)",
            cooldown_interval_sec,
            fetch_interval_sec
        );
    }

    let requested_max_results = file.max_results.unwrap_or(cli.max_results);
    let max_results = requested_max_results.clamp(1, UPSTREAM_MAX_RESULTS);
    if max_results != requested_max_results {
        warn!(
            "max_results {} is outside 1..={}, using {}",
            requested_max_results, UPSTREAM_MAX_RESULTS, max_results
        );
    }

    let credentials = match file.api_keys {
        Some(keys) => CredentialSet::new(
            keys.iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(Credential::new)
                .collect(),
        ),
        None => cli
            .api_keys
            .as_deref()
            .map(CredentialSet::from_comma_separated)
            .unwrap_or_default(),
    };

    let upstream_timeout_sec = file
        .upstream_timeout_sec
        .unwrap_or(cli.upstream_timeout_sec);
    if upstream_timeout_sec == 0 {
        bail!("upstream_timeout must be greater than 0");
    }

    let lookback_minutes = file.lookback_minutes.unwrap_or(cli.lookback_minutes);
    let Some(lookback_sec) = lookback_minutes.checked_mul(60) else {
        bail!("lookback_minutes is too large: {}", lookback_minutes);
    };

    Ok(FetcherSettings {
        search_query,
        fetch_interval: Duration::from_secs(fetch_interval_sec),
        cooldown_interval: Duration::from_secs(cooldown_interval_sec),
        max_results,
        lookback: Duration::from_secs(lookback_sec),
        credentials,
        upstream_base_url: file
            .upstream_base_url
            .unwrap_or_else(|| cli.upstream_base_url.clone()),
        upstream_timeout: Duration::from_secs(upstream_timeout_sec),
    })
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
