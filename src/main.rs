use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use ytfetcher_server::config::{self, AppConfig, FileConfig, DEFAULT_UPSTREAM_BASE_URL};
use ytfetcher_server::fetcher::{CredentialRotator, YouTubeSearchClient};
use ytfetcher_server::ingestion::{IngestionLoop, IngestionSettings, Watermark};
use ytfetcher_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use ytfetcher_server::video_store::{SqliteVideoStore, VideoStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite video database. Created if missing.
    #[clap(long, env = "DB_PATH", value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, env = "METRICS_PORT", default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Search query sent upstream on every cycle.
    #[clap(long, env = "SEARCH_QUERY", default_value = "cricket")]
    pub search_query: String,

    /// Seconds between fetch cycles.
    #[clap(long, env = "FETCH_INTERVAL", default_value_t = 10)]
    pub fetch_interval: u64,

    /// Seconds to wait after a cycle in which every API key failed.
    #[clap(long, env = "COOLDOWN_INTERVAL", default_value_t = 60)]
    pub cooldown_interval: u64,

    /// Maximum results per fetch, capped at 50.
    #[clap(long, env = "MAX_RESULTS", default_value_t = 50)]
    pub max_results: u32,

    /// How far back the first fetch looks, in minutes.
    #[clap(long, env = "LOOKBACK_MINUTES", default_value_t = 60)]
    pub lookback_minutes: u64,

    /// Comma-separated YouTube Data API keys, tried in order.
    #[clap(long, env = "YOUTUBE_API_KEYS", hide_env_values = true)]
    pub api_keys: Option<String>,

    /// Base URL of the YouTube Data API.
    #[clap(long, env = "UPSTREAM_BASE_URL", default_value = DEFAULT_UPSTREAM_BASE_URL)]
    pub upstream_base_url: String,

    /// Timeout in seconds for upstream requests.
    #[clap(long, env = "UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            search_query: args.search_query.clone(),
            fetch_interval_sec: args.fetch_interval,
            cooldown_interval_sec: args.cooldown_interval,
            max_results: args.max_results,
            lookback_minutes: args.lookback_minutes,
            api_keys: args.api_keys.clone(),
            upstream_base_url: args.upstream_base_url.clone(),
            upstream_timeout_sec: args.upstream_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&(&cli_args).into(), file_config)?;
    let fetcher_settings = app_config.fetcher.clone();

    info!("YouTube fetcher configuration:");
    info!("- Search query: '{}'", fetcher_settings.search_query);
    info!(
        "- Fetch interval: {}s, cooldown: {}s",
        fetcher_settings.fetch_interval.as_secs(),
        fetcher_settings.cooldown_interval.as_secs()
    );
    info!("- Max results: {}", fetcher_settings.max_results);
    info!("- API keys count: {}", fetcher_settings.credentials.len());

    info!("Opening SQLite video database at {:?}...", app_config.db_path);
    let video_store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::new(&app_config.db_path)?);

    info!("Initializing metrics...");
    metrics::init_metrics();

    let shutdown_token = CancellationToken::new();

    let ingestion_handle = if fetcher_settings.credentials.is_empty() {
        warn!("No valid YouTube API keys configured, ingestion is disabled");
        None
    } else {
        let client = YouTubeSearchClient::new(
            &fetcher_settings.upstream_base_url,
            fetcher_settings.upstream_timeout,
        )?;
        let rotator =
            CredentialRotator::new(fetcher_settings.credentials.clone(), Arc::new(client));
        let lookback = chrono::Duration::from_std(fetcher_settings.lookback)
            .context("Lookback window is too large")?;
        let mut ingestion_loop = IngestionLoop::new(
            rotator,
            video_store.clone(),
            Watermark::from_lookback(chrono::Utc::now(), lookback),
            IngestionSettings {
                search_query: fetcher_settings.search_query.clone(),
                max_results: fetcher_settings.max_results,
                fetch_interval: fetcher_settings.fetch_interval,
                cooldown_interval: fetcher_settings.cooldown_interval,
            },
        );
        let token = shutdown_token.clone();
        Some(tokio::spawn(async move {
            ingestion_loop.run(token).await;
        }))
    };

    let metrics_token = shutdown_token.clone();
    let metrics_port = app_config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::run_metrics_server(metrics_port, metrics_token).await {
            error!("Metrics server failed: {:#}", e);
        }
    });
    info!("Metrics available at port {}!", app_config.metrics_port);

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
    };

    let result = tokio::select! {
        result = run_server(
            server_config,
            video_store,
            fetcher_settings.summary(),
            shutdown_token.clone(),
        ) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    if let Some(handle) = ingestion_handle {
        if let Err(e) = handle.await {
            error!("Ingestion task failed: {}", e);
        }
    }
    info!("Shutdown complete");

    result
}
