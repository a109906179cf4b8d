use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ingestion::CycleReport;

/// Metric name prefix for all fetcher metrics
const PREFIX: &str = "ytfetcher";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Ingestion Metrics
    pub static ref INGESTION_CYCLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_ingestion_cycles_total"), "Ingestion cycles by outcome"),
        &["outcome"]
    ).expect("Failed to create ingestion_cycles_total metric");

    pub static ref CREDENTIAL_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            format!("{PREFIX}_credential_failures_total"),
            "Upstream calls that failed, by failure category"
        ),
        &["category"]
    ).expect("Failed to create credential_failures_total metric");

    pub static ref VIDEOS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            format!("{PREFIX}_videos_ingested_total"),
            "Upstream items processed, by result"
        ),
        &["result"]
    ).expect("Failed to create videos_ingested_total metric");

    pub static ref WATERMARK_TIMESTAMP_SECONDS: Gauge = Gauge::new(
        format!("{PREFIX}_watermark_timestamp_seconds"),
        "Current ingestion watermark as a unix timestamp"
    ).expect("Failed to create watermark_timestamp_seconds metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(INGESTION_CYCLES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CREDENTIAL_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(VIDEOS_INGESTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WATERMARK_TIMESTAMP_SECONDS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_credential_failure(category: &str) {
    CREDENTIAL_FAILURES_TOTAL
        .with_label_values(&[category])
        .inc();
}

pub fn set_watermark(watermark: DateTime<Utc>) {
    WATERMARK_TIMESTAMP_SECONDS.set(watermark.timestamp() as f64);
}

/// Record the outcome and item counts of one ingestion cycle
pub fn record_cycle(report: &CycleReport) {
    INGESTION_CYCLES_TOTAL
        .with_label_values(&[report.outcome.as_str()])
        .inc();

    for (result, count) in [
        ("inserted", report.inserted),
        ("skipped", report.skipped),
        ("malformed", report.malformed.len()),
    ] {
        if count > 0 {
            VIDEOS_INGESTED_TOTAL
                .with_label_values(&[result])
                .inc_by(count as u64);
        }
    }

    set_watermark(report.watermark_after);
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Serves `/metrics` for Prometheus scraping until `shutdown` is cancelled.
pub async fn run_metrics_server(port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
