use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::state::{GuardedVideoStore, ServerState};
use super::videos::make_video_routes;
use super::{log_requests, ServerConfig};
use crate::config::FetcherSummary;
use crate::query::{ListVideosParams, QueryError};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub videos_count: u64,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Result<Response, QueryError> {
    let count = state.query_service.count(&ListVideosParams::default())?;
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        videos_count: count.total_count,
    };
    Ok(Json(stats).into_response())
}

async fn get_config(State(summary): State<Arc<FetcherSummary>>) -> Json<FetcherSummary> {
    Json(summary.as_ref().clone())
}

pub fn make_app(
    config: ServerConfig,
    video_store: GuardedVideoStore,
    fetcher_summary: FetcherSummary,
) -> Router {
    let state = ServerState::new(config, video_store, fetcher_summary);

    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/config", get(get_config))
        .with_state(state.clone());

    home_router
        .merge(make_video_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    video_store: GuardedVideoStore,
    fetcher_summary: FetcherSummary,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, video_store, fetcher_summary);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
