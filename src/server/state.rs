use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::config::FetcherSummary;
use crate::query::VideoQueryService;
use crate::video_store::VideoStore;

use super::ServerConfig;

pub type GuardedVideoStore = Arc<dyn VideoStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub query_service: VideoQueryService,
    pub fetcher_summary: Arc<FetcherSummary>,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        video_store: GuardedVideoStore,
        fetcher_summary: FetcherSummary,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            query_service: VideoQueryService::new(video_store),
            fetcher_summary: Arc::new(fetcher_summary),
            hash: env!("GIT_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for VideoQueryService {
    fn from_ref(input: &ServerState) -> Self {
        input.query_service.clone()
    }
}

impl FromRef<ServerState> for Arc<FetcherSummary> {
    fn from_ref(input: &ServerState) -> Self {
        input.fetcher_summary.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
