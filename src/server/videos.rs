//! Read-only video routes.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use super::state::ServerState;
use crate::query::{
    ListVideosParams, QueryError, QueryValidationError, SearchVideosParams, VideoQueryService,
};

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match self {
            QueryError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            QueryError::Storage(err) => {
                error!("Video query failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

fn query_params<T: DeserializeOwned>(
    params: Result<Query<T>, QueryRejection>,
) -> Result<T, QueryError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| QueryValidationError::Malformed(rejection.body_text()).into())
}

async fn list_videos(
    State(service): State<VideoQueryService>,
    params: Result<Query<ListVideosParams>, QueryRejection>,
) -> Result<Response, QueryError> {
    let params = query_params(params)?;
    Ok(Json(service.list(&params)?).into_response())
}

async fn search_videos(
    State(service): State<VideoQueryService>,
    params: Result<Query<SearchVideosParams>, QueryRejection>,
) -> Result<Response, QueryError> {
    let params = query_params(params)?;
    Ok(Json(service.search(&params)?).into_response())
}

async fn count_videos(
    State(service): State<VideoQueryService>,
    params: Result<Query<ListVideosParams>, QueryRejection>,
) -> Result<Response, QueryError> {
    let params = query_params(params)?;
    Ok(Json(service.count(&params)?).into_response())
}

pub fn make_video_routes(state: ServerState) -> Router {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/search", get(search_videos))
        .route("/videos/count", get(count_videos))
        .with_state(state)
}
