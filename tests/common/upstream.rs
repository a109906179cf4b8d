//! Fake upstream search API for ingestion tests
//!
//! Serves `GET /search` on a random port. Requests carrying [`GOOD_API_KEY`]
//! receive the currently configured items, [`EXHAUSTED_API_KEY`] receives a
//! quota error and any other key a bad request.

use super::constants::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct UpstreamState {
    items: Mutex<Vec<Value>>,
    requests: Mutex<Vec<HashMap<String, String>>>,
}

pub struct FakeUpstream {
    /// Base URL to hand to the search client (e.g., "http://127.0.0.1:12345")
    pub base_url: String,
    state: Arc<UpstreamState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

async fn search(
    State(state): State<Arc<UpstreamState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let key = params.get("key").cloned().unwrap_or_default();
    state.requests.lock().unwrap().push(params);

    match key.as_str() {
        GOOD_API_KEY => {
            let items = state.items.lock().unwrap().clone();
            Json(json!({ "kind": "youtube#searchListResponse", "items": items })).into_response()
        }
        EXHAUSTED_API_KEY => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "code": 403, "message": "quotaExceeded" } })),
        )
            .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": "API key not valid" } })),
        )
            .into_response(),
    }
}

impl FakeUpstream {
    pub async fn spawn() -> Self {
        let state = Arc::new(UpstreamState::default());
        let app = Router::new()
            .route("/search", get(search))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake upstream failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Replaces the items returned to the accepted key
    pub fn set_items(&self, items: Vec<Value>) {
        *self.state.items.lock().unwrap() = items;
    }

    /// Query strings of every request received so far, in order
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
