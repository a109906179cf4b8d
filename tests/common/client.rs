//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all video query endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

/// HTTP test client for the read-only query API
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .expect("Request failed")
    }

    // ========================================================================
    // Server Endpoints
    // ========================================================================

    /// GET / - Uptime, build hash and stored video count
    pub async fn get_home(&self) -> Response {
        self.get("/", &[]).await
    }

    /// GET /config - Public fetcher configuration
    pub async fn get_config(&self) -> Response {
        self.get("/config", &[]).await
    }

    // ========================================================================
    // Video Endpoints
    // ========================================================================

    /// GET /videos - Filtered, sorted, paginated listing
    pub async fn list_videos(&self, query: &[(&str, &str)]) -> Response {
        self.get("/videos", query).await
    }

    /// GET /videos/search - Listing restricted by a required search term
    pub async fn search_videos(&self, query: &[(&str, &str)]) -> Response {
        self.get("/videos/search", query).await
    }

    /// GET /videos/count - Number of videos matching the filters
    pub async fn count_videos(&self, query: &[(&str, &str)]) -> Response {
        self.get("/videos/count", query).await
    }
}
