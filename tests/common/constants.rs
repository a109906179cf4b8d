//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When seeded test data changes, update only this file.

// ============================================================================
// Seeded Videos
// ============================================================================

/// "Cricket World Cup Final Highlights", published 2024-06-01T10:00:00Z
pub const VIDEO_1_ID: &str = "vid-1";

/// "Test Match Day One", published 2024-06-01T11:00:00Z
pub const VIDEO_2_ID: &str = "vid-2";

/// "cricket training drills", published 2024-06-02T09:30:00Z
pub const VIDEO_3_ID: &str = "vid-3";

/// "100% Cricket_Stats", published 2024-06-03T00:00:00Z
pub const VIDEO_4_ID: &str = "vid-4";

/// "Football roundup", published 2024-06-03T00:00:00Z (same instant as vid-4)
pub const VIDEO_5_ID: &str = "vid-5";

/// Number of videos seeded into every test database
pub const SEEDED_VIDEOS_COUNT: u64 = 5;

/// Seeded videos whose title or description contains "cricket" (any case)
pub const CRICKET_VIDEOS_COUNT: u64 = 3;

// ============================================================================
// Upstream
// ============================================================================

/// Search query configured for the test fetcher
pub const TEST_SEARCH_QUERY: &str = "cricket";

/// API key that the fake upstream accepts
pub const GOOD_API_KEY: &str = "good-key-0123456789";

/// API key that the fake upstream rejects as over quota
pub const EXHAUSTED_API_KEY: &str = "spent-key-9876543210";

// ============================================================================
// Timeouts
// ============================================================================

/// Max time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout for individual HTTP requests in tests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
