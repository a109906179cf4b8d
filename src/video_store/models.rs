use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for a single page of query results.
pub const MAX_PAGE_SIZE: u32 = 100;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// A discovered video as produced by ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: String,
    pub video_url: String,
}

impl VideoItem {
    pub fn watch_url(video_id: &str) -> String {
        format!("{}{}", WATCH_URL_PREFIX, video_id)
    }
}

/// A persisted video together with its storage-assigned row id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredVideo {
    pub id: i64,
    #[serde(flatten)]
    pub item: VideoItem,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoFilter {
    /// Case-insensitive substring matched against title or description.
    pub search: Option<String>,
    /// Inclusive lower bound on `published_at`.
    pub published_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `published_at`.
    pub published_before: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    PublishedAt,
    Title,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoSort {
    pub field: SortField,
    pub order: SortOrder,
}

/// A validated 1-indexed page request with `1 <= size <= MAX_PAGE_SIZE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Option<Self> {
        if page == 0 || size == 0 || size > MAX_PAGE_SIZE {
            return None;
        }
        Some(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.size as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VideoQueryResult {
    pub videos: Vec<StoredVideo>,
    /// Number of rows matching the filter, independent of paging.
    pub total_count: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchInsertOutcome {
    pub inserted: usize,
    /// Rows that already existed and were left untouched.
    pub skipped: usize,
}
