//! Persistent collection of discovered videos.

mod models;
mod schema;
mod sqlite_video_store;

pub use models::{
    BatchInsertOutcome, PageRequest, SortField, SortOrder, StoredVideo, VideoFilter, VideoItem,
    VideoQueryResult, VideoSort, MAX_PAGE_SIZE,
};
pub use sqlite_video_store::SqliteVideoStore;

use anyhow::Result;

/// Storage contract shared by the ingestion loop (writer) and the query API (readers).
///
/// Identifier uniqueness is enforced by the storage layer itself, so concurrent
/// inserts of the same `video_id` never produce two rows.
pub trait VideoStore: Send + Sync {
    /// Inserts `item` unless a row with the same `video_id` exists.
    /// Returns `true` if a row was inserted.
    fn insert_if_absent(&self, item: &VideoItem) -> Result<bool>;

    /// Inserts every absent item in one transaction. On error nothing is committed.
    fn insert_batch(&self, items: &[VideoItem]) -> Result<BatchInsertOutcome>;

    fn contains(&self, video_id: &str) -> Result<bool>;

    /// Returns the requested page of matching videos plus the total match count,
    /// both read from the same snapshot.
    fn query(
        &self,
        filter: &VideoFilter,
        sort: VideoSort,
        page: PageRequest,
    ) -> Result<VideoQueryResult>;

    fn count(&self, filter: &VideoFilter) -> Result<u64>;
}
