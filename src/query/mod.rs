//! Read-only query layer over the video store.
//!
//! Raw request parameters are validated into a [`VideoQuery`] before the store is
//! touched; an invalid parameter never results in a partial query.

mod params;

pub use params::{
    parse_page, parse_sort, parse_timestamp, ListVideosParams, QueryValidationError,
    SearchVideosParams, VideoQuery, DEFAULT_PAGE_SIZE,
};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::video_store::{StoredVideo, VideoStore};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] QueryValidationError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// One page of videos plus paging metadata.
#[derive(Debug, Serialize)]
pub struct VideoPage {
    pub videos: Vec<StoredVideo>,
    pub total_count: u64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VideoCount {
    pub total_count: u64,
}

#[derive(Clone)]
pub struct VideoQueryService {
    store: Arc<dyn VideoStore>,
}

impl VideoQueryService {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    pub fn execute(&self, query: &VideoQuery) -> Result<VideoPage, QueryError> {
        let result = self.store.query(&query.filter, query.sort, query.page)?;

        let size = query.page.size() as u64;
        let page = query.page.page() as u64;
        let total_pages = result.total_count.div_ceil(size);

        Ok(VideoPage {
            videos: result.videos,
            total_count: result.total_count,
            page: query.page.page(),
            size: query.page.size(),
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        })
    }

    pub fn list(&self, params: &ListVideosParams) -> Result<VideoPage, QueryError> {
        self.execute(&params.to_query()?)
    }

    pub fn search(&self, params: &SearchVideosParams) -> Result<VideoPage, QueryError> {
        self.execute(&params.to_query()?)
    }

    /// Counts videos matching the filters of `params`; paging and sort are ignored.
    pub fn count(&self, params: &ListVideosParams) -> Result<VideoCount, QueryError> {
        let filter = params.to_filter()?;
        Ok(VideoCount {
            total_count: self.store.count(&filter)?,
        })
    }
}
