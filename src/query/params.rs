use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::video_store::{
    PageRequest, SortField, SortOrder, VideoFilter, VideoSort, MAX_PAGE_SIZE,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryValidationError {
    #[error("page must be >= 1, got {0}")]
    InvalidPage(i64),
    #[error("size must be between 1 and {}, got {0}", MAX_PAGE_SIZE)]
    InvalidPageSize(i64),
    #[error("sort_by must be 'published_at' or 'title', got '{0}'")]
    InvalidSortField(String),
    #[error("sort_order must be 'asc' or 'desc', got '{0}'")]
    InvalidSortOrder(String),
    #[error("{field} is not a valid ISO 8601 timestamp: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("published_after must not be later than published_before")]
    InvertedDateRange,
    #[error("q must not be empty")]
    EmptySearchTerm,
    #[error("invalid query string: {0}")]
    Malformed(String),
}

/// Query string of `GET /videos` and `GET /videos/count`.
#[derive(Debug, Default, Deserialize)]
pub struct ListVideosParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub search: Option<String>,
    pub published_after: Option<String>,
    pub published_before: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Query string of `GET /videos/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchVideosParams {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// A fully validated store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoQuery {
    pub filter: VideoFilter,
    pub sort: VideoSort,
    pub page: PageRequest,
}

pub fn parse_page(page: Option<i64>, size: Option<i64>) -> Result<PageRequest, QueryValidationError> {
    let page = page.unwrap_or(DEFAULT_PAGE);
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
    let page_u32 = u32::try_from(page).map_err(|_| QueryValidationError::InvalidPage(page))?;
    let size_u32 = u32::try_from(size).map_err(|_| QueryValidationError::InvalidPageSize(size))?;
    if page_u32 == 0 {
        return Err(QueryValidationError::InvalidPage(page));
    }
    PageRequest::new(page_u32, size_u32).ok_or(QueryValidationError::InvalidPageSize(size))
}

pub fn parse_sort(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> Result<VideoSort, QueryValidationError> {
    let field = match sort_by {
        None | Some("published_at") => SortField::PublishedAt,
        Some("title") => SortField::Title,
        Some(other) => return Err(QueryValidationError::InvalidSortField(other.to_string())),
    };
    let order = match sort_order {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => return Err(QueryValidationError::InvalidSortOrder(other.to_string())),
    };
    Ok(VideoSort { field, order })
}

/// Accepts RFC 3339, or a naive date-time / date taken as UTC.
pub fn parse_timestamp(
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, QueryValidationError> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(t.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(t) = date.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(QueryValidationError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}

fn parse_optional_timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, QueryValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_timestamp(field, v))
        .transpose()
}

impl ListVideosParams {
    pub fn to_filter(&self) -> Result<VideoFilter, QueryValidationError> {
        let published_after =
            parse_optional_timestamp("published_after", self.published_after.as_deref())?;
        let published_before =
            parse_optional_timestamp("published_before", self.published_before.as_deref())?;
        if let (Some(after), Some(before)) = (published_after, published_before) {
            if after > before {
                return Err(QueryValidationError::InvertedDateRange);
            }
        }
        Ok(VideoFilter {
            search: self.search.clone().filter(|s| !s.is_empty()),
            published_after,
            published_before,
        })
    }

    pub fn to_query(&self) -> Result<VideoQuery, QueryValidationError> {
        Ok(VideoQuery {
            page: parse_page(self.page, self.size)?,
            sort: parse_sort(self.sort_by.as_deref(), self.sort_order.as_deref())?,
            filter: self.to_filter()?,
        })
    }
}

impl SearchVideosParams {
    pub fn to_query(&self) -> Result<VideoQuery, QueryValidationError> {
        let term = self
            .q
            .clone()
            .filter(|q| !q.is_empty())
            .ok_or(QueryValidationError::EmptySearchTerm)?;
        Ok(VideoQuery {
            page: parse_page(self.page, self.size)?,
            sort: parse_sort(self.sort_by.as_deref(), self.sort_order.as_deref())?,
            filter: VideoFilter {
                search: Some(term),
                ..Default::default()
            },
        })
    }
}
