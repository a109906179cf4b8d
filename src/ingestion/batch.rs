//! Turns a raw upstream batch into storable videos.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::video_store::{VideoItem, VideoStore};

/// Thumbnail variants from best to worst.
const THUMBNAIL_PREFERENCE: [&str; 4] = ["maxres", "high", "medium", "default"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemMalformed {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid publishedAt `{value}`: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("unexpected item shape: {0}")]
    InvalidShape(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedItem {
    /// Position of the item in the upstream response.
    pub position: usize,
    pub video_id: Option<String>,
    pub reason: ItemMalformed,
}

#[derive(Debug, Default)]
pub struct PreparedBatch {
    /// New videos in upstream order, ready for a single transactional insert.
    pub staged: Vec<VideoItem>,
    /// Items already stored or repeated earlier in the same batch.
    pub skipped: usize,
    pub malformed: Vec<MalformedItem>,
    /// Latest parseable `publishedAt` across every returned item, staged or not.
    pub max_published_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawItem {
    id: Option<RawId>,
    snippet: Option<RawSnippet>,
}

#[derive(Deserialize)]
struct RawId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct RawSnippet {
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    title: Option<String>,
    description: Option<String>,
    thumbnails: Option<HashMap<String, RawThumbnail>>,
}

#[derive(Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ItemMalformed> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ItemMalformed::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Best available thumbnail URL, or empty when no known variant is present.
fn select_thumbnail(thumbnails: &HashMap<String, RawThumbnail>) -> String {
    THUMBNAIL_PREFERENCE
        .iter()
        .find_map(|quality| thumbnails.get(*quality))
        .and_then(|thumbnail| thumbnail.url.clone())
        .unwrap_or_default()
}

fn raw_video_id(value: &Value) -> Option<String> {
    value
        .get("id")?
        .get("videoId")?
        .as_str()
        .map(str::to_string)
}

fn raw_published_at(value: &Value) -> Option<DateTime<Utc>> {
    let published_at = value.get("snippet")?.get("publishedAt")?.as_str()?;
    parse_timestamp(published_at).ok()
}

/// Builds a [`VideoItem`] from one upstream search result.
pub fn parse_item(value: &Value) -> Result<VideoItem, ItemMalformed> {
    let raw = RawItem::deserialize(value).map_err(|e| ItemMalformed::InvalidShape(e.to_string()))?;

    let video_id = raw
        .id
        .and_then(|id| id.video_id)
        .filter(|id| !id.is_empty())
        .ok_or(ItemMalformed::MissingField("id.videoId"))?;
    let snippet = raw.snippet.ok_or(ItemMalformed::MissingField("snippet"))?;
    let published_at = snippet
        .published_at
        .as_deref()
        .ok_or(ItemMalformed::MissingField("snippet.publishedAt"))
        .and_then(parse_timestamp)?;

    Ok(VideoItem {
        video_url: VideoItem::watch_url(&video_id),
        video_id,
        title: snippet.title.unwrap_or_default(),
        description: snippet.description.unwrap_or_default(),
        published_at,
        thumbnail_url: snippet
            .thumbnails
            .as_ref()
            .map(select_thumbnail)
            .unwrap_or_default(),
    })
}

/// Parses, deduplicates and stages `items`. A malformed item is recorded and skipped
/// without affecting the rest. Errors only when the store cannot be read.
pub fn prepare_batch(items: &[Value], store: &dyn VideoStore) -> Result<PreparedBatch> {
    let mut batch = PreparedBatch::default();
    let mut seen = HashSet::new();

    for (position, value) in items.iter().enumerate() {
        if let Some(published_at) = raw_published_at(value) {
            batch.max_published_at = batch.max_published_at.max(Some(published_at));
        }

        let item = match parse_item(value) {
            Ok(item) => item,
            Err(reason) => {
                batch.malformed.push(MalformedItem {
                    position,
                    video_id: raw_video_id(value),
                    reason,
                });
                continue;
            }
        };

        if !seen.insert(item.video_id.clone()) || store.contains(&item.video_id)? {
            batch.skipped += 1;
            continue;
        }
        batch.staged.push(item);
    }

    Ok(batch)
}
