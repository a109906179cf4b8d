//! Test fixture creation for the video database and upstream payloads

use super::constants::*;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use ytfetcher_server::video_store::{SqliteVideoStore, VideoItem, VideoStore};

fn video(id: &str, title: &str, description: &str, published_at: DateTime<Utc>) -> VideoItem {
    VideoItem {
        video_id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        published_at,
        thumbnail_url: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id),
        video_url: VideoItem::watch_url(id),
    }
}

/// Creates a temporary video database seeded with 5 videos
/// Returns (temp_dir, db_path)
pub fn create_test_db_with_videos() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("videos.db");

    let store = SqliteVideoStore::new(&db_path)?;
    store.insert_batch(&[
        video(
            VIDEO_1_ID,
            "Cricket World Cup Final Highlights",
            "All the action from the final",
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        ),
        video(
            VIDEO_2_ID,
            "Test Match Day One",
            "Opening day report",
            Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap(),
        ),
        video(
            VIDEO_3_ID,
            "cricket training drills",
            "",
            Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap(),
        ),
        video(
            VIDEO_4_ID,
            "100% Cricket_Stats",
            "Numbers only",
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
        ),
        video(
            VIDEO_5_ID,
            "Football roundup",
            "Weekend goals",
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
        ),
    ])?;

    Ok((dir, db_path))
}

/// Builds one search result item in the shape the upstream API returns
pub fn upstream_item(video_id: &str, title: &str, published_at: &str) -> Value {
    json!({
        "id": { "kind": "youtube#video", "videoId": video_id },
        "snippet": {
            "title": title,
            "description": format!("{} description", title),
            "publishedAt": published_at,
            "thumbnails": {
                "default": { "url": format!("https://i.ytimg.com/vi/{}/default.jpg", video_id) },
                "high": { "url": format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id) }
            }
        }
    })
}
