//! SQLite schema for the video database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};
use rusqlite::{params, Connection};

// =============================================================================
// Version 1 - Discovered videos
// =============================================================================

/// One row per upstream video. `published_at` is stored as unix milliseconds (UTC).
const VIDEOS_TABLE_V1: Table = Table {
    name: "videos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("video_id", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("published_at", &SqlType::Integer, non_null = true),
        sqlite_column!("thumbnail_url", &SqlType::Text, non_null = true),
        sqlite_column!("video_url", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_videos_published_at", "published_at"),
        ("idx_videos_title", "title"),
    ],
};

// =============================================================================
// Version 2 - Unicode-folded search columns
// =============================================================================

/// SQLite `LIKE` only folds ASCII, so searchable text is also stored lowercased
/// with full Unicode case mapping. Both `*_folded` columns are written on insert.
const VIDEOS_TABLE_V2: Table = Table {
    name: "videos",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("video_id", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("published_at", &SqlType::Integer, non_null = true),
        sqlite_column!("thumbnail_url", &SqlType::Text, non_null = true),
        sqlite_column!("video_url", &SqlType::Text, non_null = true),
        sqlite_column!(
            "title_folded",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "description_folded",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
    ],
    indices: &[
        ("idx_videos_published_at", "published_at"),
        ("idx_videos_title", "title"),
    ],
};

/// Case folding applied to searchable text and to search terms.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Migration from version 1 to version 2: add and backfill the folded columns
fn migrate_v1_to_v2(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "ALTER TABLE videos ADD COLUMN title_folded TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    conn.execute(
        "ALTER TABLE videos ADD COLUMN description_folded TEXT NOT NULL DEFAULT ''",
        [],
    )?;

    let mut stmt = conn.prepare("SELECT id, title, description FROM videos")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (id, title, description) in rows {
        conn.execute(
            "UPDATE videos SET title_folded = ?1, description_folded = ?2 WHERE id = ?3",
            params![fold_case(&title), fold_case(&description), id],
        )?;
    }
    Ok(())
}

pub const VIDEO_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[VIDEOS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[VIDEOS_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
