use super::models::*;
use super::schema::{fold_case, VIDEO_VERSIONED_SCHEMAS};
use super::VideoStore;
use crate::sqlite_persistence::{read_schema_version, VersionedSchema};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const INSERT_IF_ABSENT_SQL: &str = "INSERT INTO videos \
    (video_id, title, description, published_at, thumbnail_url, video_url, \
    title_folded, description_folded) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
    ON CONFLICT(video_id) DO NOTHING";

const SELECT_COLUMNS: &str =
    "id, video_id, title, description, published_at, thumbnail_url, video_url";

#[derive(Clone)]
pub struct SqliteVideoStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVideoStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open video database")?;

        if is_new_db {
            info!("Creating new video database at {:?}", path);
            latest_schema()?.create(&conn)?;
        } else {
            let db_version = read_schema_version(&conn)?;
            if db_version < 1 {
                anyhow::bail!(
                    "Video database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = VIDEO_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version)
                .with_context(|| format!("Unknown video database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Video database schema validation failed for version {}",
                    db_version
                )
            })?;

            let current_version = latest_schema()?.version;
            if (db_version as usize) < current_version {
                info!(
                    "Migrating video database from version {} to {}",
                    db_version, current_version
                );
                Self::migrate_if_needed(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates a store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        latest_schema()?.create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in VIDEO_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            info!(
                "Running video database migration from version {} to {}",
                latest_from, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest_from = schema.version;
        }
        tx.execute(
            &format!(
                "PRAGMA user_version = {}",
                crate::sqlite_persistence::BASE_DB_VERSION + latest_from
            ),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Video store connection lock poisoned"))
    }
}

fn latest_schema() -> Result<&'static VersionedSchema> {
    VIDEO_VERSIONED_SCHEMAS
        .last()
        .ok_or_else(|| anyhow!("No video schema defined"))
}

fn insert_row(conn: &Connection, item: &VideoItem) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        INSERT_IF_ABSENT_SQL,
        params![
            item.video_id,
            item.title,
            item.description,
            item.published_at.timestamp_millis(),
            item.thumbnail_url,
            item.video_url,
            fold_case(&item.title),
            fold_case(&item.description),
        ],
    )?;
    Ok(changed == 1)
}

fn row_to_video(row: &Row) -> rusqlite::Result<StoredVideo> {
    let published_millis: i64 = row.get(4)?;
    let published_at = DateTime::<Utc>::from_timestamp_millis(published_millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, published_millis))?;
    Ok(StoredVideo {
        id: row.get(0)?,
        item: VideoItem {
            video_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            published_at,
            thumbnail_url: row.get(5)?,
            video_url: row.get(6)?,
        },
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Smallest stored millisecond value not earlier than `after`. Rows hold whole
/// milliseconds, so a bound with a sub-millisecond part rounds up.
fn lower_bound_millis(after: DateTime<Utc>) -> i64 {
    let millis = after.timestamp_millis();
    if after.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

/// Builds the WHERE clause (possibly empty) and its positional parameters.
fn where_clause(filter: &VideoFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&fold_case(search)));
        conditions.push(
            "(title_folded LIKE ? ESCAPE '\\' OR description_folded LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
    if let Some(after) = filter.published_after {
        conditions.push("published_at >= ?".to_string());
        values.push(Value::Integer(lower_bound_millis(after)));
    }
    if let Some(before) = filter.published_before {
        conditions.push("published_at <= ?".to_string());
        values.push(Value::Integer(before.timestamp_millis()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn order_clause(sort: VideoSort) -> String {
    let column = match sort.field {
        SortField::PublishedAt => "published_at",
        SortField::Title => "title",
    };
    let direction = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {} {}, video_id ASC", column, direction)
}

fn count_matching(conn: &Connection, where_sql: &str, values: &[Value]) -> Result<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM videos{}", where_sql),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

impl VideoStore for SqliteVideoStore {
    fn insert_if_absent(&self, item: &VideoItem) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = insert_row(&conn, item)
            .with_context(|| format!("Failed to insert video {}", item.video_id))?;
        Ok(inserted)
    }

    fn insert_batch(&self, items: &[VideoItem]) -> Result<BatchInsertOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut outcome = BatchInsertOutcome::default();
        for item in items {
            if insert_row(&tx, item)
                .with_context(|| format!("Failed to insert video {}", item.video_id))?
            {
                outcome.inserted += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        tx.commit().context("Failed to commit video batch")?;
        debug!(
            "Committed video batch: {} inserted, {} already present",
            outcome.inserted, outcome.skipped
        );
        Ok(outcome)
    }

    fn contains(&self, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM videos WHERE video_id = ?1)",
            params![video_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn query(
        &self,
        filter: &VideoFilter,
        sort: VideoSort,
        page: PageRequest,
    ) -> Result<VideoQueryResult> {
        let (where_sql, mut values) = where_clause(filter);

        // Count and page are read under the same lock, so they describe one snapshot.
        let conn = self.lock()?;
        let total_count = count_matching(&conn, &where_sql, &values)?;

        let sql = format!(
            "SELECT {} FROM videos{}{} LIMIT ? OFFSET ?",
            SELECT_COLUMNS,
            where_sql,
            order_clause(sort)
        );
        values.push(Value::Integer(page.size() as i64));
        values.push(Value::Integer(page.offset() as i64));

        let mut stmt = conn.prepare(&sql)?;
        let videos = stmt
            .query_map(params_from_iter(values.iter()), row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read videos")?;

        Ok(VideoQueryResult {
            videos,
            total_count,
        })
    }

    fn count(&self, filter: &VideoFilter) -> Result<u64> {
        let (where_sql, values) = where_clause(filter);
        let conn = self.lock()?;
        count_matching(&conn, &where_sql, &values)
    }
}
