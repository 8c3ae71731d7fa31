//! Per-feed crawl cursors.
//!
//! # Responsibility
//! - Remember, per feed URL, the newest activity time already processed.
//!
//! # Invariants
//! - A stored cursor never moves backwards; `advance` with an older value
//!   leaves the row untouched.
//! - Timestamps are stored as fixed-width ISO-8601 UTC text.

use crate::model::activity::{format_timestamp, parse_timestamp};
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Storage contract for feed cursors.
pub trait CursorStore {
    /// Returns the stored cursor, or `None` when the feed was never crawled.
    fn last_activity_time(&self, feed_url: &str) -> RepoResult<Option<DateTime<Utc>>>;
    /// Upserts the cursor, keeping the newer of stored and given value.
    fn advance(&self, feed_url: &str, time: DateTime<Utc>) -> RepoResult<()>;
}

/// SQLite-backed cursor store.
pub struct SqliteCursorStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCursorStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CursorStore for SqliteCursorStore<'_> {
    fn last_activity_time(&self, feed_url: &str) -> RepoResult<Option<DateTime<Utc>>> {
        let stored = self
            .conn
            .query_row(
                "SELECT last_activity_time FROM feed_cursors WHERE feed_url = ?1;",
                [feed_url],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match stored {
            None => Ok(None),
            Some(text) => parse_timestamp(&text).map(Some).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid timestamp `{text}` in feed_cursors.last_activity_time"
                ))
            }),
        }
    }

    fn advance(&self, feed_url: &str, time: DateTime<Utc>) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO feed_cursors (feed_url, last_activity_time)
             VALUES (?1, ?2)
             ON CONFLICT (feed_url) DO UPDATE
             SET last_activity_time = excluded.last_activity_time
             WHERE excluded.last_activity_time > feed_cursors.last_activity_time;",
            params![feed_url, format_timestamp(time)],
        )?;
        Ok(())
    }
}
