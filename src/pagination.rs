//! Keyset pagination on top of [`Cursor`]
//!
//! Queries fetch `limit + 1` rows ordered by timestamp. The extra row only
//! tells us whether another page exists; the cursor handed back to the client
//! is the timestamp of the last row actually returned.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn clamp_page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Query parameters for a cursor-paginated listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub cursor: Option<Cursor>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        clamp_page_size(self.limit)
    }

    /// Number of rows to request so that a following page can be detected
    pub fn fetch_limit(&self) -> i64 {
        self.limit() + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Build a page from up to `limit + 1` rows, keyed by `key`
    ///
    /// A `limit` below 1 is treated as 1 so a non-empty result always moves
    /// the cursor forward.
    pub fn from_rows<Tz, F>(mut rows: Vec<T>, limit: i64, key: F) -> Self
    where
        Tz: TimeZone,
        F: Fn(&T) -> DateTime<Tz>,
    {
        let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        if rows.len() <= limit {
            return Self {
                items: rows,
                next_cursor: None,
            };
        }

        rows.truncate(limit);
        let next_cursor = rows.last().map(|row| Cursor::new(&key(row)));
        Self {
            items: rows,
            next_cursor,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}
