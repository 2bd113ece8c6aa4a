//! File-name encoding of cache entry metadata
//!
//! A stored payload is named `<max_age>.<expire_at>.<etag>.<extension>`.
//! `max_age` is in seconds, `expire_at` is epoch milliseconds. The etag and
//! extension are sanitized on the way in so that they never contain the
//! delimiter or a path separator.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Separator between the four fields of a record file name
pub const RECORD_DELIMITER: char = '.';

/// Scalar metadata stored alongside a cached payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub max_age: u64,
    pub expire_at: i64,
    pub etag: String,
    pub extension: String,
}

impl CacheRecord {
    pub fn new(max_age: u64, expire_at: i64, etag: &str, extension: &str) -> Self {
        Self {
            max_age,
            expire_at,
            etag: sanitize_field(etag),
            extension: sanitize_field(extension),
        }
    }

    /// Whether the record has expired at `now` (epoch milliseconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expire_at
    }

    /// File name for this record
    pub fn file_name(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.max_age,
            self.expire_at,
            self.etag,
            self.extension,
            d = RECORD_DELIMITER
        )
    }

    /// Decode a stored file name
    pub fn parse(file_name: &str) -> Result<Self> {
        let parts: Vec<&str> = file_name.split(RECORD_DELIMITER).collect();
        let [max_age, expire_at, etag, extension] = parts.as_slice() else {
            return Err(StoreError::InvalidRecord(file_name.to_string()));
        };

        let max_age = max_age
            .parse::<u64>()
            .map_err(|_| StoreError::InvalidRecord(file_name.to_string()))?;
        let expire_at = expire_at
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidRecord(file_name.to_string()))?;

        Ok(Self {
            max_age,
            expire_at,
            etag: etag.to_string(),
            extension: extension.to_string(),
        })
    }
}

/// Strip characters that would break the file-name encoding
fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != RECORD_DELIMITER && *c != '/' && *c != '\\' && *c != '"')
        .collect()
}
