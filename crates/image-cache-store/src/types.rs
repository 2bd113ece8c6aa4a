//! Cache types

use crate::record::CacheRecord;
use serde::{Deserialize, Serialize};

/// A payload read back from the store together with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: CacheRecord,
    pub payload: Vec<u8>,
    /// Computed at read time, `now > expire_at`
    pub is_stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_serialization() {
        let entry = CacheEntry {
            record: CacheRecord::new(86400, 1_700_000_000_000, "etag", "webp"),
            payload: vec![1, 2, 3],
            is_stale: true,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("webp"));
        assert!(json.contains("86400"));

        let deserialized: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.record, entry.record);
        assert_eq!(deserialized.payload, entry.payload);
        assert!(deserialized.is_stale);
    }
}
