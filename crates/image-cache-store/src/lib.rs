//! Disk-backed image cache
//!
//! Stores one binary payload per cache key under
//! `<root>/<namespace>/<cache_key>/`, with the entry's metadata encoded in
//! the file name so a single directory listing yields both. Reads fail open:
//! anything other than a well-formed entry is reported as a miss.

mod error;
mod record;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use record::{CacheRecord, RECORD_DELIMITER};
pub use store::{now_millis, CacheStore};
pub use types::CacheEntry;
