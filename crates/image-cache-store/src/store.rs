//! Filesystem-backed store: one payload per cache key

use crate::error::Result;
use crate::record::CacheRecord;
use crate::types::CacheEntry;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Namespaced blob store rooted at a single directory
///
/// Cloning is cheap; clones share the same on-disk tree.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    pub fn key_dir(&self, namespace: &str, cache_key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(cache_key)
    }

    /// Read the entry stored for `cache_key`, if any.
    ///
    /// Every failure is reported as a miss. A directory caught mid-replacement
    /// by a concurrent `store` reads as absent.
    pub async fn lookup(&self, namespace: &str, cache_key: &str) -> Option<CacheEntry> {
        let dir = self.key_dir(namespace, cache_key);

        let mut files = match fs::read_dir(&dir).await {
            Ok(files) => files,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(namespace, cache_key, "Cache miss");
                return None;
            }
            Err(e) => {
                error!(namespace, cache_key, error = %e, "Failed to read cache directory");
                return None;
            }
        };

        let file = match files.next_entry().await {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!(namespace, cache_key, "Cache directory is empty");
                return None;
            }
            Err(e) => {
                error!(namespace, cache_key, error = %e, "Failed to list cache directory");
                return None;
            }
        };

        let file_name = file.file_name().to_string_lossy().into_owned();
        let record = match CacheRecord::parse(&file_name) {
            Ok(record) => record,
            Err(e) => {
                warn!(namespace, cache_key, error = %e, "Ignoring corrupt cache entry");
                return None;
            }
        };

        let payload = match fs::read(file.path()).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(namespace, cache_key, "Cache entry vanished while reading");
                return None;
            }
            Err(e) => {
                error!(namespace, cache_key, error = %e, "Failed to read cached file");
                return None;
            }
        };

        let is_stale = record.is_expired_at(now_millis());
        debug!(namespace, cache_key, is_stale, "Cache hit");

        Some(CacheEntry {
            record,
            payload,
            is_stale,
        })
    }

    /// Replace whatever is stored for `cache_key` with `payload`
    pub async fn store(
        &self,
        namespace: &str,
        cache_key: &str,
        payload: &[u8],
        record: &CacheRecord,
    ) -> Result<()> {
        let dir = self.key_dir(namespace, cache_key);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(namespace, cache_key, error = %e, "Failed to remove previous cache entry");
            }
        }

        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(record.file_name()), payload).await?;

        debug!(namespace, cache_key, size = payload.len(), "Cached payload");
        Ok(())
    }

    /// Delete every key directory in `namespace` holding an expired record.
    ///
    /// Returns the number of key directories removed. Best-effort: errors on
    /// one key are logged and the walk continues.
    pub async fn purge_expired(&self, namespace: &str) -> usize {
        let dir = self.namespace_dir(namespace);

        let mut keys = match fs::read_dir(&dir).await {
            Ok(keys) => keys,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(namespace, "Cache namespace does not exist; nothing to purge");
                return 0;
            }
            Err(e) => {
                error!(namespace, error = %e, "Failed to read cache namespace");
                return 0;
            }
        };

        let now = now_millis();
        let mut deleted = 0;

        loop {
            let key = match keys.next_entry().await {
                Ok(Some(key)) => key,
                Ok(None) => break,
                Err(e) => {
                    error!(namespace, error = %e, "Failed to list cache namespace");
                    break;
                }
            };

            match key.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(namespace, error = %e, "Failed to stat cache entry");
                    continue;
                }
            }

            let key_path = key.path();
            if !key_dir_expired(namespace, &key_path, now).await {
                continue;
            }

            match fs::remove_dir_all(&key_path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => deleted += 1,
                Err(e) => {
                    error!(namespace, path = ?key_path, error = %e, "Failed to remove expired entry");
                }
            }
        }

        deleted
    }

    /// Remove the key directory for `cache_key`. Returns whether anything was removed.
    pub async fn delete_key(&self, namespace: &str, cache_key: &str) -> bool {
        let dir = self.key_dir(namespace, cache_key);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(namespace, cache_key, "Cleared cache entry");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(namespace, cache_key, "Cache entry does not exist; nothing to clear");
                false
            }
            Err(e) => {
                error!(namespace, cache_key, error = %e, "Failed to clear cache entry");
                false
            }
        }
    }

    /// Total size in bytes of every file under `namespace`
    pub async fn directory_size(&self, namespace: &str) -> u64 {
        let mut pending = vec![self.namespace_dir(namespace)];
        let mut total = 0;

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = ?dir, error = %e, "Failed to read directory while sizing cache");
                    continue;
                }
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }

        total
    }

    /// Number of key directories in `namespace`
    pub async fn entry_count(&self, namespace: &str) -> usize {
        let mut entries = match fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(namespace, error = %e, "Failed to count cache entries");
                return 0;
            }
        };

        let mut count = 0;
        while let Ok(Some(_)) = entries.next_entry().await {
            count += 1;
        }
        count
    }
}

/// Whether any record in a key directory has expired. Unreadable or corrupt
/// records are left in place.
async fn key_dir_expired(namespace: &str, key_path: &Path, now: i64) -> bool {
    let mut files = match fs::read_dir(key_path).await {
        Ok(files) => files,
        Err(e) if e.kind() == ErrorKind::NotFound => return false,
        Err(e) => {
            error!(namespace, path = ?key_path, error = %e, "Failed to read cache entry");
            return false;
        }
    };

    while let Ok(Some(file)) = files.next_entry().await {
        let file_name = file.file_name().to_string_lossy().into_owned();
        match CacheRecord::parse(&file_name) {
            Ok(record) if record.is_expired_at(now) => return true,
            Ok(_) => {}
            Err(e) => {
                warn!(namespace, path = ?key_path, error = %e, "Skipping corrupt cache entry");
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    const NS: &str = "tmdb";

    fn record_expiring_in(millis: i64) -> CacheRecord {
        CacheRecord::new(86400, now_millis() + millis, "etag", "jpeg")
    }

    #[tokio::test]
    async fn test_lookup_missing_is_absent() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        assert!(store.lookup(NS, "never-written").await.is_none());
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let record = record_expiring_in(60_000);

        store.store(NS, "key", b"image-bytes", &record).await.unwrap();

        let entry = store.lookup(NS, "key").await.unwrap();
        assert_eq!(entry.payload, b"image-bytes");
        assert_eq!(entry.record, record);
        assert!(!entry.is_stale);
    }

    #[tokio::test]
    async fn test_store_replaces_previous_entry() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        let first = CacheRecord::new(60, now_millis() + 60_000, "first", "png");
        let second = CacheRecord::new(120, now_millis() + 120_000, "second", "webp");
        store.store(NS, "key", b"one", &first).await.unwrap();
        store.store(NS, "key", b"two", &second).await.unwrap();

        let files = std::fs::read_dir(store.key_dir(NS, "key")).unwrap().count();
        assert_eq!(files, 1);

        let entry = store.lookup(NS, "key").await.unwrap();
        assert_eq!(entry.payload, b"two");
        assert_eq!(entry.record, second);
    }

    #[tokio::test]
    async fn test_entry_goes_stale_after_expiry() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        store
            .store(NS, "key", b"data", &record_expiring_in(1_000))
            .await
            .unwrap();
        assert!(!store.lookup(NS, "key").await.unwrap().is_stale);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(store.lookup(NS, "key").await.unwrap().is_stale);
    }

    #[tokio::test]
    async fn test_key_dir_mid_replacement_reads_as_miss() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        // Directory recreated by a concurrent store, payload not yet written
        std::fs::create_dir_all(store.key_dir(NS, "key")).unwrap();

        assert!(store.lookup(NS, "key").await.is_none());

        store
            .store(NS, "key", b"data", &record_expiring_in(10_000))
            .await
            .unwrap();
        assert_eq!(store.lookup(NS, "key").await.unwrap().payload, b"data");
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_miss() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let key_dir = store.key_dir(NS, "key");
        std::fs::create_dir_all(&key_dir).unwrap();
        std::fs::write(key_dir.join("garbage"), b"data").unwrap();

        assert!(store.lookup(NS, "key").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        store
            .store(NS, "expired", b"old", &record_expiring_in(-10_000))
            .await
            .unwrap();
        store
            .store(NS, "fresh", b"new", &record_expiring_in(10_000))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(NS).await, 1);
        assert!(store.lookup(NS, "expired").await.is_none());
        assert_eq!(store.lookup(NS, "fresh").await.unwrap().payload, b"new");
        assert_eq!(store.entry_count(NS).await, 1);
    }

    #[tokio::test]
    async fn test_purge_missing_namespace() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        assert_eq!(store.purge_expired("nothing-here").await, 0);
    }

    #[tokio::test]
    async fn test_purge_skips_corrupt_entries() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        let corrupt = store.key_dir(NS, "corrupt");
        std::fs::create_dir_all(&corrupt).unwrap();
        std::fs::write(corrupt.join("60.never.etag.png"), b"data").unwrap();
        store
            .store(NS, "expired", b"old", &record_expiring_in(-10_000))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(NS).await, 1);
        assert!(corrupt.exists());
    }

    #[tokio::test]
    async fn test_delete_key() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        store
            .store(NS, "key", b"data", &record_expiring_in(10_000))
            .await
            .unwrap();

        assert!(store.delete_key(NS, "key").await);
        assert!(store.lookup(NS, "key").await.is_none());
        assert!(!store.delete_key(NS, "key").await);
    }

    #[tokio::test]
    async fn test_size_and_count() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());

        assert_eq!(store.directory_size(NS).await, 0);
        assert_eq!(store.entry_count(NS).await, 0);

        store
            .store(NS, "a", &[0u8; 100], &record_expiring_in(10_000))
            .await
            .unwrap();
        store
            .store(NS, "b", &[0u8; 250], &record_expiring_in(10_000))
            .await
            .unwrap();

        assert_eq!(store.directory_size(NS).await, 350);
        assert_eq!(store.entry_count(NS).await, 2);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().to_path_buf());
        store
            .store("avatar", "key", b"data", &record_expiring_in(-10_000))
            .await
            .unwrap();

        assert!(store.lookup(NS, "key").await.is_none());
        assert_eq!(store.purge_expired(NS).await, 0);
        assert_eq!(store.entry_count("avatar").await, 1);
    }
}
