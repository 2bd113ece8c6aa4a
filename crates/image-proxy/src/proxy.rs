//! Stale-while-revalidate image proxy for one cache namespace

use crate::cache_key::derive_cache_key;
use crate::error::{ProxyError, Result};
use crate::fetcher::{HttpFetcher, OriginFetch};
use crate::headers::{extension_for_content_type, normalize_etag, parse_max_age};
use crate::types::{CacheStats, ImageMeta, ImageResponse, ProxyOptions};
use image_cache_store::{now_millis, CacheEntry, CacheRecord, CacheStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

struct ProxyInner {
    namespace: String,
    cache_version: u32,
    store: CacheStore,
    fetcher: Arc<dyn OriginFetch>,
    /// Cache keys with a background refresh in flight
    refreshing: Mutex<HashSet<String>>,
}

/// Serves images for one namespace from disk, fetching from the origin on a
/// miss and refreshing stale entries in the background.
#[derive(Clone)]
pub struct ImageProxy {
    inner: Arc<ProxyInner>,
}

impl ImageProxy {
    /// Create a proxy that fetches from `base_url` over HTTP
    pub fn new(
        namespace: &str,
        base_url: &str,
        store: CacheStore,
        options: ProxyOptions,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(base_url, &options)?;
        Ok(Self::with_fetcher(
            namespace,
            store,
            options.cache_version,
            Arc::new(fetcher),
        ))
    }

    /// Create a proxy around any origin capability
    pub fn with_fetcher(
        namespace: &str,
        store: CacheStore,
        cache_version: u32,
        fetcher: Arc<dyn OriginFetch>,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                namespace: namespace.to_string(),
                cache_version,
                store,
                fetcher,
                refreshing: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn cache_key(&self, path: &str) -> String {
        derive_cache_key(&self.inner.namespace, self.inner.cache_version, path)
    }

    /// Get an image, falling back to `fallback_path` once if `path` cannot be loaded
    pub async fn get_image(&self, path: &str, fallback_path: Option<&str>) -> Result<ImageResponse> {
        match self.get_or_fetch(path).await {
            Ok(image) => Ok(image),
            Err(e) => match fallback_path {
                Some(fallback) => {
                    debug!(
                        namespace = %self.inner.namespace,
                        path,
                        fallback,
                        error = %e,
                        "Trying fallback image"
                    );
                    self.get_or_fetch(fallback).await
                }
                None => Err(e),
            },
        }
    }

    async fn get_or_fetch(&self, path: &str) -> Result<ImageResponse> {
        let cache_key = self.cache_key(path);

        if let Some(entry) = self.inner.store.lookup(&self.inner.namespace, &cache_key).await {
            if entry.is_stale {
                self.spawn_refresh(path, &cache_key).await;
            }
            return Ok(response_from_entry(entry, cache_key));
        }

        self.inner.fetch_and_store(path, &cache_key).await.map_err(|e| {
            debug!(
                namespace = %self.inner.namespace,
                path,
                error = %e,
                "Something went wrong caching image"
            );
            ProxyError::ImageUnavailable(path.to_string())
        })
    }

    /// Refresh a stale entry without making the caller wait. At most one
    /// refresh per key runs at a time.
    async fn spawn_refresh(&self, path: &str, cache_key: &str) {
        if !self.inner.refreshing.lock().await.insert(cache_key.to_string()) {
            debug!(namespace = %self.inner.namespace, cache_key, "Refresh already in flight");
            return;
        }

        let inner = self.inner.clone();
        let path = path.to_string();
        let cache_key = cache_key.to_string();

        tokio::spawn(async move {
            match inner.fetch_and_store(&path, &cache_key).await {
                Ok(_) => debug!(namespace = %inner.namespace, path = %path, "Revalidated stale image"),
                Err(e) => debug!(
                    namespace = %inner.namespace,
                    path = %path,
                    error = %e,
                    "Failed to revalidate stale image"
                ),
            }
            inner.refreshing.lock().await.remove(&cache_key);
        });
    }

    /// Remove the cached entry for `path`, if any
    pub async fn clear_cached_image(&self, path: &str) {
        let cache_key = self.cache_key(path);
        self.inner
            .store
            .delete_key(&self.inner.namespace, &cache_key)
            .await;
    }

    /// Purge expired entries in this proxy's namespace
    pub async fn clear_expired(&self) -> usize {
        clear_cache(&self.inner.store, &self.inner.namespace).await
    }

    pub async fn stats(&self) -> CacheStats {
        image_stats(&self.inner.store, &self.inner.namespace).await
    }
}

impl ProxyInner {
    async fn fetch_and_store(&self, path: &str, cache_key: &str) -> Result<ImageResponse> {
        let response = self.fetcher.fetch(path).await?;

        let max_age = parse_max_age(response.cache_control.as_deref());
        let expire_at = now_millis() + (max_age as i64) * 1000;
        let etag = normalize_etag(response.etag.as_deref());
        let extension = extension_for_content_type(response.content_type.as_deref());

        let record = CacheRecord::new(max_age, expire_at, &etag, &extension);
        self.store
            .store(&self.namespace, cache_key, &response.body, &record)
            .await?;

        Ok(ImageResponse {
            meta: ImageMeta {
                cur_revalidate: record.max_age,
                revalidate_after: record.expire_at,
                is_stale: false,
                etag: record.etag,
                extension: record.extension,
                cache_key: cache_key.to_string(),
                cache_miss: true,
            },
            image: response.body,
        })
    }
}

fn response_from_entry(entry: CacheEntry, cache_key: String) -> ImageResponse {
    let record = entry.record;
    ImageResponse {
        meta: ImageMeta {
            cur_revalidate: record.max_age,
            revalidate_after: now_millis() + (record.max_age as i64) * 1000,
            is_stale: entry.is_stale,
            etag: record.etag,
            extension: record.extension,
            cache_key,
            cache_miss: false,
        },
        image: entry.payload,
    }
}

/// Purge expired entries from `namespace`, returning how many were removed
pub async fn clear_cache(store: &CacheStore, namespace: &str) -> usize {
    let deleted = store.purge_expired(namespace).await;
    info!(namespace, deleted, "Cleared {} stale image(s) from cache '{}'", deleted, namespace);
    deleted
}

/// Size and entry count of `namespace`
pub async fn image_stats(store: &CacheStore, namespace: &str) -> CacheStats {
    CacheStats {
        size: store.directory_size(namespace).await,
        image_count: store.entry_count(namespace).await,
    }
}
