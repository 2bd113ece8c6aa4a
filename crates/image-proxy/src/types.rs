//! Core types for the image proxy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata returned with every image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Max-age in seconds the entry was stored with
    pub cur_revalidate: u64,
    /// Epoch milliseconds after which a client should revalidate
    pub revalidate_after: i64,
    pub is_stale: bool,
    pub etag: String,
    pub extension: String,
    pub cache_key: String,
    pub cache_miss: bool,
}

/// An image payload and its metadata
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub meta: ImageMeta,
    pub image: Vec<u8>,
}

/// Outbound request budget: at most `max_requests` per `per` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: usize,
    pub per: Duration,
}

/// Options for constructing an [`ImageProxy`](crate::ImageProxy)
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Bumping the version invalidates every existing key in the namespace
    pub cache_version: u32,
    pub rate_limit: Option<RateLimit>,
    /// Headers sent with every origin request
    pub headers: Vec<(String, String)>,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            cache_version: 1,
            rate_limit: None,
            headers: Vec::new(),
        }
    }
}

/// Coarse size information for one cache namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: u64,
    pub image_count: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub namespaces: Vec<String>,
}

/// Result of purging a namespace
#[derive(Debug, Serialize, Deserialize)]
pub struct FlushResponse {
    pub deleted: usize,
}
