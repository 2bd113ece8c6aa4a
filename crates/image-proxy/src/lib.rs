//! Image Proxy Library
//!
//! Disk-cached, stale-while-revalidate proxy for images served by third-party
//! media servers, plus the cache administration surface.

pub mod cache_key;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetcher;
pub mod headers;
pub mod proxy;
pub mod server;
pub mod types;

pub use cache_key::derive_cache_key;
pub use config::Config;
pub use error::{FetchError, ProxyError, Result};
pub use fetcher::{HttpFetcher, OriginFetch, OriginResponse};
pub use proxy::{clear_cache, image_stats, ImageProxy};
pub use server::{create_router, start_server, ServerState, SharedState};
pub use types::*;
