//! Image Proxy - disk-cached proxy for remote images

use image_cache_store::CacheStore;
use image_proxy::directory::{candidate_directories, resolve_directory, DirectoryOptions};
use image_proxy::{
    start_server, Config, ImageProxy, ProxyError, ProxyOptions, Result, ServerState, SharedState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("image_proxy=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Image Proxy...");

    let config = Config::from_env();
    info!("Port: {}", config.port);

    let candidates = candidate_directories(config.config_directory.as_deref(), "cache/images");
    let cache_root = resolve_directory(&candidates, "cache/images", DirectoryOptions::default())?;
    if cache_root.used_fallback {
        warn!("Cache dir is not writable; using {:?}", cache_root.directory);
    }
    info!("Cache dir: {:?}", cache_root.directory);

    let store = CacheStore::new(cache_root.directory);

    let mut proxies = Vec::new();
    for (namespace, base_url) in &config.origins {
        let options = ProxyOptions {
            cache_version: config.cache_version,
            rate_limit: config.rate_limit,
            headers: Vec::new(),
        };
        proxies.push(ImageProxy::new(namespace, base_url, store.clone(), options)?);
        info!("Proxying '{}' -> {}", namespace, base_url);
    }

    let state: SharedState = Arc::new(ServerState::new(store, proxies));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ProxyError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
