//! HTTP server for image and cache administration endpoints
//!
//! Provides /health, /imageproxy/{namespace}/{*path} and the
//! /cache/{namespace}/... administration routes.

use crate::headers::content_type_for_extension;
use crate::proxy::{clear_cache, image_stats, ImageProxy};
use crate::types::{FlushResponse, HealthResponse, ImageResponse};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use image_cache_store::CacheStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub store: CacheStore,
    pub proxies: HashMap<String, ImageProxy>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(store: CacheStore, proxies: Vec<ImageProxy>) -> Self {
        Self {
            store,
            proxies: proxies
                .into_iter()
                .map(|proxy| (proxy.namespace().to_string(), proxy))
                .collect(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    fallback: Option<String>,
}

#[derive(Deserialize)]
pub struct EntryQuery {
    path: String,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/imageproxy/{namespace}/{*path}", get(get_image))
        .route("/cache/{namespace}/stats", get(get_stats))
        .route("/cache/{namespace}/flush", post(flush_cache))
        .route("/cache/{namespace}/entry", delete(clear_entry))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Logical path for a request value: always a single leading `/`, so every
/// route derives the same cache key for the same image.
fn logical_path(raw: &str) -> String {
    format!("/{}", raw.trim_start_matches('/'))
}

fn unknown_namespace() -> Response {
    error_response(StatusCode::NOT_FOUND, "Unknown cache namespace")
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    let mut namespaces: Vec<String> = state.proxies.keys().cloned().collect();
    namespaces.sort();

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        namespaces,
    })
}

/// Serve an image through the namespace's proxy
async fn get_image(
    State(state): State<SharedState>,
    Path((namespace, path)): Path<(String, String)>,
    Query(query): Query<ImageQuery>,
) -> Response {
    let Some(proxy) = state.proxies.get(&namespace) else {
        return unknown_namespace();
    };

    let path = logical_path(&path);
    let fallback = query.fallback.as_deref().map(logical_path);
    match proxy.get_image(&path, fallback.as_deref()).await {
        Ok(image) => image_response(image),
        Err(e) => {
            warn!(namespace = %namespace, path = %path, error = %e, "Failed to load image");
            error_response(StatusCode::NOT_FOUND, "Image not found")
        }
    }
}

fn image_response(image: ImageResponse) -> Response {
    let cache_status = if image.meta.cache_miss {
        "MISS"
    } else if image.meta.is_stale {
        "STALE"
    } else {
        "HIT"
    };

    let mut response = (
        [
            (
                header::CONTENT_TYPE,
                content_type_for_extension(&image.meta.extension).to_string(),
            ),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", image.meta.cur_revalidate),
            ),
            (HeaderName::from_static("x-cache"), cache_status.to_string()),
        ],
        image.image,
    )
        .into_response();

    if !image.meta.etag.is_empty() {
        if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", image.meta.etag)) {
            response.headers_mut().insert(header::ETAG, etag);
        }
    }

    response
}

/// Size and entry count of a namespace
async fn get_stats(State(state): State<SharedState>, Path(namespace): Path<String>) -> Response {
    if !state.proxies.contains_key(&namespace) {
        return unknown_namespace();
    }

    Json(image_stats(&state.store, &namespace).await).into_response()
}

/// Purge expired entries from a namespace
async fn flush_cache(State(state): State<SharedState>, Path(namespace): Path<String>) -> Response {
    if !state.proxies.contains_key(&namespace) {
        return unknown_namespace();
    }

    let deleted = clear_cache(&state.store, &namespace).await;
    Json(FlushResponse { deleted }).into_response()
}

/// Remove the cached entry for one logical path
async fn clear_entry(
    State(state): State<SharedState>,
    Path(namespace): Path<String>,
    Query(query): Query<EntryQuery>,
) -> Response {
    let Some(proxy) = state.proxies.get(&namespace) else {
        return unknown_namespace();
    };

    proxy.clear_cached_image(&logical_path(&query.path)).await;
    StatusCode::NO_CONTENT.into_response()
}
