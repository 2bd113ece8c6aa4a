//! Interpretation of origin response headers

/// Max-age applied when the origin sends none (24 hours)
pub const DEFAULT_MAX_AGE_SECS: u64 = 86400;

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/avif", "avif"),
    ("image/svg+xml", "svg"),
    ("image/bmp", "bmp"),
    ("image/x-icon", "ico"),
    ("image/vnd.microsoft.icon", "ico"),
    ("image/tiff", "tiff"),
    ("image/heic", "heic"),
    ("application/json", "json"),
    ("application/octet-stream", "bin"),
];

/// Seconds from the `max-age` directive of a Cache-Control header.
/// Missing, malformed or zero values fall back to [`DEFAULT_MAX_AGE_SECS`].
pub fn parse_max_age(cache_control: Option<&str>) -> u64 {
    cache_control
        .into_iter()
        .flat_map(|value| value.split(','))
        .filter_map(|directive| {
            let (name, value) = directive.trim().split_once('=')?;
            if name.trim().eq_ignore_ascii_case("max-age") {
                value.trim().trim_matches('"').parse::<u64>().ok()
            } else {
                None
            }
        })
        .next()
        .filter(|max_age| *max_age > 0)
        .unwrap_or(DEFAULT_MAX_AGE_SECS)
}

/// Etag with quote characters removed; empty when absent
pub fn normalize_etag(etag: Option<&str>) -> String {
    etag.map(|e| e.replace('"', "")).unwrap_or_default()
}

/// File extension for a content type; empty when unknown
pub fn extension_for_content_type(content_type: Option<&str>) -> String {
    let Some(content_type) = content_type else {
        return String::new();
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// Content type to serve a cached payload with, from its stored extension
pub fn content_type_for_extension(extension: &str) -> &'static str {
    MIME_EXTENSIONS
        .iter()
        .find(|(_, ext)| ext.eq_ignore_ascii_case(extension))
        .map(|(mime, _)| *mime)
        .unwrap_or("application/octet-stream")
}
