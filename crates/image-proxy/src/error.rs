//! Error types for the image proxy

use std::fmt;

/// Failure to retrieve a resource from its origin
#[derive(Debug)]
pub enum FetchError {
    Http(Box<reqwest::Error>),
    /// Origin answered with a non-success status
    Status(u16),
    InvalidUrl(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "HTTP error: {}", err),
            FetchError::Status(status) => write!(f, "Origin returned status {}", status),
            FetchError::InvalidUrl(url) => write!(f, "Invalid origin URL: {}", url),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Box::new(err))
    }
}

#[derive(Debug)]
pub enum ProxyError {
    Store(image_cache_store::StoreError),
    Fetch(FetchError),
    /// Neither the path nor its fallback could be loaded
    ImageUnavailable(String),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Store(err) => write!(f, "Cache error: {}", err),
            ProxyError::Fetch(err) => write!(f, "Fetch error: {}", err),
            ProxyError::ImageUnavailable(path) => write!(f, "Failed to load image: {}", path),
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Store(err) => Some(err),
            ProxyError::Fetch(err) => Some(err),
            ProxyError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<image_cache_store::StoreError> for ProxyError {
    fn from(err: image_cache_store::StoreError) -> Self {
        ProxyError::Store(err)
    }
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        ProxyError::Fetch(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_unavailable_display() {
        let err = ProxyError::ImageUnavailable("/t/p/w500/poster.jpg".to_string());
        assert_eq!(
            format!("{}", err),
            "Failed to load image: /t/p/w500/poster.jpg"
        );
    }

    #[test]
    fn test_fetch_status_display() {
        let err = ProxyError::from(FetchError::Status(404));
        assert_eq!(format!("{}", err), "Fetch error: Origin returned status 404");
    }

    #[test]
    fn test_config_error_display() {
        let err = ProxyError::Config("missing IMAGE_PROXY_ORIGINS".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: missing IMAGE_PROXY_ORIGINS"
        );
    }

    #[test]
    fn test_error_is_debug() {
        let err = ProxyError::ImageUnavailable("x".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("ImageUnavailable"));
    }
}
