use crate::types::RateLimit;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub config_directory: Option<PathBuf>,
    /// `(namespace, base_url)` for every proxied origin
    pub origins: Vec<(String, String)>,
    pub cache_version: u32,
    pub rate_limit: Option<RateLimit>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            config_directory: None,
            origins: parse_origins("tmdb=https://image.tmdb.org"),
            cache_version: 1,
            rate_limit: None,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let config_directory = env::var("CONFIG_DIRECTORY").ok().map(PathBuf::from);

        let origins = env::var("IMAGE_PROXY_ORIGINS")
            .map(|s| parse_origins(&s))
            .unwrap_or(defaults.origins);

        let cache_version = env::var("IMAGE_CACHE_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.cache_version);

        let rate_limit = env::var("IMAGE_PROXY_RATE_LIMIT")
            .ok()
            .and_then(|s| parse_rate_limit(&s));

        Self {
            port,
            config_directory,
            origins,
            cache_version,
            rate_limit,
        }
    }
}

/// Parse `name=https://base,name2=https://base2`. Malformed pairs are dropped.
pub fn parse_origins(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() || name.contains('/') {
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}

/// Parse `<requests>/<millis>`, e.g. `20/1000`
pub fn parse_rate_limit(value: &str) -> Option<RateLimit> {
    let (requests, millis) = value.split_once('/')?;
    let max_requests = requests.trim().parse::<usize>().ok().filter(|n| *n > 0)?;
    let millis = millis.trim().parse::<u64>().ok()?;
    Some(RateLimit {
        max_requests,
        per: Duration::from_millis(millis),
    })
}
