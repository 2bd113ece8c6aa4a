//! Resolution of data directories with a temp-dir fallback

use crate::error::{ProxyError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Access a resolved directory must allow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectoryOptions {
    pub ensure_exists: bool,
    pub access: Access,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            ensure_exists: true,
            access: Access::ReadWrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirectory {
    pub directory: PathBuf,
    pub used_fallback: bool,
}

/// Candidate locations for a namespace: `<config>/<namespace>` when a config
/// directory is set, then `./config/<namespace>`.
pub fn candidate_directories(config_directory: Option<&Path>, namespace: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(config) = config_directory {
        candidates.push(config.join(namespace));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("config").join(namespace));
    }
    candidates
}

/// Directory used when no candidate is usable
pub fn fallback_directory(namespace: &str) -> PathBuf {
    std::env::temp_dir().join("image-proxy").join(namespace)
}

/// Pick the first usable candidate, or fall back to the temp directory
pub fn resolve_directory(
    candidates: &[PathBuf],
    namespace: &str,
    options: DirectoryOptions,
) -> Result<ResolvedDirectory> {
    for candidate in candidates {
        match check_directory(candidate, options) {
            Ok(()) => {
                return Ok(ResolvedDirectory {
                    directory: candidate.clone(),
                    used_fallback: false,
                })
            }
            Err(e) => debug!(path = ?candidate, error = %e, "Directory not usable"),
        }
    }

    let fallback = fallback_directory(namespace);
    check_directory(&fallback, options).map_err(|e| {
        ProxyError::Config(format!(
            "Fallback directory {} is not usable: {}",
            fallback.display(),
            e
        ))
    })?;

    warn!(
        namespace,
        fallback = ?fallback,
        "No configured directory is usable; falling back to temp directory"
    );

    Ok(ResolvedDirectory {
        directory: fallback,
        used_fallback: true,
    })
}

fn check_directory(directory: &Path, options: DirectoryOptions) -> std::io::Result<()> {
    if options.ensure_exists {
        fs::create_dir_all(directory)?;
    }

    match options.access {
        Access::Read => {
            fs::read_dir(directory)?;
        }
        Access::ReadWrite => {
            let probe = directory.join(format!(".write-probe-{}", std::process::id()));
            fs::write(&probe, b"")?;
            fs::remove_file(&probe)?;
        }
    }

    Ok(())
}
