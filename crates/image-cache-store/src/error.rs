//! Error types for the image cache store

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    Io(Box<std::io::Error>),
    /// A stored file name that does not decode into a cache record
    InvalidRecord(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "IO error: {}", err),
            StoreError::InvalidRecord(name) => write!(f, "Invalid cache record: {}", name),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            StoreError::InvalidRecord(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
