//! Errors surfaced by the cached reader.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying source failed. The error is passed through untouched.
    #[error(transparent)]
    Source(#[from] io::Error),

    /// The requested range does not fit in the addressable offset space.
    #[error("invalid read request: {len} bytes at offset {offset} overflows the addressable range")]
    InvalidRequest { offset: u64, len: usize },

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// A blocking read task panicked or was cancelled.
    #[error("read task failed: {0}")]
    Task(String),
}

impl From<CacheError> for io::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Source(e) => e,
            CacheError::InvalidRequest { .. } | CacheError::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other => io::Error::other(other),
        }
    }
}
