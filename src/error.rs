//! Error types for the proxy-keeper crate.

use thiserror::Error;

/// Error returned when no fresh proxy is available in the store.
#[derive(Debug, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;

/// Errors surfaced by the store, the provider client and startup code.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedded database failed.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A request to the provider could not be completed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider endpoint is not a valid URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The provider answered with a non-success status.
    #[error("provider responded with status {status}")]
    Provider { status: http::StatusCode },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The log sink could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
