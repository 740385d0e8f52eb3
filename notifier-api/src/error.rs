use reqwest::{StatusCode, Url};
use thiserror::Error;
use url::ParseError;

/// Result alias for real-time delivery operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured delivery endpoint is malformed.
    #[error("invalid real-time endpoint '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: ParseError,
    },

    /// The request never completed (connection refused, reset, TLS failure...).
    #[error("real-time request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success HTTP status.
    #[error("real-time endpoint returned {status} for {url}: {message}")]
    Http {
        status: StatusCode,
        url: Url,
        message: String,
    },
}
