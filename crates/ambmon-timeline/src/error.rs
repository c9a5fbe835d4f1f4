/// Errors raised while fetching a timeline response from the upstream.
///
/// # Examples
///
/// ```rust
/// use ambmon_timeline::error::FetchError;
///
/// let err = FetchError::Client("bad timeout".to_string());
/// assert!(err.to_string().contains("bad timeout"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport failure: connection refused, DNS failure, timeout, or the
    /// body could not be read.
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Errors raised while decoding a timeline response body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Body is not JSON or lacks the `metrics` array shape.
    #[error("Malformed timeline payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A key of a nested `metrics` object is not an epoch-millisecond integer.
    #[error("Invalid timestamp {key:?} for metric {metric} on host {hostname}")]
    InvalidTimestamp {
        hostname: String,
        metric: String,
        key: String,
    },

    /// A value of a nested `metrics` object is not numeric.
    #[error("Non-numeric value at {timestamp} for metric {metric} on host {hostname}")]
    NonNumericValue {
        hostname: String,
        metric: String,
        timestamp: i64,
    },
}

/// Convenience type alias so callers can write `error::Result<T, E>`.
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
