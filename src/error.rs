use thiserror::Error;

/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the boundary of the digest (construction, decoding and
/// parameter validation).
///
/// Internal consistency (sum of counts, ordering, capacity) is never reported
/// through this type; it is checked with debug assertions instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Compression outside of `[MIN_COMPRESSION, MAX_COMPRESSION]`.
    #[error("invalid compression value {0}, should be in [10, 10000]")]
    InvalidCompression(i64),

    /// Requested percentile outside of `[0.0, 1.0]`.
    #[error("invalid percentile value {0}, should be in [0.0, 1.0]")]
    InvalidPercentile(f64),

    /// Non-positive count for a weighted insert or a decoded centroid.
    #[error("count value must be positive, got {0}")]
    InvalidCount(i64),

    /// Encoded digest carries format flags we do not understand.
    #[error("unsupported t-digest on-disk format (flags {0})")]
    UnsupportedFormat(i32),

    /// Truncated, inconsistent or unparsable encoding.
    #[error("malformed t-digest encoding: {0}")]
    Malformed(String),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed(msg.into())
    }
}
