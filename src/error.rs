use aws_sdk_dynamodb::error;
use std::{io, path};

/// Errors raised by export, import and count operations.
///
/// Export is fail-fast: any of these aborts the scan and no file is written.
/// Import is best-effort: store errors raised while writing a chunk are
/// recorded in [`crate::transfer::ImportResult`] instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store could not be reached (network, timeout or credential failure).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected the request because of throughput limits.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Any other error returned by the store.
    #[error("store request failed: {0}")]
    Store(String),

    /// The import document matches none of the accepted shapes.
    #[error("unrecognized document format: {0}")]
    Format(String),

    /// A caller supplied an argument the engine cannot honor.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record could not be converted to or from DynamoDB attribute values.
    #[error("attribute conversion failed: {0}")]
    Serialization(#[from] serde_dynamo::Error),

    /// An export document could not be encoded.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An SDK request could not be assembled.
    #[error("failed to build request: {0}")]
    Build(#[from] error::BuildError),

    /// Reading or writing a document failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// The file being read or written.
        path: path::PathBuf,
        /// The underlying cause.
        source: io::Error,
    },

    /// The transfer was used after its store client was released.
    #[error("transfer has been closed")]
    Closed,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error was caused by throughput limits.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }

    pub(crate) fn io(path: impl Into<path::PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
