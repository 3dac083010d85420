use reqwest::StatusCode;
use thiserror::Error;

/// The underlying cause of a failed WebDAV request: either the server
/// answered with a non-success status, or the request never completed.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("server returned HTTP {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RequestFailure {
    /// The HTTP status when the server answered, `None` for transport
    /// and I/O failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestFailure::Status(status) => Some(*status),
            RequestFailure::Transport(e) => e.status(),
            RequestFailure::Io(_) => None,
        }
    }
}

/// Errors raised by the WebDAV client. Each operation fails with its own
/// kind so callers can match on what went wrong rather than inspect
/// message strings.
#[derive(Debug, Error)]
pub enum WebDavError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("failed to list directory '{path}': {source}")]
    Listing {
        path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to download '{path}': {source}")]
    Download {
        path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to upload '{path}': {source}")]
    Upload {
        path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to create directory '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to delete '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to move '{source_path}' to '{dest_path}': {source}")]
    Move {
        source_path: String,
        dest_path: String,
        #[source]
        source: RequestFailure,
    },

    #[error("failed to parse server response: {0}")]
    Parse(String),
}
