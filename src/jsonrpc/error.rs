use std::time::Duration;

/// Result type for client operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Transport-level failures.
///
/// These abort the current run. Protocol-level failures (error envelopes,
/// bad statuses) are not errors here: they arrive as replies and are tallied
/// by the scenario.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("\"{0}\" does not exist or is not executable")]
    BinaryNotFound(String),

    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed reply {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Server closed its output before the reply was complete")]
    Closed,
}

impl RpcError {
    /// Whether this is the per-line deadline expiring
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout(_))
    }
}
