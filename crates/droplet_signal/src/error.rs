//! Signaling error types.

/// Errors that can occur in the droplet_signal crate.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// A transport-level send failed (socket gone or not writable).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection's outbound channel is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// JSON serialization / deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
