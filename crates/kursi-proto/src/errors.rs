//! Protocol error types.

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding wire messages.
///
/// All decode errors are local to the offending frame: the server replies
/// with an error message and keeps the session open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Frame is valid JSON but neither a non-empty array nor a tagged object.
    #[error("invalid message format")]
    InvalidFormat,

    /// Event tag is not part of the protocol.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    /// A required argument is absent.
    #[error("{event}: missing argument `{name}`")]
    MissingArgument {
        /// Event tag being decoded
        event: String,
        /// Argument name
        name: &'static str,
    },

    /// An argument has the wrong JSON type or is out of range.
    #[error("{event}: argument `{name}` must be {expected}")]
    InvalidArgument {
        /// Event tag being decoded
        event: String,
        /// Argument name
        name: &'static str,
        /// Human-readable description of the accepted values
        expected: &'static str,
    },

    /// Outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
