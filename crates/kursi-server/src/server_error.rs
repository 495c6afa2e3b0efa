//! Driver error types.
//!
//! Provides strongly-typed errors for event processing:
//! - Session lookup
//! - Identifier preconditions
//! - Room and seat operations
//! - Inbound frame decoding

use std::fmt;

use kursi_proto::{ProtocolError, ServerMessage};

use crate::room_manager::RoomError;

/// Errors that can occur while the driver processes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in registry.
    ///
    /// The runtime delivered an event for a session that was never accepted
    /// or has already closed. Returned from `process_event`; the runtime logs
    /// it and moves on.
    SessionNotFound(u64),

    /// Operation needs an identifier and the session has not set one.
    ///
    /// Local to the offending request. The client should send `setIdTarget`
    /// first.
    IdentifierNotSet,

    /// Room or seat operation failed.
    ///
    /// Wraps errors from `RoomManager`. See `RoomError` for details. Always
    /// local to the offending request.
    Room(RoomError),

    /// Inbound frame could not be decoded.
    ///
    /// Local to the offending frame. The session stays open.
    Protocol(ProtocolError),
}

impl DriverError {
    /// Reply sent to the session whose request failed.
    ///
    /// A full room gets its own reply shape; everything else becomes a
    /// generic error message.
    pub fn reply(&self) -> ServerMessage {
        match self {
            Self::Room(RoomError::RoomFull(room)) => ServerMessage::RoomFull { room: room.clone() },
            Self::Room(err) => ServerMessage::error(err.to_string()),
            Self::Protocol(err) => ServerMessage::error(err.to_string()),
            other => ServerMessage::error(other.to_string()),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::IdentifierNotSet => write!(f, "identifier not set"),
            Self::Room(err) => write!(f, "room error: {err}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Room(err) => Some(err),
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RoomError> for DriverError {
    fn from(err: RoomError) -> Self {
        Self::Room(err)
    }
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

#[cfg(test)]
mod tests {
    use kursi_core::SeatError;

    use super::*;

    #[test]
    fn driver_error_display() {
        let err = DriverError::SessionNotFound(42);
        assert_eq!(err.to_string(), "session not found: 42");

        let err = DriverError::IdentifierNotSet;
        assert_eq!(err.to_string(), "identifier not set");

        let err = DriverError::Room(RoomError::UnknownRoom("lobby".to_string()));
        assert_eq!(err.to_string(), "room error: unknown room: lobby");
    }

    #[test]
    fn room_full_gets_distinct_reply() {
        let err = DriverError::from(RoomError::RoomFull("room1".to_string()));
        assert_eq!(err.reply(), ServerMessage::RoomFull { room: "room1".to_string() });
    }

    #[test]
    fn other_errors_reply_with_message() {
        let err = DriverError::from(RoomError::UnknownRoom("lobby".to_string()));
        assert_eq!(err.reply(), ServerMessage::error("unknown room: lobby"));

        let err = DriverError::from(RoomError::Seat(SeatError::NotLockHolder { index: 3 }));
        assert_eq!(err.reply(), ServerMessage::error("seat 3 is held by another user"));

        let err = DriverError::from(ProtocolError::UnknownEvent("dance".to_string()));
        assert_eq!(err.reply(), ServerMessage::error("unknown event type: dance"));

        assert_eq!(DriverError::IdentifierNotSet.reply(), ServerMessage::error("identifier not set"));
    }
}
