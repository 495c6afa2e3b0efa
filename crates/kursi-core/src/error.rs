//! Error types for seat table operations.

use kursi_proto::SeatIndex;
use thiserror::Error;

/// Errors from a single seat table.
///
/// None of these mutate the table: a failed operation leaves every seat as
/// it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeatError {
    /// Seat index outside `1..=capacity`
    #[error("seat {index} out of range (capacity {capacity})")]
    SeatOutOfRange {
        /// Requested seat
        index: SeatIndex,
        /// Seats in the room
        capacity: SeatIndex,
    },

    /// Seat is locked or occupied by another identifier
    #[error("seat {index} is held by another user")]
    NotLockHolder {
        /// Requested seat
        index: SeatIndex,
    },

    /// Caller's lock on the seat ran past the expiry window
    #[error("lock on seat {index} expired")]
    LockExpired {
        /// Requested seat
        index: SeatIndex,
    },

    /// Seat was never claimed
    #[error("seat {index} is not claimed")]
    NotClaimed {
        /// Requested seat
        index: SeatIndex,
    },

    /// Occupant metadata without a display name
    #[error("display name must not be empty")]
    EmptyDisplayName,
}
