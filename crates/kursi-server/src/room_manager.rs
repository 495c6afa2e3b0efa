//! Room Manager
//!
//! Owns one [`SeatTable`] per configured room. The set of rooms is closed: it
//! is fixed at construction and never grows, so a reference to any other room
//! is rejected with [`RoomError::UnknownRoom`] before anything is touched.
//!
//! Every mutation runs inside a single driver step, so claims need no
//! compare-and-set: two sessions can never observe the same free seat.

use std::{collections::BTreeMap, ops::Sub, time::Duration};

use kursi_core::{ClaimOutcome, SeatError, SeatTable};
use kursi_proto::{Point, SeatIndex, SeatMetadata};

/// Errors from `RoomManager` operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Room is not in the configured set
    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// No free or expired seat left
    #[error("room full: {0}")]
    RoomFull(String),

    /// Seat table rejected the operation
    #[error("{0}")]
    Seat(#[from] SeatError),

    /// Caller does not hold the seat it is acting on
    #[error("seat {seat} in {room} is not held by this session")]
    NotSeatHolder {
        /// Room of the seat
        room: String,
        /// Seat acted on
        seat: SeatIndex,
    },
}

/// A seat released by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredSeat {
    /// Room of the seat
    pub room: String,
    /// Released seat
    pub seat: SeatIndex,
    /// Identifier whose lock expired
    pub holder: String,
}

/// Room/seat store over the configured rooms.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct RoomManager<I> {
    rooms: BTreeMap<String, SeatTable<I>>,
}

impl<I> RoomManager<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Create a manager with one empty seat table per room.
    pub fn new<S: AsRef<str>>(
        rooms: &[S],
        seats_per_room: SeatIndex,
        lock_expiry: Duration,
        point_history_limit: usize,
    ) -> Self {
        let rooms = rooms
            .iter()
            .map(|room| {
                let table = SeatTable::new(seats_per_room, lock_expiry, point_history_limit);
                (room.as_ref().to_string(), table)
            })
            .collect();
        Self { rooms }
    }

    /// Room is part of the configured set.
    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Configured room identifiers in ascending order.
    pub fn room_ids(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    /// Seat table of a room.
    pub fn table(&self, room: &str) -> Result<&SeatTable<I>, RoomError> {
        self.rooms.get(room).ok_or_else(|| RoomError::UnknownRoom(room.to_string()))
    }

    fn table_mut(&mut self, room: &str) -> Result<&mut SeatTable<I>, RoomError> {
        self.rooms.get_mut(room).ok_or_else(|| RoomError::UnknownRoom(room.to_string()))
    }

    /// All rooms with their seat tables.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &SeatTable<I>)> {
        self.rooms.iter().map(|(room, table)| (room.as_str(), table))
    }

    /// Claim a seat in `room` for `holder`.
    ///
    /// # Errors
    ///
    /// - `UnknownRoom` if the room is not configured
    /// - `RoomFull` if no seat is free; nothing is mutated
    pub fn claim(&mut self, room: &str, holder: &str, now: I) -> Result<ClaimOutcome, RoomError> {
        self.table_mut(room)?
            .claim(holder, now)
            .ok_or_else(|| RoomError::RoomFull(room.to_string()))
    }

    /// Publish occupant metadata on a claimed seat.
    ///
    /// Returns `true` if the seat became occupied by this call.
    pub fn confirm(
        &mut self,
        room: &str,
        seat: SeatIndex,
        holder: &str,
        metadata: SeatMetadata,
        now: I,
    ) -> Result<bool, RoomError> {
        Ok(self.table_mut(room)?.confirm(seat, holder, metadata, now)?)
    }

    /// Free a seat unconditionally. Returns the identifier that held it.
    pub fn release(&mut self, room: &str, seat: SeatIndex) -> Result<Option<String>, RoomError> {
        Ok(self.table_mut(room)?.release(seat)?)
    }

    /// Append a point to a seat's history.
    pub fn record_point(
        &mut self,
        room: &str,
        seat: SeatIndex,
        point: Point,
    ) -> Result<(), RoomError> {
        Ok(self.table_mut(room)?.record_point(seat, point)?)
    }

    /// Release every lock past the expiry window, in room then seat order.
    pub fn sweep_expired_locks(&mut self, now: I) -> Vec<ExpiredSeat> {
        let mut expired = Vec::new();
        for (room, table) in &mut self.rooms {
            for (seat, holder) in table.sweep_expired(now) {
                expired.push(ExpiredSeat { room: room.clone(), seat, holder });
            }
        }
        expired
    }

    /// Free every seat of a room. Returns the released `(seat, holder)` pairs.
    pub fn reset_room(&mut self, room: &str) -> Result<Vec<(SeatIndex, String)>, RoomError> {
        Ok(self.table_mut(room)?.reset())
    }

    /// Occupied seat numbers of a room, ascending.
    pub fn occupied_seats(&self, room: &str) -> Result<Vec<SeatIndex>, RoomError> {
        Ok(self.table(room)?.occupied().map(|(seat, _)| seat).collect())
    }

    /// Occupied seats of a room with their metadata, ascending.
    pub fn seat_snapshot(&self, room: &str) -> Result<Vec<(SeatIndex, SeatMetadata)>, RoomError> {
        Ok(self.table(room)?.occupied().map(|(seat, meta)| (seat, meta.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: Duration = Duration::from_secs(10);

    fn manager() -> RoomManager<Duration> {
        RoomManager::new(&["room1", "room2"], 2, EXPIRY, 16)
    }

    fn meta(name: &str) -> SeatMetadata {
        SeatMetadata { display_name: name.to_string(), ..SeatMetadata::empty() }
    }

    #[test]
    fn rooms_are_closed_set() {
        let mut rooms = manager();
        assert!(rooms.has_room("room1"));
        assert!(!rooms.has_room("lobby"));
        assert_eq!(rooms.room_ids().collect::<Vec<_>>(), vec!["room1", "room2"]);

        let result = rooms.claim("lobby", "alice", Duration::ZERO);
        assert_eq!(result, Err(RoomError::UnknownRoom("lobby".to_string())));
        assert_eq!(rooms.room_ids().count(), 2);
    }

    #[test]
    fn full_room_reports_room_full() {
        let mut rooms = manager();
        rooms.claim("room1", "a", Duration::ZERO).unwrap();
        rooms.claim("room1", "b", Duration::ZERO).unwrap();

        let result = rooms.claim("room1", "c", Duration::ZERO);
        assert_eq!(result, Err(RoomError::RoomFull("room1".to_string())));

        // Other rooms are unaffected
        assert!(rooms.claim("room2", "c", Duration::ZERO).is_ok());
    }

    #[test]
    fn confirm_and_snapshot() {
        let mut rooms = manager();
        rooms.claim("room1", "a", Duration::ZERO).unwrap();
        rooms.claim("room1", "b", Duration::ZERO).unwrap();

        assert_eq!(rooms.confirm("room1", 2, "b", meta("bob"), Duration::ZERO), Ok(true));
        assert_eq!(rooms.occupied_seats("room1"), Ok(vec![2]));
        assert_eq!(rooms.seat_snapshot("room1").unwrap(), vec![(2, meta("bob"))]);
    }

    #[test]
    fn seat_errors_are_wrapped() {
        let mut rooms = manager();
        rooms.claim("room1", "a", Duration::ZERO).unwrap();

        let result = rooms.confirm("room1", 1, "b", meta("bob"), Duration::ZERO);
        assert_eq!(result, Err(RoomError::Seat(SeatError::NotLockHolder { index: 1 })));

        let result = rooms.release("room1", 9);
        assert_eq!(
            result,
            Err(RoomError::Seat(SeatError::SeatOutOfRange { index: 9, capacity: 2 }))
        );
    }

    #[test]
    fn sweep_reports_room_and_holder() {
        let mut rooms = manager();
        rooms.claim("room1", "a", Duration::ZERO).unwrap();
        rooms.claim("room2", "b", Duration::from_secs(5)).unwrap();

        let expired = rooms.sweep_expired_locks(Duration::from_secs(11));
        assert_eq!(expired, vec![ExpiredSeat {
            room: "room1".to_string(),
            seat: 1,
            holder: "a".to_string(),
        }]);

        let expired = rooms.sweep_expired_locks(Duration::from_secs(16));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].room, "room2");
    }

    #[test]
    fn reset_room_frees_all() {
        let mut rooms = manager();
        rooms.claim("room1", "a", Duration::ZERO).unwrap();
        rooms.confirm("room1", 1, "a", meta("alice"), Duration::ZERO).unwrap();

        let released = rooms.reset_room("room1").unwrap();
        assert_eq!(released, vec![(1, "a".to_string())]);
        assert!(rooms.occupied_seats("room1").unwrap().is_empty());
    }
}
