//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeSet;

use kursi_core::SeatStatus;

use super::{Invariant, InvariantResult, SystemSnapshot};

/// Seat tables keep their shape and never hold more than capacity.
///
/// Every room has exactly `capacity` seats numbered `1..=capacity`, and the
/// number of locked plus occupied seats never exceeds it.
pub struct CapacityBound;

impl Invariant for CapacityBound {
    fn name(&self) -> &'static str {
        "capacity_bound"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let indices: Vec<_> = room.seats.iter().map(|s| s.index).collect();
            let expected: Vec<_> = (1..=room.capacity).collect();
            if indices != expected {
                return Err(self.violation(format!(
                    "room {}: seat numbers {indices:?} are not 1..={}",
                    room.room, room.capacity
                )));
            }

            let held = room.seats.iter().filter(|s| s.status != SeatStatus::Free).count();
            if held > room.capacity as usize {
                return Err(self.violation(format!(
                    "room {}: {held} seats held, capacity {}",
                    room.room, room.capacity
                )));
            }
        }
        Ok(())
    }
}

/// An occupied seat never carries a lock.
pub struct OccupiedHasNoLock;

impl Invariant for OccupiedHasNoLock {
    fn name(&self) -> &'static str {
        "occupied_has_no_lock"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for seat in &room.seats {
                if seat.occupant.is_some() && seat.lock_holder.is_some() {
                    return Err(self.violation(format!(
                        "room {} seat {}: occupied by {:?} but locked by {:?}",
                        room.room, seat.index, seat.occupant, seat.lock_holder
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The holder index and the seats agree.
///
/// Every index entry points at a seat held by that identifier, and every held
/// seat has exactly one entry. An identifier therefore holds at most one seat
/// per room.
pub struct HolderIndexConsistent;

impl Invariant for HolderIndexConsistent {
    fn name(&self) -> &'static str {
        "holder_index_consistent"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for (holder, index) in &room.holders {
                let seat_holder = room.seat(*index).and_then(|s| s.holder());
                if seat_holder != Some(holder.as_str()) {
                    return Err(self.violation(format!(
                        "room {}: index maps {holder} to seat {index}, seat is held by {seat_holder:?}",
                        room.room
                    )));
                }
            }

            let held: Vec<_> = room
                .seats
                .iter()
                .filter_map(|s| s.holder().map(|h| (h.to_string(), s.index)))
                .collect();
            let indexed: BTreeSet<_> = room.holders.iter().cloned().collect();
            if held.len() != indexed.len() || held.iter().any(|entry| !indexed.contains(entry)) {
                return Err(self.violation(format!(
                    "room {}: held seats {held:?} disagree with index {:?}",
                    room.room, room.holders
                )));
            }
        }
        Ok(())
    }
}

/// A seat a session believes it holds is held by that session's identifier.
pub struct HeldSeatsOwned;

impl Invariant for HeldSeatsOwned {
    fn name(&self) -> &'static str {
        "held_seats_owned"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            if session.seats.is_empty() {
                continue;
            }
            let Some(room_id) = &session.room else {
                return Err(self.violation(format!(
                    "session {}: holds seats {:?} outside any room",
                    session.session_id, session.seats
                )));
            };
            let Some(room) = state.room(room_id) else {
                return Err(self.violation(format!(
                    "session {}: in unknown room {room_id}",
                    session.session_id
                )));
            };
            for index in &session.seats {
                let holder = room.seat(*index).and_then(|s| s.holder());
                if holder.is_none() || holder != session.identifier.as_deref() {
                    return Err(self.violation(format!(
                        "session {} ({:?}): holds {room_id}/{index}, seat is held by {holder:?}",
                        session.session_id, session.identifier
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Room membership lists and session rooms agree.
pub struct RoomMembershipConsistent;

impl Invariant for RoomMembershipConsistent {
    fn name(&self) -> &'static str {
        "room_membership_consistent"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let expected: BTreeSet<u64> = state
                .sessions
                .iter()
                .filter(|s| s.room.as_deref() == Some(room.room.as_str()))
                .map(|s| s.session_id)
                .collect();
            if expected != room.members {
                return Err(self.violation(format!(
                    "room {}: members {:?}, sessions in room {expected:?}",
                    room.room, room.members
                )));
            }
        }
        Ok(())
    }
}

/// Point history never grows past the configured limit.
pub struct PointHistoryBounded;

impl Invariant for PointHistoryBounded {
    fn name(&self) -> &'static str {
        "point_history_bounded"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for seat in &room.seats {
                if seat.points > state.point_history_limit {
                    return Err(self.violation(format!(
                        "room {} seat {}: {} points, limit {}",
                        room.room, seat.index, seat.points, state.point_history_limit
                    )));
                }
            }
        }
        Ok(())
    }
}
