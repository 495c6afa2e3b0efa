//! Observable state extracted from the driver.

use std::collections::BTreeSet;

use kursi_core::{SeatStatus, env::Environment};
use kursi_proto::SeatIndex;
use kursi_server::ServerDriver;

use crate::sim_env::SimEnv;

/// One seat as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSnapshot {
    /// Seat number
    pub index: SeatIndex,
    /// Derived status at snapshot time
    pub status: SeatStatus,
    /// Confirmed occupant
    pub occupant: Option<String>,
    /// Lock holder, including locks past expiry awaiting the sweep
    pub lock_holder: Option<String>,
    /// Length of the point history
    pub points: usize,
}

impl SeatSnapshot {
    /// Identifier holding the seat by occupancy or lock.
    pub fn holder(&self) -> Option<&str> {
        self.occupant.as_deref().or(self.lock_holder.as_deref())
    }
}

/// One room's seat table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room identifier
    pub room: String,
    /// Configured capacity
    pub capacity: SeatIndex,
    /// Seats in index order
    pub seats: Vec<SeatSnapshot>,
    /// Holder index entries, sorted
    pub holders: Vec<(String, SeatIndex)>,
    /// Sessions the registry lists as members
    pub members: BTreeSet<u64>,
}

impl RoomSnapshot {
    /// Seat by number.
    pub fn seat(&self, index: SeatIndex) -> Option<&SeatSnapshot> {
        self.seats.iter().find(|s| s.index == index)
    }
}

/// One connected session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session ID
    pub session_id: u64,
    /// Identifier, once set
    pub identifier: Option<String>,
    /// Current room
    pub room: Option<String>,
    /// Seats held in `room`
    pub seats: BTreeSet<SeatIndex>,
}

/// Complete observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSnapshot {
    /// Rooms in identifier order
    pub rooms: Vec<RoomSnapshot>,
    /// Sessions in ID order
    pub sessions: Vec<SessionSnapshot>,
    /// Configured point history limit
    pub point_history_limit: usize,
}

impl SystemSnapshot {
    /// Capture the driver's state.
    pub fn from_driver(driver: &ServerDriver<SimEnv>) -> Self {
        let now = driver.env().now();

        let rooms = driver
            .rooms()
            .tables()
            .map(|(room, table)| {
                let seats = table
                    .seats()
                    .map(|seat| SeatSnapshot {
                        index: seat.index(),
                        status: table.status(seat.index(), now).unwrap_or(SeatStatus::Free),
                        occupant: seat.occupant().map(str::to_string),
                        lock_holder: seat.lock().map(|lock| lock.holder.clone()),
                        points: seat.points().len(),
                    })
                    .collect();
                let mut holders: Vec<_> =
                    table.holders().map(|(holder, seat)| (holder.to_string(), seat)).collect();
                holders.sort();

                RoomSnapshot {
                    room: room.to_string(),
                    capacity: table.capacity(),
                    seats,
                    holders,
                    members: driver.sessions_in_room(room).collect(),
                }
            })
            .collect();

        let mut sessions: Vec<_> = driver
            .registry()
            .iter()
            .map(|(session_id, info)| SessionSnapshot {
                session_id,
                identifier: info.identifier.clone(),
                room: info.room.clone(),
                seats: info.seats.clone(),
            })
            .collect();
        sessions.sort_by_key(|s| s.session_id);

        Self { rooms, sessions, point_history_limit: driver.config().point_history_limit }
    }

    /// Room by identifier.
    pub fn room(&self, room: &str) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|r| r.room == room)
    }
}
