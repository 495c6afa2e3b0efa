//! Room occupancy queries.
//!
//! Occupancy is recomputed from the seat tables on every call instead of
//! being tracked as a running counter, so no mutation path can leave it
//! stale. Only occupied seats count; locked and free seats do not.

use std::{collections::BTreeMap, ops::Sub, time::Duration};

use crate::room_manager::{RoomError, RoomManager};

impl<I> RoomManager<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Number of occupied seats in a room.
    pub fn room_occupancy(&self, room: &str) -> Result<usize, RoomError> {
        Ok(self.table(room)?.occupied_count())
    }

    /// Occupied seat count of every configured room.
    pub fn all_room_occupancy(&self) -> BTreeMap<String, usize> {
        self.tables().map(|(room, table)| (room.to_string(), table.occupied_count())).collect()
    }
}

#[cfg(test)]
mod tests {
    use kursi_proto::SeatMetadata;

    use super::*;

    fn meta(name: &str) -> SeatMetadata {
        SeatMetadata { display_name: name.to_string(), ..SeatMetadata::empty() }
    }

    #[test]
    fn locked_seats_do_not_count() {
        let mut rooms: RoomManager<Duration> =
            RoomManager::new(&["room1", "room2"], 3, Duration::from_secs(10), 8);
        rooms.claim("room1", "a", Duration::ZERO).unwrap();
        rooms.claim("room1", "b", Duration::ZERO).unwrap();
        assert_eq!(rooms.room_occupancy("room1"), Ok(0));

        rooms.confirm("room1", 1, "a", meta("alice"), Duration::ZERO).unwrap();
        assert_eq!(rooms.room_occupancy("room1"), Ok(1));
    }

    #[test]
    fn all_rooms_reported_including_empty() {
        let mut rooms: RoomManager<Duration> =
            RoomManager::new(&["room1", "room2"], 3, Duration::from_secs(10), 8);
        rooms.claim("room2", "a", Duration::ZERO).unwrap();
        rooms.confirm("room2", 1, "a", meta("alice"), Duration::ZERO).unwrap();

        let counts = rooms.all_room_occupancy();
        assert_eq!(
            counts,
            BTreeMap::from([("room1".to_string(), 0), ("room2".to_string(), 1)])
        );
    }

    #[test]
    fn unknown_room_occupancy_is_an_error() {
        let rooms: RoomManager<Duration> =
            RoomManager::new(&["room1"], 3, Duration::from_secs(10), 8);
        assert_eq!(rooms.room_occupancy("nope"), Err(RoomError::UnknownRoom("nope".to_string())));
    }
}
