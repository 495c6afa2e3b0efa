//! Property-based tests for `RoomManager`
//!
//! Instants are plain `Duration`s measured from an arbitrary origin, so lock
//! expiry is exercised without a clock.

use std::{collections::HashSet, time::Duration};

use kursi_proto::SeatMetadata;
use kursi_server::{RoomError, RoomManager};
use proptest::prelude::*;

const EXPIRY: Duration = Duration::from_secs(10);

fn manager(seats: u32) -> RoomManager<Duration> {
    RoomManager::new(&["room1", "room2"], seats, EXPIRY, 8)
}

fn meta(name: &str) -> SeatMetadata {
    SeatMetadata { display_name: name.to_string(), ..SeatMetadata::empty() }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Distinct identifiers never share a seat
    #[test]
    fn prop_claims_are_exclusive(seats in 1u32..40, users in 1usize..60) {
        let mut rooms = manager(seats);
        let mut taken = HashSet::new();

        for user in 0..users {
            match rooms.claim("room1", &format!("user{user}"), Duration::ZERO) {
                Ok(outcome) => prop_assert!(taken.insert(outcome.seat())),
                Err(err) => {
                    prop_assert_eq!(err, RoomError::RoomFull("room1".to_string()));
                    prop_assert_eq!(taken.len(), seats as usize);
                },
            }
        }

        prop_assert!(taken.len() <= seats as usize);
    }

    /// Property: Occupancy counts confirmed seats only
    #[test]
    fn prop_occupancy_counts_confirmed(seats in 1u32..20, confirm_mask in any::<u32>()) {
        let mut rooms = manager(seats);
        let mut confirmed = 0;

        for user in 0..seats {
            let holder = format!("user{user}");
            let seat = rooms.claim("room1", &holder, Duration::ZERO).unwrap().seat();
            if confirm_mask & (1 << user) != 0 {
                rooms.confirm("room1", seat, &holder, meta(&holder), Duration::ZERO).unwrap();
                confirmed += 1;
            }
        }

        prop_assert_eq!(rooms.room_occupancy("room1"), Ok(confirmed));
        prop_assert_eq!(rooms.occupied_seats("room1").unwrap().len(), confirmed);
        prop_assert_eq!(rooms.room_occupancy("room2"), Ok(0));
    }

    /// Property: A sweep releases exactly the unconfirmed locks past the window
    #[test]
    fn prop_sweep_releases_stale_locks(seats in 1u32..20, elapsed_ms in 0u64..20_000) {
        let mut rooms = manager(seats);
        for user in 0..seats {
            rooms.claim("room1", &format!("user{user}"), Duration::ZERO).unwrap();
        }

        let expired = rooms.sweep_expired_locks(Duration::from_millis(elapsed_ms));
        if Duration::from_millis(elapsed_ms) > EXPIRY {
            prop_assert_eq!(expired.len(), seats as usize);
            prop_assert!(rooms.claim("room1", "late", Duration::from_millis(elapsed_ms)).is_ok());
        } else {
            prop_assert!(expired.is_empty());
        }
    }
}

#[test]
fn unknown_room_leaves_state_untouched() {
    let mut rooms = manager(2);
    assert_eq!(
        rooms.claim("room9", "alice", Duration::ZERO),
        Err(RoomError::UnknownRoom("room9".to_string()))
    );
    assert_eq!(rooms.all_room_occupancy().len(), 2);
}
