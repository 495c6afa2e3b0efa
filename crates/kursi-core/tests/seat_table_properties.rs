//! Property-based tests for `SeatTable`
//!
//! Random operation sequences against a small table, checking the table
//! invariants after every step.

use std::time::Duration;

use kursi_core::{ClaimOutcome, SeatStatus, SeatTable};
use kursi_proto::{Point, SeatMetadata};
use proptest::prelude::*;

const CAPACITY: u32 = 5;
const EXPIRY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum Op {
    Claim(u8),
    Confirm(u32, u8),
    Release(u32),
    Point(u32),
    Advance(u64),
    Sweep,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Claim),
        (1u32..=CAPACITY + 1, 0u8..8).prop_map(|(s, h)| Op::Confirm(s, h)),
        (1u32..=CAPACITY).prop_map(Op::Release),
        (1u32..=CAPACITY).prop_map(Op::Point),
        (0u64..15).prop_map(Op::Advance),
        Just(Op::Sweep),
    ]
}

fn holder(h: u8) -> String {
    format!("user{h}")
}

fn check_invariants(table: &SeatTable<Duration>, now: Duration) -> Result<(), TestCaseError> {
    let occupied = table.occupied_count();
    let locked = table.locked_count(now);
    prop_assert!(occupied + locked <= CAPACITY as usize);

    for seat in table.seats() {
        if seat.occupant().is_some() {
            prop_assert!(seat.lock().is_none(), "occupied seat {} has a lock", seat.index());
            prop_assert!(!seat.metadata().is_empty());
        }
        if let Some(h) = seat.holder() {
            prop_assert_eq!(table.seat_of(h), Some(seat.index()));
        }
    }

    for (h, index) in table.holders() {
        let seat = table.seat(index).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(seat.holder(), Some(h));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: capacity bound, occupied-without-lock and index consistency
    /// hold after every operation
    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op(), 1..80)) {
        let mut table = SeatTable::new(CAPACITY, EXPIRY, 8);
        let mut now = Duration::ZERO;

        for op in ops {
            match op {
                Op::Claim(h) => {
                    let _ = table.claim(&holder(h), now);
                },
                Op::Confirm(seat, h) => {
                    let meta = SeatMetadata { display_name: holder(h), ..SeatMetadata::empty() };
                    let _ = table.confirm(seat, &holder(h), meta, now);
                },
                Op::Release(seat) => {
                    table.release(seat).map_err(|e| TestCaseError::fail(e.to_string()))?;
                },
                Op::Point(seat) => {
                    table
                        .record_point(seat, Point { x: 0.0, y: 0.0, fast: false })
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert!(table.seat(seat).map(|s| s.points().len() <= 8).unwrap_or(false));
                },
                Op::Advance(secs) => now += Duration::from_secs(secs),
                Op::Sweep => {
                    table.sweep_expired(now);
                    prop_assert!(table.expired_locks(now).is_empty());
                },
            }
            check_invariants(&table, now)?;
        }
    }

    /// Property: an unconfirmed claim is free once the expiry window passes,
    /// without any explicit release
    #[test]
    fn prop_abandoned_lock_is_reclaimed(
        holders in 1u8..=5,
        extra in 1u64..3600,
    ) {
        let mut table = SeatTable::new(CAPACITY, EXPIRY, 8);
        for h in 0..holders {
            prop_assert!(table.claim(&holder(h), Duration::ZERO).is_some());
        }

        let later = EXPIRY + Duration::from_secs(extra);
        let released = table.sweep_expired(later);
        prop_assert_eq!(released.len(), holders as usize);
        for seat in 1..=CAPACITY {
            prop_assert_eq!(table.status(seat, later).ok(), Some(SeatStatus::Free));
        }
    }

    /// Property: a full table rejects further claims and leaves every seat
    /// untouched
    #[test]
    fn prop_full_table_rejects(elapsed in 0u64..=10) {
        let mut table = SeatTable::new(CAPACITY, EXPIRY, 8);
        for h in 0..CAPACITY as u8 {
            let outcome = table.claim(&holder(h), Duration::ZERO);
            prop_assert_eq!(
                outcome,
                Some(ClaimOutcome::Locked { seat: u32::from(h) + 1, displaced: None })
            );
        }

        let now = Duration::from_secs(elapsed);
        prop_assert_eq!(table.claim("latecomer", now), None);
        prop_assert_eq!(table.seat_of("latecomer"), None);
        prop_assert_eq!(table.locked_count(now), CAPACITY as usize);
    }
}
