//! Fuzz target for SeatTable
//!
//! Applies arbitrary claim/confirm/release/point/sweep sequences on a virtual
//! clock and checks the table invariants after every step.
//!
//! # Invariants
//!
//! - Occupied + locked seats never exceed capacity
//! - An occupied seat never has a lock
//! - The holder index agrees with the seats

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use kursi_core::{SeatStatus, SeatTable};
use kursi_proto::{Point, SeatMetadata};
use libfuzzer_sys::fuzz_target;

const EXPIRY: Duration = Duration::from_secs(10);

#[derive(Debug, Arbitrary)]
enum Op {
    Claim { holder: u8 },
    Confirm { seat: u8, holder: u8 },
    Release { seat: u8 },
    Point { seat: u8, x: i16 },
    Advance { millis: u16 },
    Sweep,
    Reset,
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    capacity: u8,
    ops: Vec<Op>,
}

fuzz_target!(|scenario: Scenario| {
    let capacity = u32::from(scenario.capacity % 16) + 1;
    let mut table: SeatTable<Duration> = SeatTable::new(capacity, EXPIRY, 4);
    let mut now = Duration::ZERO;

    for op in scenario.ops {
        match op {
            Op::Claim { holder } => {
                let _ = table.claim(&format!("h{}", holder % 8), now);
            },
            Op::Confirm { seat, holder } => {
                let metadata = SeatMetadata { display_name: "x".to_string(), ..SeatMetadata::empty() };
                let _ = table.confirm(u32::from(seat), &format!("h{}", holder % 8), metadata, now);
            },
            Op::Release { seat } => {
                let _ = table.release(u32::from(seat));
            },
            Op::Point { seat, x } => {
                let _ = table.record_point(u32::from(seat), Point { x: f64::from(x), y: 0.0, fast: false });
            },
            Op::Advance { millis } => now += Duration::from_millis(u64::from(millis)),
            Op::Sweep => {
                let _ = table.sweep_expired(now);
            },
            Op::Reset => {
                let _ = table.reset();
            },
        }

        let held = table.seats().filter(|s| table.status(s.index(), now) != Ok(SeatStatus::Free)).count();
        assert!(held <= capacity as usize);

        for seat in table.seats() {
            assert!(seat.occupant().is_none() || seat.lock().is_none());
            assert!(seat.points().len() <= 4);
            if let Some(holder) = seat.holder() {
                assert_eq!(table.seat_of(holder), Some(seat.index()));
            }
        }
        for (holder, index) in table.holders() {
            assert_eq!(table.seat(index).ok().and_then(|s| s.holder()), Some(holder));
        }
    }
});
