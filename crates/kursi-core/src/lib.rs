//! Kursi core: the seat table state machine.
//!
//! Pure logic with no I/O. Time is supplied by the caller through the
//! [`Environment`] trait so the same code runs under the system clock in
//! production and a virtual clock in simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod seat;

pub use env::Environment;
pub use error::SeatError;
pub use seat::{ClaimOutcome, Seat, SeatLock, SeatStatus, SeatTable};
