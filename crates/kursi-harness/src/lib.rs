//! Deterministic simulation harness for kursi server testing.
//!
//! [`SimEnv`] supplies a virtual clock and a seeded RNG, and [`SimServer`]
//! drives a [`kursi_server::ServerDriver`] in memory, collecting each
//! session's outbound messages instead of writing them to a socket. Lock
//! expiry and tick batching can be exercised without sleeping.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the seat and
//! registry invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod operation;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    CapacityBound, HeldSeatsOwned, HolderIndexConsistent, Invariant, InvariantRegistry,
    InvariantResult, OccupiedHasNoLock, PointHistoryBounded, RoomMembershipConsistent,
    RoomSnapshot, SeatSnapshot, SessionSnapshot, SystemSnapshot, Violation,
};
pub use operation::Operation;
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::SimServer;
