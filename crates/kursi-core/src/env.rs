//! Environment abstraction for deterministic testing.
//!
//! Decouples seat and scheduling logic from system resources (time,
//! randomness). Simulation supplies a virtual clock and a seeded RNG so lock
//! expiry can be exercised without sleeping; production uses the system
//! clock and OS entropy.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock_millis()` is only used for values shown to clients, never for
///   expiry decisions
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`, simulation uses a virtual
    /// instant advanced explicitly by the test.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time. Drives seat lock expiry.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time in Unix milliseconds.
    ///
    /// Stamped on private messages so recipients can order them.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, simulation environments MUST produce the same
    /// sequence.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for session identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
