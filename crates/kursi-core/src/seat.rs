//! Fixed-capacity seat table of one room.
//!
//! A seat moves through `Free → Locked → Occupied → Free`. Claiming locks the
//! first free seat for an identifier; confirming writes occupant metadata and
//! drops the lock; releasing resets the seat unconditionally. A lock that is
//! never confirmed ages out after the expiry window and is released by
//! [`SeatTable::sweep_expired`], which is the only liveness guarantee against
//! a holder that vanishes without a clean disconnect.
//!
//! # Invariants
//!
//! - Occupied + locked seats never exceed capacity
//! - An occupied seat never has a lock holder
//! - Every entry of the holder index points at a seat locked or occupied by
//!   that identifier, and every such seat has an index entry
//!
//! Time is passed in by the caller rather than read from a clock, so the
//! table stays deterministic under simulation.

use std::{
    collections::{HashMap, VecDeque},
    ops::Sub,
    time::Duration,
};

use kursi_proto::{Point, SeatIndex, SeatMetadata};

use crate::error::SeatError;

/// Derived status of a seat at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatStatus {
    /// No occupant, and no live lock
    Free,
    /// Claimed, waiting for confirmation
    Locked,
    /// Occupant metadata published
    Occupied,
}

/// Pending claim on a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLock<I> {
    /// Identifier that claimed the seat
    pub holder: String,
    /// When the claim was made
    pub locked_at: I,
}

/// One seat of a room.
#[derive(Debug, Clone)]
pub struct Seat<I> {
    index: SeatIndex,
    metadata: SeatMetadata,
    occupant: Option<String>,
    lock: Option<SeatLock<I>>,
    points: VecDeque<Point>,
}

impl<I> Seat<I> {
    fn new(index: SeatIndex) -> Self {
        Self {
            index,
            metadata: SeatMetadata::empty(),
            occupant: None,
            lock: None,
            points: VecDeque::new(),
        }
    }

    /// Seat number, starting at 1.
    pub fn index(&self) -> SeatIndex {
        self.index
    }

    /// Published occupant metadata. Empty unless occupied.
    pub fn metadata(&self) -> &SeatMetadata {
        &self.metadata
    }

    /// Identifier that confirmed the seat, if occupied.
    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    /// Pending lock, if any. May be past expiry until the next sweep.
    pub fn lock(&self) -> Option<&SeatLock<I>> {
        self.lock.as_ref()
    }

    /// Point history, oldest first.
    pub fn points(&self) -> &VecDeque<Point> {
        &self.points
    }

    /// Identifier currently holding this seat by occupancy or lock.
    pub fn holder(&self) -> Option<&str> {
        self.occupant.as_deref().or_else(|| self.lock.as_ref().map(|l| l.holder.as_str()))
    }

    fn reset(&mut self) {
        self.metadata = SeatMetadata::empty();
        self.occupant = None;
        self.lock = None;
        self.points.clear();
    }
}

/// Result of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Identifier already held this seat. Nothing changed.
    Rejoined(SeatIndex),
    /// A seat was locked for the identifier.
    Locked {
        /// Locked seat
        seat: SeatIndex,
        /// Holder of an expired lock that was taken over, if any
        displaced: Option<String>,
    },
}

impl ClaimOutcome {
    /// The seat the identifier now holds.
    pub fn seat(&self) -> SeatIndex {
        match self {
            Self::Rejoined(seat) | Self::Locked { seat, .. } => *seat,
        }
    }
}

/// Seat table of one room.
#[derive(Debug, Clone)]
pub struct SeatTable<I> {
    seats: Vec<Seat<I>>,
    by_holder: HashMap<String, SeatIndex>,
    lock_expiry: Duration,
    point_history_limit: usize,
}

impl<I> SeatTable<I>
where
    I: Copy + Sub<Output = Duration>,
{
    /// Create a table of `capacity` free seats numbered `1..=capacity`.
    pub fn new(capacity: SeatIndex, lock_expiry: Duration, point_history_limit: usize) -> Self {
        Self {
            seats: (1..=capacity).map(Seat::new).collect(),
            by_holder: HashMap::new(),
            lock_expiry,
            point_history_limit,
        }
    }

    /// Number of seats.
    pub fn capacity(&self) -> SeatIndex {
        // Constructed from a `SeatIndex` range, so the length always fits.
        SeatIndex::try_from(self.seats.len()).unwrap_or(SeatIndex::MAX)
    }

    /// Lock expiry window.
    pub fn lock_expiry(&self) -> Duration {
        self.lock_expiry
    }

    /// Seat by number.
    pub fn seat(&self, index: SeatIndex) -> Result<&Seat<I>, SeatError> {
        let capacity = self.capacity();
        index
            .checked_sub(1)
            .and_then(|i| self.seats.get(i as usize))
            .ok_or(SeatError::SeatOutOfRange { index, capacity })
    }

    fn seat_mut(&mut self, index: SeatIndex) -> Result<&mut Seat<I>, SeatError> {
        let capacity = self.capacity();
        index
            .checked_sub(1)
            .and_then(|i| self.seats.get_mut(i as usize))
            .ok_or(SeatError::SeatOutOfRange { index, capacity })
    }

    /// All seats in index order.
    pub fn seats(&self) -> impl Iterator<Item = &Seat<I>> {
        self.seats.iter()
    }

    /// Seat held by `holder`, if any.
    pub fn seat_of(&self, holder: &str) -> Option<SeatIndex> {
        self.by_holder.get(holder).copied()
    }

    /// Holder index entries.
    pub fn holders(&self) -> impl Iterator<Item = (&str, SeatIndex)> {
        self.by_holder.iter().map(|(h, s)| (h.as_str(), *s))
    }

    fn lock_live(&self, lock: &SeatLock<I>, now: I) -> bool {
        now - lock.locked_at <= self.lock_expiry
    }

    /// Derived status of a seat.
    pub fn status(&self, index: SeatIndex, now: I) -> Result<SeatStatus, SeatError> {
        let seat = self.seat(index)?;
        Ok(self.status_of(seat, now))
    }

    fn status_of(&self, seat: &Seat<I>, now: I) -> SeatStatus {
        if seat.occupant.is_some() {
            SeatStatus::Occupied
        } else if seat.lock.as_ref().is_some_and(|l| self.lock_live(l, now)) {
            SeatStatus::Locked
        } else {
            SeatStatus::Free
        }
    }

    /// Claim a seat for `holder`.
    ///
    /// Returns the seat already held by `holder` if there is one. Otherwise
    /// locks the lowest-numbered free seat, where a seat whose lock ran past
    /// the expiry window counts as free. Returns `None` when the room is full,
    /// in which case nothing is mutated.
    pub fn claim(&mut self, holder: &str, now: I) -> Option<ClaimOutcome> {
        if let Some(index) = self.seat_of(holder) {
            let idx = index as usize - 1;
            if self.seats[idx].occupant.is_some() {
                return Some(ClaimOutcome::Rejoined(index));
            }
            let live = self.seats[idx].lock.as_ref().is_some_and(|l| self.lock_live(l, now));
            if live {
                return Some(ClaimOutcome::Rejoined(index));
            }
            // Own lock aged out before the sweep: refresh it in place.
            self.seats[idx].lock = Some(SeatLock { holder: holder.to_string(), locked_at: now });
            return Some(ClaimOutcome::Locked { seat: index, displaced: None });
        }

        let idx = self.seats.iter().position(|s| self.status_of(s, now) == SeatStatus::Free)?;
        let seat = &mut self.seats[idx];
        let index = seat.index;
        let displaced = seat.lock.take().map(|l| l.holder);
        seat.points.clear();
        seat.lock = Some(SeatLock { holder: holder.to_string(), locked_at: now });

        if let Some(old) = &displaced {
            self.by_holder.remove(old);
        }
        self.by_holder.insert(holder.to_string(), index);

        Some(ClaimOutcome::Locked { seat: index, displaced })
    }

    /// Publish occupant metadata on a seat locked or occupied by `holder`.
    ///
    /// Returns `true` when the seat became occupied by this call, `false` for
    /// a re-update of an already occupied seat. Point history is kept.
    pub fn confirm(
        &mut self,
        index: SeatIndex,
        holder: &str,
        metadata: SeatMetadata,
        now: I,
    ) -> Result<bool, SeatError> {
        if metadata.is_empty() {
            return Err(SeatError::EmptyDisplayName);
        }
        let expiry = self.lock_expiry;
        let seat = self.seat_mut(index)?;

        if let Some(occupant) = &seat.occupant {
            if occupant != holder {
                return Err(SeatError::NotLockHolder { index });
            }
            seat.metadata = metadata;
            return Ok(false);
        }

        match &seat.lock {
            Some(lock) if lock.holder != holder => Err(SeatError::NotLockHolder { index }),
            Some(lock) if now - lock.locked_at > expiry => Err(SeatError::LockExpired { index }),
            Some(_) => {
                seat.lock = None;
                seat.occupant = Some(holder.to_string());
                seat.metadata = metadata;
                Ok(true)
            },
            None => Err(SeatError::NotClaimed { index }),
        }
    }

    /// Reset a seat to free regardless of its prior state.
    ///
    /// Returns the identifier that held it, if any.
    pub fn release(&mut self, index: SeatIndex) -> Result<Option<String>, SeatError> {
        let seat = self.seat_mut(index)?;
        let holder = seat.holder().map(str::to_string);
        seat.reset();

        if let Some(holder) = &holder
            && self.by_holder.get(holder) == Some(&index)
        {
            self.by_holder.remove(holder);
        }
        Ok(holder)
    }

    /// Append a point to a seat's history, dropping the oldest entries past
    /// the history limit.
    pub fn record_point(&mut self, index: SeatIndex, point: Point) -> Result<(), SeatError> {
        let limit = self.point_history_limit;
        let seat = self.seat_mut(index)?;
        seat.points.push_back(point);
        while seat.points.len() > limit {
            seat.points.pop_front();
        }
        Ok(())
    }

    /// Seats whose lock is past the expiry window.
    pub fn expired_locks(&self, now: I) -> Vec<SeatIndex> {
        self.seats
            .iter()
            .filter(|s| s.lock.as_ref().is_some_and(|l| !self.lock_live(l, now)))
            .map(|s| s.index)
            .collect()
    }

    /// Release every expired lock, returning `(seat, former holder)` pairs in
    /// seat order.
    pub fn sweep_expired(&mut self, now: I) -> Vec<(SeatIndex, String)> {
        let mut released = Vec::new();
        for index in self.expired_locks(now) {
            if let Ok(Some(holder)) = self.release(index) {
                released.push((index, holder));
            }
        }
        released
    }

    /// Release every held seat, returning `(seat, former holder)` pairs.
    pub fn reset(&mut self) -> Vec<(SeatIndex, String)> {
        let mut released = Vec::new();
        for seat in &mut self.seats {
            if let Some(holder) = seat.holder().map(str::to_string) {
                released.push((seat.index, holder));
            }
            seat.reset();
        }
        self.by_holder.clear();
        released
    }

    /// Occupied seats with their metadata, in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (SeatIndex, &SeatMetadata)> {
        self.seats.iter().filter(|s| s.occupant.is_some()).map(|s| (s.index, &s.metadata))
    }

    /// Number of occupied seats.
    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| s.occupant.is_some()).count()
    }

    /// Number of seats with a live lock.
    pub fn locked_count(&self, now: I) -> usize {
        self.seats.iter().filter(|s| self.status_of(s, now) == SeatStatus::Locked).count()
    }
}
