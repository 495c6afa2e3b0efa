//! Broadcast scheduler for high-frequency updates.
//!
//! Pointer updates and seat metadata changes are buffered here and released
//! once per tick instead of being broadcast as they arrive. That bounds the
//! outbound rate of a bursty producer to one flush per tick per room.
//!
//! - Points are buffered per seat and flushed one message per point, in
//!   submission order. Nothing is coalesced.
//! - Seat metadata is buffered per room and flushed as a single batch. The
//!   last write per seat within a tick wins.
//!
//! The two buffers are independent. No ordering is promised between a
//! point and a metadata update flushed on the same tick.

use std::collections::BTreeMap;

use kursi_proto::{Point, SeatIndex, SeatMetadata, ServerMessage};

/// Buffers for tick-driven broadcasts.
#[derive(Debug, Default)]
pub struct BroadcastScheduler {
    points: BTreeMap<String, BTreeMap<SeatIndex, Vec<Point>>>,
    seat_updates: BTreeMap<String, BTreeMap<SeatIndex, SeatMetadata>>,
}

impl BroadcastScheduler {
    /// Create a scheduler with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a point for the next flush.
    pub fn enqueue_point(&mut self, room: &str, seat: SeatIndex, point: Point) {
        self.points.entry(room.to_string()).or_default().entry(seat).or_default().push(point);
    }

    /// Buffer a seat metadata change, replacing any earlier change to the
    /// same seat since the last flush.
    pub fn enqueue_seat_update(&mut self, room: &str, seat: SeatIndex, metadata: SeatMetadata) {
        self.seat_updates.entry(room.to_string()).or_default().insert(seat, metadata);
    }

    /// Drain the point buffers.
    ///
    /// Returns one `(room, pointUpdated)` pair per buffered point: rooms and
    /// seats ascending, points in arrival order within a seat.
    pub fn flush_points(&mut self) -> Vec<(String, ServerMessage)> {
        let mut out = Vec::new();
        for (room, seats) in std::mem::take(&mut self.points) {
            for (seat, points) in seats {
                for point in points {
                    out.push((room.clone(), ServerMessage::PointUpdated {
                        room: room.clone(),
                        seat,
                        point,
                    }));
                }
            }
        }
        out
    }

    /// Drain the seat update buffers into one batch per room.
    pub fn flush_seat_updates(&mut self) -> Vec<(String, ServerMessage)> {
        std::mem::take(&mut self.seat_updates)
            .into_iter()
            .filter(|(_, updates)| !updates.is_empty())
            .map(|(room, updates)| {
                let message = ServerMessage::SeatBatchUpdate {
                    room: room.clone(),
                    updates: updates.into_iter().collect(),
                };
                (room, message)
            })
            .collect()
    }

    /// Drop a seat's pending metadata change.
    pub fn discard_seat_update(&mut self, room: &str, seat: SeatIndex) {
        if let Some(updates) = self.seat_updates.get_mut(room) {
            updates.remove(&seat);
            if updates.is_empty() {
                self.seat_updates.remove(room);
            }
        }
    }

    /// Drop a seat's pending points.
    pub fn discard_points(&mut self, room: &str, seat: SeatIndex) {
        if let Some(seats) = self.points.get_mut(room) {
            seats.remove(&seat);
            if seats.is_empty() {
                self.points.remove(room);
            }
        }
    }

    /// Drop everything pending for a seat.
    pub fn discard_seat(&mut self, room: &str, seat: SeatIndex) {
        self.discard_points(room, seat);
        self.discard_seat_update(room, seat);
    }

    /// Drop everything pending for a room.
    pub fn discard_room(&mut self, room: &str) {
        self.points.remove(room);
        self.seat_updates.remove(room);
    }

    /// Points waiting for a seat.
    pub fn pending_points(&self, room: &str, seat: SeatIndex) -> usize {
        self.points.get(room).and_then(|seats| seats.get(&seat)).map_or(0, Vec::len)
    }

    /// Whether a metadata change is waiting for a seat.
    pub fn has_pending_seat_update(&self, room: &str, seat: SeatIndex) -> bool {
        self.seat_updates.get(room).is_some_and(|updates| updates.contains_key(&seat))
    }

    /// Nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.seat_updates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64) -> Point {
        Point { x, y: 0.0, fast: false }
    }

    fn meta(name: &str) -> SeatMetadata {
        SeatMetadata { display_name: name.to_string(), ..SeatMetadata::empty() }
    }

    #[test]
    fn points_flush_in_fifo_order_once() {
        let mut scheduler = BroadcastScheduler::new();
        for x in [1.0, 2.0, 3.0] {
            scheduler.enqueue_point("room1", 4, point(x));
        }

        let flushed = scheduler.flush_points();
        let xs: Vec<f64> = flushed
            .iter()
            .map(|(_, msg)| match msg {
                ServerMessage::PointUpdated { point, .. } => point.x,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);

        assert!(scheduler.flush_points().is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn seat_updates_coalesce_per_seat() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.enqueue_seat_update("room1", 2, meta("first"));
        scheduler.enqueue_seat_update("room1", 1, meta("one"));
        scheduler.enqueue_seat_update("room1", 2, meta("second"));
        scheduler.enqueue_seat_update("room2", 1, meta("other"));

        let flushed = scheduler.flush_seat_updates();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0], ("room1".to_string(), ServerMessage::SeatBatchUpdate {
            room: "room1".to_string(),
            updates: vec![(1, meta("one")), (2, meta("second"))],
        }));
        assert_eq!(flushed[1].0, "room2");
        assert!(scheduler.flush_seat_updates().is_empty());
    }

    #[test]
    fn discard_seat_drops_both_buffers() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.enqueue_point("room1", 1, point(1.0));
        scheduler.enqueue_seat_update("room1", 1, meta("a"));
        scheduler.enqueue_point("room1", 2, point(2.0));

        scheduler.discard_seat("room1", 1);
        assert_eq!(scheduler.pending_points("room1", 1), 0);
        assert!(!scheduler.has_pending_seat_update("room1", 1));
        assert_eq!(scheduler.pending_points("room1", 2), 1);
    }

    #[test]
    fn discard_seat_update_keeps_points() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.enqueue_point("room1", 1, point(1.0));
        scheduler.enqueue_seat_update("room1", 1, meta("a"));

        scheduler.discard_seat_update("room1", 1);
        assert_eq!(scheduler.pending_points("room1", 1), 1);
        assert!(scheduler.flush_seat_updates().is_empty());
    }

    #[test]
    fn discard_room_leaves_other_rooms() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.enqueue_point("room1", 1, point(1.0));
        scheduler.enqueue_point("room2", 1, point(1.0));

        scheduler.discard_room("room1");
        let flushed = scheduler.flush_points();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].0, "room2");
    }
}
