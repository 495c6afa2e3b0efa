//! Connection registry for session, room and identifier tracking.
//!
//! The registry maintains three views of the connected sessions: session →
//! info (identifier, current room, held seats), room → member sessions (for
//! broadcast) and identifier → session (for private delivery and presence
//! checks). A session is a member of at most one room at a time.
//!
//! Identifiers are not unique. The identifier index is last-writer-wins: the
//! most recent session to set an identifier receives messages addressed to
//! it. When that session goes away, the index falls back to another session
//! still carrying the same identifier, if any.

use std::collections::{BTreeSet, HashMap};

use kursi_proto::SeatIndex;

/// Information about a registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Client-chosen identifier, once set
    pub identifier: Option<String>,
    /// Room the session currently belongs to
    pub room: Option<String>,
    /// Seats held in `room`
    pub seats: BTreeSet<SeatIndex>,
}

impl SessionInfo {
    /// Create info for a freshly connected session.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registry for tracking sessions, room membership and identifiers.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Room → member session IDs, ordered for deterministic fan-out
    room_members: HashMap<String, BTreeSet<u64>>,
    /// Identifier → session ID (reverse index, last writer wins)
    identifier_sessions: HashMap<String, u64>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// Returns `false` if the session already exists.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.sessions.insert(session_id, SessionInfo::new());
        true
    }

    /// Unregister a session, removing its room membership and identifier
    /// mapping.
    ///
    /// Seats are returned as part of the info; releasing them in the seat
    /// tables is the caller's job.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        let info = self.sessions.remove(&session_id)?;

        if let Some(room) = &info.room {
            self.leave_room(session_id, room);
        }
        if let Some(identifier) = &info.identifier {
            self.unmap_identifier(session_id, identifier);
        }

        Some(info)
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// All registered session IDs.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// All sessions with their info.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &SessionInfo)> {
        self.sessions.iter().map(|(id, info)| (*id, info))
    }

    /// Assign or overwrite a session's identifier.
    ///
    /// The session becomes the delivery target for `identifier`, shadowing
    /// any other session that set it earlier. Returns `false` if the session
    /// doesn't exist.
    pub fn set_identifier(&mut self, session_id: u64, identifier: &str) -> bool {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        let previous = info.identifier.replace(identifier.to_string());

        if let Some(previous) = previous
            && previous != identifier
        {
            self.unmap_identifier(session_id, &previous);
        }
        self.identifier_sessions.insert(identifier.to_string(), session_id);
        true
    }

    /// Session currently receiving messages for `identifier`.
    pub fn session_for_identifier(&self, identifier: &str) -> Option<u64> {
        self.identifier_sessions.get(identifier).copied()
    }

    /// Move a session into `room`, leaving its previous room.
    ///
    /// Held seats are cleared; they belonged to the previous room. Returns
    /// `false` if the session doesn't exist.
    pub fn move_to_room(&mut self, session_id: u64, room: &str) -> bool {
        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if info.room.as_deref() == Some(room) {
            return true;
        }

        let previous = info.room.replace(room.to_string());
        info.seats.clear();
        if let Some(previous) = previous {
            self.leave_room(session_id, &previous);
        }
        self.room_members.entry(room.to_string()).or_default().insert(session_id);
        true
    }

    /// Record that a session holds `seat` in its current room.
    ///
    /// Returns `false` if the session doesn't exist or is in no room.
    pub fn hold_seat(&mut self, session_id: u64, seat: SeatIndex) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(info) if info.room.is_some() => {
                info.seats.insert(seat);
                true
            },
            _ => false,
        }
    }

    /// Whether a session holds `seat` in `room`.
    pub fn holds_seat(&self, session_id: u64, room: &str, seat: SeatIndex) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|info| info.room.as_deref() == Some(room) && info.seats.contains(&seat))
    }

    /// Remove and return every seat a session holds.
    pub fn take_seats(&mut self, session_id: u64) -> BTreeSet<SeatIndex> {
        self.sessions
            .get_mut(&session_id)
            .map(|info| std::mem::take(&mut info.seats))
            .unwrap_or_default()
    }

    /// Forget `seat` in `room` for every member holding it.
    ///
    /// Called whenever a seat is released, so no session keeps a stale hold.
    /// Returns the sessions that held it.
    pub fn drop_seat(&mut self, room: &str, seat: SeatIndex) -> Vec<u64> {
        let mut affected = Vec::new();
        let Some(members) = self.room_members.get(room) else {
            return affected;
        };
        for session_id in members {
            if let Some(info) = self.sessions.get_mut(session_id)
                && info.seats.remove(&seat)
            {
                affected.push(*session_id);
            }
        }
        affected
    }

    /// All sessions in a room, ascending by session ID.
    pub fn sessions_in_room(&self, room: &str) -> impl Iterator<Item = u64> + '_ {
        self.room_members.get(room).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions in a room.
    pub fn room_session_count(&self, room: &str) -> usize {
        self.room_members.get(room).map_or(0, BTreeSet::len)
    }

    fn leave_room(&mut self, session_id: u64, room: &str) {
        if let Some(members) = self.room_members.get_mut(room) {
            members.remove(&session_id);
            if members.is_empty() {
                self.room_members.remove(room);
            }
        }
    }

    /// Drop `session_id` as the target of `identifier`, falling back to the
    /// lowest-numbered remaining session with the same identifier.
    fn unmap_identifier(&mut self, session_id: u64, identifier: &str) {
        if self.identifier_sessions.get(identifier) != Some(&session_id) {
            return;
        }
        let fallback = self
            .sessions
            .iter()
            .filter(|(id, info)| {
                **id != session_id && info.identifier.as_deref() == Some(identifier)
            })
            .map(|(id, _)| *id)
            .min();

        match fallback {
            Some(other) => {
                self.identifier_sessions.insert(identifier.to_string(), other);
            },
            None => {
                self.identifier_sessions.remove(identifier);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_session() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1));
        assert!(registry.has_session(1));
        assert!(!registry.has_session(2));

        let info = registry.session(1).unwrap();
        assert!(info.identifier.is_none());
        assert!(info.room.is_none());
        assert!(info.seats.is_empty());
    }

    #[test]
    fn register_duplicate_session_fails() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1));
        assert!(!registry.register_session(1));
    }

    #[test]
    fn identifier_is_last_writer_wins() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);

        registry.set_identifier(1, "alice");
        assert_eq!(registry.session_for_identifier("alice"), Some(1));

        registry.set_identifier(2, "alice");
        assert_eq!(registry.session_for_identifier("alice"), Some(2));
    }

    #[test]
    fn identifier_falls_back_when_latest_session_leaves() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);
        registry.set_identifier(1, "alice");
        registry.set_identifier(2, "alice");

        registry.unregister_session(2);
        assert_eq!(registry.session_for_identifier("alice"), Some(1));

        registry.unregister_session(1);
        assert_eq!(registry.session_for_identifier("alice"), None);
    }

    #[test]
    fn changing_identifier_cleans_up_reverse_index() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);

        registry.set_identifier(1, "alice");
        registry.set_identifier(1, "bob");

        assert_eq!(registry.session_for_identifier("alice"), None);
        assert_eq!(registry.session_for_identifier("bob"), Some(1));
    }

    #[test]
    fn set_identifier_on_unknown_session_fails() {
        let mut registry = ConnectionRegistry::new();
        assert!(!registry.set_identifier(9, "ghost"));
        assert_eq!(registry.session_for_identifier("ghost"), None);
    }

    #[test]
    fn move_to_room_switches_membership() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);

        registry.move_to_room(1, "room1");
        registry.hold_seat(1, 4);
        assert_eq!(registry.sessions_in_room("room1").collect::<Vec<_>>(), vec![1]);
        assert!(registry.holds_seat(1, "room1", 4));

        registry.move_to_room(1, "room2");
        assert_eq!(registry.room_session_count("room1"), 0);
        assert_eq!(registry.sessions_in_room("room2").collect::<Vec<_>>(), vec![1]);
        assert!(registry.session(1).unwrap().seats.is_empty());
    }

    #[test]
    fn hold_seat_requires_room() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        assert!(!registry.hold_seat(1, 1));
    }

    #[test]
    fn drop_seat_clears_every_holder() {
        let mut registry = ConnectionRegistry::new();
        for id in [1, 2, 3] {
            registry.register_session(id);
            registry.move_to_room(id, "room1");
        }
        registry.hold_seat(1, 5);
        registry.hold_seat(2, 5);
        registry.hold_seat(3, 6);

        assert_eq!(registry.drop_seat("room1", 5), vec![1, 2]);
        assert!(!registry.holds_seat(1, "room1", 5));
        assert!(registry.holds_seat(3, "room1", 6));
    }

    #[test]
    fn unregister_session_removes_membership() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);
        registry.move_to_room(1, "room1");
        registry.move_to_room(2, "room1");
        registry.hold_seat(1, 3);

        let info = registry.unregister_session(1).unwrap();
        assert_eq!(info.room.as_deref(), Some("room1"));
        assert_eq!(info.seats, BTreeSet::from([3]));

        assert_eq!(registry.sessions_in_room("room1").collect::<Vec<_>>(), vec![2]);
        assert!(registry.unregister_session(1).is_none());
    }

    #[test]
    fn take_seats_empties_hold_set() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1);
        registry.move_to_room(1, "room1");
        registry.hold_seat(1, 2);

        assert_eq!(registry.take_seats(1), BTreeSet::from([2]));
        assert!(registry.take_seats(1).is_empty());
        assert!(registry.take_seats(99).is_empty());
    }

    #[test]
    fn session_count() {
        let mut registry = ConnectionRegistry::new();

        assert_eq!(registry.session_count(), 0);
        registry.register_session(1);
        registry.register_session(2);
        assert_eq!(registry.session_count(), 2);

        registry.unregister_session(1);
        assert_eq!(registry.session_count(), 1);
    }
}
