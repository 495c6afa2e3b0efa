//! Server driver.
//!
//! Ties together the [`ConnectionRegistry`] (sessions, room membership,
//! identifiers), the [`RoomManager`] (seat tables), the [`BroadcastScheduler`]
//! (tick-buffered updates) and the rotating counter.
//!
//! The driver performs no I/O. Each call to [`ServerDriver::process_event`]
//! runs to completion and returns the actions the runtime must execute, so
//! all state is mutated from one place at a time and needs no locking.

use std::time::Duration;

use kursi_core::{ClaimOutcome, env::Environment};
use kursi_proto::{ChatMessage, ClientMessage, Point, ProtocolError, SeatIndex, SeatMetadata, ServerMessage};

use crate::{
    counter::RotatingCounter,
    registry::ConnectionRegistry,
    room_manager::{RoomError, RoomManager},
    scheduler::BroadcastScheduler,
    server_error::DriverError,
};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Closed set of room identifiers
    pub rooms: Vec<String>,
    /// Seats in every room
    pub seats_per_room: SeatIndex,
    /// How long a claimed seat waits for confirmation
    pub lock_expiry: Duration,
    /// Points kept per seat
    pub point_history_limit: usize,
    /// Upper bound of the rotating counter
    pub counter_max: u32,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rooms: (1..=5).map(|n| format!("room{n}")).collect(),
            seats_per_room: 35,
            lock_expiry: Duration::from_secs(10),
            point_history_limit: 256,
            counter_max: 6,
            max_connections: 10_000,
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A decoded message was received from a connection
    MessageReceived {
        /// Connection that sent the message
        session_id: u64,
        /// The validated message
        message: ClientMessage,
    },

    /// A frame from a connection could not be decoded
    MessageRejected {
        /// Connection that sent the frame
        session_id: u64,
        /// Why decoding failed
        error: ProtocolError,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Fast periodic tick: flush buffers, sweep expired locks
    Tick,

    /// Slow periodic tick: advance and broadcast the rotating counter
    CounterTick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerAction {
    /// Send a message to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Message to send
        message: ServerMessage,
    },

    /// Broadcast a message to all sessions in a room
    BroadcastToRoom {
        /// Target room
        room: String,
        /// Message to broadcast
        message: ServerMessage,
        /// Optional session to exclude from broadcast
        exclude_session: Option<u64>,
    },

    /// Broadcast a message to every connected session
    BroadcastAll {
        /// Message to broadcast
        message: ServerMessage,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// Wall-clock time of the event in Unix milliseconds
        timestamp: u64,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// How a released seat is announced to its room.
#[derive(Debug, Clone, Copy)]
enum ReleaseNotice {
    /// Explicit removal, room switch or identifier change
    Removed,
    /// Holder disconnected
    Disconnected,
}

impl ReleaseNotice {
    fn message(self, room: &str, seat: SeatIndex) -> ServerMessage {
        let room = room.to_string();
        match self {
            Self::Removed => ServerMessage::SeatRemoved { room, seat },
            Self::Disconnected => ServerMessage::UserDisconnected { room, seat },
        }
    }
}

/// Action-based server driver.
///
/// Owns all room, seat and session state. Several drivers can coexist in one
/// process; nothing is global.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Session/room/identifier registry
    registry: ConnectionRegistry,
    /// Seat tables of the configured rooms
    rooms: RoomManager<E::Instant>,
    /// Tick-buffered broadcasts
    scheduler: BroadcastScheduler,
    /// Slow-schedule counter
    counter: RotatingCounter,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomManager::new(
                &config.rooms,
                config.seats_per_room,
                config.lock_expiry,
                config.point_history_limit,
            ),
            scheduler: BroadcastScheduler::new(),
            counter: RotatingCounter::new(config.counter_max),
            env,
            config,
        }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver. Failures of an
    /// individual request are answered with an error reply inside the
    /// returned actions; only events for unknown sessions return `Err`.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                Ok(self.handle_connection_accepted(session_id))
            },
            ServerEvent::MessageReceived { session_id, message } => {
                self.handle_message(session_id, message)
            },
            ServerEvent::MessageRejected { session_id, error } => {
                self.handle_message_rejected(session_id, error)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
            ServerEvent::Tick => Ok(self.handle_tick()),
            ServerEvent::CounterTick => Ok(self.handle_counter_tick()),
        }
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction {
        ServerAction::Log { level, message, timestamp: self.env.wall_clock_millis() }
    }

    fn room_user_count(&self, room: &str) -> Result<ServerAction, DriverError> {
        let count = self.rooms.room_occupancy(room)?;
        Ok(ServerAction::BroadcastToRoom {
            room: room.to_string(),
            message: ServerMessage::RoomUserCount { room: room.to_string(), count },
            exclude_session: None,
        })
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(&mut self, session_id: u64) -> Vec<ServerAction> {
        if self.registry.session_count() >= self.config.max_connections {
            return vec![
                ServerAction::CloseConnection {
                    session_id,
                    reason: "max connections exceeded".to_string(),
                },
                self.log(
                    LogLevel::Warn,
                    format!("connection {session_id} rejected: max connections exceeded"),
                ),
            ];
        }

        if !self.registry.register_session(session_id) {
            return vec![self.log(
                LogLevel::Warn,
                format!("connection {session_id} already registered, ignoring"),
            )];
        }

        vec![self.log(LogLevel::Debug, format!("connection {session_id} accepted"))]
    }

    /// Handle an undecodable frame.
    fn handle_message_rejected(
        &mut self,
        session_id: u64,
        error: ProtocolError,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.has_session(session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let message = format!("rejected frame from {session_id}: {error}");
        Ok(vec![
            ServerAction::SendToSession {
                session_id,
                message: DriverError::Protocol(error).reply(),
            },
            self.log(LogLevel::Debug, message),
        ])
    }

    /// Handle a decoded message.
    fn handle_message(
        &mut self,
        session_id: u64,
        message: ClientMessage,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.has_session(session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let tag = message.tag();
        let mut actions = Vec::new();

        let result = match message {
            ClientMessage::SetIdentifier { id } => {
                self.set_identifier(session_id, &id, &mut actions);
                Ok(())
            },
            ClientMessage::JoinRoom { room } => self.join_room(session_id, &room, &mut actions),
            ClientMessage::ConfirmSeat { room, seat, metadata } => {
                self.confirm_seat(session_id, &room, seat, metadata, &mut actions)
            },
            ClientMessage::RemoveSeat { room, seat } => {
                self.remove_seat(session_id, &room, seat, false, &mut actions)
            },
            ClientMessage::RemoveSeatAndPoints { room, seat } => {
                self.remove_seat(session_id, &room, seat, true, &mut actions)
            },
            ClientMessage::Chat { room, chat } => self.chat(&room, chat, &mut actions),
            ClientMessage::PointUpdate { room, seat, point } => {
                self.point_update(session_id, &room, seat, point)
            },
            ClientMessage::Private { target, image_url, message, sender } => {
                self.private(session_id, target, image_url, message, sender, &mut actions);
                Ok(())
            },
            ClientMessage::IsUserOnline { id } => {
                let online = self.registry.session_for_identifier(&id).is_some();
                actions.push(ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::UserOnlineStatus { id, online },
                });
                Ok(())
            },
            ClientMessage::AllRoomsUserCount => {
                actions.push(ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::AllRoomsUserCount {
                        counts: self.rooms.all_room_occupancy(),
                    },
                });
                Ok(())
            },
            ClientMessage::OccupiedSeats { room } => {
                self.rooms.occupied_seats(&room).map_err(DriverError::from).map(|seats| {
                    actions.push(ServerAction::SendToSession {
                        session_id,
                        message: ServerMessage::OccupiedSeats { room, seats },
                    });
                })
            },
            ClientMessage::CurrentNumber => {
                actions.push(ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::CurrentNumber { number: self.counter.current() },
                });
                Ok(())
            },
            ClientMessage::ResetRoom { room } => self.reset_room(session_id, &room, &mut actions),
            ClientMessage::Ping => {
                actions.push(ServerAction::SendToSession { session_id, message: ServerMessage::Pong });
                Ok(())
            },
        };

        if let Err(err) = result {
            actions.push(ServerAction::SendToSession { session_id, message: err.reply() });
            actions.push(self.log(LogLevel::Debug, format!("{tag} from {session_id} failed: {err}")));
        }

        Ok(actions)
    }

    fn identifier(&self, session_id: u64) -> Result<String, DriverError> {
        self.registry
            .session(session_id)
            .ok_or(DriverError::SessionNotFound(session_id))?
            .identifier
            .clone()
            .ok_or(DriverError::IdentifierNotSet)
    }

    /// Seats only count as held in the session's current room.
    fn ensure_holder(&self, session_id: u64, room: &str, seat: SeatIndex) -> Result<(), DriverError> {
        if !self.rooms.has_room(room) {
            return Err(RoomError::UnknownRoom(room.to_string()).into());
        }
        if !self.registry.holds_seat(session_id, room, seat) {
            return Err(RoomError::NotSeatHolder { room: room.to_string(), seat }.into());
        }
        Ok(())
    }

    /// Release every seat a session holds and announce it to the room.
    ///
    /// Runs within the triggering step, so a later claim in the same room can
    /// never see the seat as still held.
    fn release_session_seats(
        &mut self,
        session_id: u64,
        notice: ReleaseNotice,
        actions: &mut Vec<ServerAction>,
    ) {
        let Some(room) = self.registry.session(session_id).and_then(|info| info.room.clone())
        else {
            return;
        };
        let seats = self.registry.take_seats(session_id);
        if seats.is_empty() {
            return;
        }

        for seat in seats {
            if let Err(err) = self.rooms.release(&room, seat) {
                actions.push(
                    self.log(LogLevel::Error, format!("release of {room}/{seat} failed: {err}")),
                );
                continue;
            }
            self.registry.drop_seat(&room, seat);
            self.scheduler.discard_seat(&room, seat);
            actions.push(ServerAction::BroadcastToRoom {
                room: room.clone(),
                message: notice.message(&room, seat),
                exclude_session: None,
            });
        }

        match self.room_user_count(&room) {
            Ok(action) => actions.push(action),
            Err(err) => actions.push(self.log(LogLevel::Error, err.to_string())),
        }
    }

    fn set_identifier(
        &mut self,
        session_id: u64,
        id: &str,
        actions: &mut Vec<ServerAction>,
    ) {
        let current = self.registry.session(session_id).and_then(|info| info.identifier.as_deref());
        if current.is_some_and(|current| current != id) {
            // Held seats belong to the old identifier.
            self.release_session_seats(session_id, ReleaseNotice::Removed, actions);
        }

        self.registry.set_identifier(session_id, id);
        actions.push(ServerAction::SendToSession {
            session_id,
            message: ServerMessage::IdentifierAck { id: id.to_string() },
        });
        actions.push(self.log(LogLevel::Debug, format!("session {session_id} identified as {id}")));
    }

    fn join_room(
        &mut self,
        session_id: u64,
        room: &str,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        let identifier = self.identifier(session_id)?;
        let now = self.env.now();

        // Claim first: a full room must leave the session where it was.
        let outcome = self.rooms.claim(room, &identifier, now)?;
        let seat = outcome.seat();

        let previous_room = self.registry.session(session_id).and_then(|info| info.room.clone());
        if previous_room.as_deref().is_some_and(|previous| previous != room) {
            self.release_session_seats(session_id, ReleaseNotice::Removed, actions);
        }

        if let ClaimOutcome::Locked { displaced: Some(displaced), .. } = &outcome {
            self.registry.drop_seat(room, seat);
            self.scheduler.discard_seat(room, seat);
            actions.push(self.log(
                LogLevel::Debug,
                format!("expired lock of {displaced} on {room}/{seat} taken over"),
            ));
        }

        self.registry.move_to_room(session_id, room);
        self.registry.hold_seat(session_id, seat);

        actions.push(ServerAction::SendToSession {
            session_id,
            message: ServerMessage::SeatAssigned { seat },
        });
        actions.push(ServerAction::SendToSession {
            session_id,
            message: ServerMessage::SeatSnapshot {
                room: room.to_string(),
                seats: self.rooms.seat_snapshot(room)?,
            },
        });
        actions.push(self.room_user_count(room)?);
        actions.push(self.log(
            LogLevel::Debug,
            format!("session {session_id} ({identifier}) holds {room}/{seat}"),
        ));
        Ok(())
    }

    fn confirm_seat(
        &mut self,
        session_id: u64,
        room: &str,
        seat: SeatIndex,
        metadata: SeatMetadata,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        let identifier = self.identifier(session_id)?;
        self.ensure_holder(session_id, room, seat)?;

        let now = self.env.now();
        let newly_occupied =
            self.rooms.confirm(room, seat, &identifier, metadata.clone(), now)?;
        self.scheduler.enqueue_seat_update(room, seat, metadata);

        if newly_occupied {
            actions.push(self.room_user_count(room)?);
        }
        Ok(())
    }

    fn remove_seat(
        &mut self,
        session_id: u64,
        room: &str,
        seat: SeatIndex,
        purge_points: bool,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        self.ensure_holder(session_id, room, seat)?;

        self.rooms.release(room, seat)?;
        self.registry.drop_seat(room, seat);
        if purge_points {
            self.scheduler.discard_seat(room, seat);
        } else {
            self.scheduler.discard_seat_update(room, seat);
        }

        actions.push(ServerAction::BroadcastToRoom {
            room: room.to_string(),
            message: ServerMessage::SeatRemoved { room: room.to_string(), seat },
            exclude_session: None,
        });
        actions.push(self.room_user_count(room)?);
        Ok(())
    }

    fn chat(
        &mut self,
        room: &str,
        chat: ChatMessage,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        if !self.rooms.has_room(room) {
            return Err(RoomError::UnknownRoom(room.to_string()).into());
        }
        actions.push(ServerAction::BroadcastToRoom {
            room: room.to_string(),
            message: ServerMessage::Chat { room: room.to_string(), chat },
            exclude_session: None,
        });
        Ok(())
    }

    fn point_update(
        &mut self,
        session_id: u64,
        room: &str,
        seat: SeatIndex,
        point: Point,
    ) -> Result<(), DriverError> {
        self.ensure_holder(session_id, room, seat)?;
        self.rooms.record_point(room, seat, point)?;
        self.scheduler.enqueue_point(room, seat, point);
        Ok(())
    }

    fn private(
        &mut self,
        session_id: u64,
        target: String,
        image_url: String,
        message: String,
        sender: String,
        actions: &mut Vec<ServerAction>,
    ) {
        match self.registry.session_for_identifier(&target) {
            Some(recipient) => {
                actions.push(ServerAction::SendToSession {
                    session_id: recipient,
                    message: ServerMessage::Private {
                        image_url,
                        message,
                        timestamp: self.env.wall_clock_millis(),
                        sender,
                    },
                });
            },
            None => {
                actions.push(ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::PrivateFailed { target },
                });
            },
        }
    }

    fn reset_room(
        &mut self,
        session_id: u64,
        room: &str,
        actions: &mut Vec<ServerAction>,
    ) -> Result<(), DriverError> {
        let released = self.rooms.reset_room(room)?;
        for (seat, _) in &released {
            self.registry.drop_seat(room, *seat);
        }
        self.scheduler.discard_room(room);

        actions.push(ServerAction::BroadcastToRoom {
            room: room.to_string(),
            message: ServerMessage::RoomReset { room: room.to_string() },
            exclude_session: None,
        });
        actions.push(self.room_user_count(room)?);
        actions.push(self.log(
            LogLevel::Info,
            format!("{room} reset by session {session_id}, {} seats released", released.len()),
        ));
        Ok(())
    }

    /// Handle a connection closing.
    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        if !self.registry.has_session(session_id) {
            return vec![self.log(
                LogLevel::Debug,
                format!("close for unregistered connection {session_id}: {reason}"),
            )];
        }

        let mut actions = Vec::new();
        self.release_session_seats(session_id, ReleaseNotice::Disconnected, &mut actions);
        self.registry.unregister_session(session_id);

        actions.push(self.log(LogLevel::Debug, format!("connection {session_id} closed: {reason}")));
        actions
    }

    /// Flush buffered broadcasts, then release expired seat locks.
    fn handle_tick(&mut self) -> Vec<ServerAction> {
        let mut actions = Vec::new();

        let flushed = self.scheduler.flush_points().into_iter().chain(self.scheduler.flush_seat_updates());
        for (room, message) in flushed {
            actions.push(ServerAction::BroadcastToRoom { room, message, exclude_session: None });
        }

        let now = self.env.now();
        for expired in self.rooms.sweep_expired_locks(now) {
            self.registry.drop_seat(&expired.room, expired.seat);
            self.scheduler.discard_seat(&expired.room, expired.seat);
            actions.push(self.log(
                LogLevel::Info,
                format!("lock of {} on {}/{} expired", expired.holder, expired.room, expired.seat),
            ));
            actions.push(ServerAction::BroadcastToRoom {
                message: ServerMessage::SeatRemoved { room: expired.room.clone(), seat: expired.seat },
                room: expired.room,
                exclude_session: None,
            });
        }

        actions
    }

    /// Advance the rotating counter and announce it to everyone.
    fn handle_counter_tick(&mut self) -> Vec<ServerAction> {
        let number = self.counter.advance();
        vec![ServerAction::BroadcastAll { message: ServerMessage::CurrentNumber { number } }]
    }

    /// All sessions in a room.
    pub fn sessions_in_room(&self, room: &str) -> impl Iterator<Item = u64> + '_ {
        self.registry.sessions_in_room(room)
    }

    /// All connected sessions.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.registry.session_ids()
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Session registry (read-only).
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Seat tables (read-only).
    pub fn rooms(&self) -> &RoomManager<E::Instant> {
        &self.rooms
    }

    /// Pending tick-buffered broadcasts (read-only).
    pub fn scheduler(&self) -> &BroadcastScheduler {
        &self.scheduler
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E> std::fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("session_count", &self.registry.session_count())
            .field("rooms", &self.config.rooms)
            .finish_non_exhaustive()
    }
}
