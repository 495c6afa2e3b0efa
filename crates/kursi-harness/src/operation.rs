//! Operations for randomized testing.
//!
//! Operations represent the client-visible actions of the system. They are
//! generated by proptest or a fuzzer, applied to a [`SimServer`], and the
//! invariants are checked after each one. Values are kept small so random
//! sequences collide on rooms, seats and identifiers often.

use std::time::Duration;

use arbitrary::Arbitrary;
use kursi_proto::{ChatMessage, ClientMessage, Point, SeatMetadata};
use kursi_server::DriverError;

use crate::SimServer;

/// Client slot, mapped onto the open sessions in ID order.
pub type ClientSlot = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Open a new connection.
    Connect,

    /// Close a connection from the client side.
    Disconnect {
        /// Client closing.
        client: ClientSlot,
    },

    /// Set a client's identifier to `user{name}`.
    SetIdentifier {
        /// Client identifying.
        client: ClientSlot,
        /// Identifier suffix.
        name: u8,
    },

    /// Join `room{room}`.
    JoinRoom {
        /// Client joining.
        client: ClientSlot,
        /// Room suffix, possibly out of the configured set.
        room: u8,
    },

    /// Confirm the client's held seat, or `seat` if it holds none.
    Confirm {
        /// Client confirming.
        client: ClientSlot,
        /// Fallback seat.
        seat: u8,
    },

    /// Release the client's held seat, or `seat` if it holds none.
    Remove {
        /// Client releasing.
        client: ClientSlot,
        /// Fallback seat.
        seat: u8,
        /// Also purge pending points.
        purge_points: bool,
    },

    /// Send a point for the client's held seat.
    PointUpdate {
        /// Client moving.
        client: ClientSlot,
        /// Horizontal position.
        x: i16,
        /// Vertical position.
        y: i16,
    },

    /// Chat in the client's current room.
    Chat {
        /// Client talking.
        client: ClientSlot,
    },

    /// Private message to `user{target}`.
    Private {
        /// Sender.
        client: ClientSlot,
        /// Target identifier suffix.
        target: u8,
    },

    /// Reset `room{room}`.
    ResetRoom {
        /// Client asking.
        client: ClientSlot,
        /// Room suffix.
        room: u8,
    },

    /// Run one fast tick.
    Tick,

    /// Advance simulation time, then tick.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Run one counter tick.
    CounterTick,
}

impl Operation {
    /// Apply to a simulation server.
    ///
    /// Operations naming a client when no session is open are no-ops.
    pub fn apply(&self, server: &mut SimServer) -> Result<(), DriverError> {
        match *self {
            Self::Connect => server.connect().map(|_| ()),
            Self::Disconnect { client } => match session(server, client) {
                Some(id) => server.disconnect(id),
                None => Ok(()),
            },
            Self::SetIdentifier { client, name } => {
                let target = session(server, client);
                let message = ClientMessage::SetIdentifier { id: format!("user{}", name % 8) };
                send(server, target, message)
            },
            Self::JoinRoom { client, room } => {
                let target = session(server, client);
                let message = ClientMessage::JoinRoom { room: format!("room{}", room % 4) };
                send(server, target, message)
            },
            Self::Confirm { client, seat } => {
                let Some(id) = session(server, client) else { return Ok(()) };
                let (room, seat) = held_seat(server, id, seat);
                let metadata = SeatMetadata {
                    display_name: format!("session{id}"),
                    ..SeatMetadata::empty()
                };
                send(server, Some(id), ClientMessage::ConfirmSeat { room, seat, metadata })
            },
            Self::Remove { client, seat, purge_points } => {
                let Some(id) = session(server, client) else { return Ok(()) };
                let (room, seat) = held_seat(server, id, seat);
                let message = if purge_points {
                    ClientMessage::RemoveSeatAndPoints { room, seat }
                } else {
                    ClientMessage::RemoveSeat { room, seat }
                };
                send(server, Some(id), message)
            },
            Self::PointUpdate { client, x, y } => {
                let Some(id) = session(server, client) else { return Ok(()) };
                let (room, seat) = held_seat(server, id, 1);
                let point = Point { x: f64::from(x), y: f64::from(y), fast: x % 2 == 0 };
                send(server, Some(id), ClientMessage::PointUpdate { room, seat, point })
            },
            Self::Chat { client } => {
                let Some(id) = session(server, client) else { return Ok(()) };
                let (room, _) = held_seat(server, id, 1);
                let chat = ChatMessage {
                    image_url: String::new(),
                    username: format!("session{id}"),
                    message: "hello".to_string(),
                    username_color: String::new(),
                    text_color: String::new(),
                };
                send(server, Some(id), ClientMessage::Chat { room, chat })
            },
            Self::Private { client, target } => {
                let from = session(server, client);
                let message = ClientMessage::Private {
                    target: format!("user{}", target % 8),
                    image_url: String::new(),
                    message: "psst".to_string(),
                    sender: "sim".to_string(),
                };
                send(server, from, message)
            },
            Self::ResetRoom { client, room } => {
                let target = session(server, client);
                let message = ClientMessage::ResetRoom { room: format!("room{}", room % 4) };
                send(server, target, message)
            },
            Self::Tick => server.tick(),
            Self::AdvanceTime { millis } => {
                server.advance_and_tick(Duration::from_millis(u64::from(millis)))
            },
            Self::CounterTick => server.counter_tick(),
        }
    }
}

/// Open session for a client slot.
fn session(server: &SimServer, client: ClientSlot) -> Option<u64> {
    let open = server.open_sessions();
    (!open.is_empty()).then(|| open[client as usize % open.len()])
}

fn send(
    server: &mut SimServer,
    session: Option<u64>,
    message: ClientMessage,
) -> Result<(), DriverError> {
    match session {
        Some(id) => server.send(id, message),
        None => Ok(()),
    }
}

/// The session's room and first held seat, falling back to `room1` and the
/// given seat number.
fn held_seat(server: &SimServer, session_id: u64, fallback: u8) -> (String, u32) {
    let info = server.driver().registry().session(session_id);
    let room = info.and_then(|i| i.room.clone()).unwrap_or_else(|| "room1".to_string());
    let seat = info
        .and_then(|i| i.seats.first().copied())
        .unwrap_or(u32::from(fallback % 8) + 1);
    (room, seat)
}
