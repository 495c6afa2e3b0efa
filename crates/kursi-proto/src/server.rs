//! Outbound (server → client) messages.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::{
    client::ChatMessage,
    errors::{ProtocolError, Result},
    seat::{Point, SeatIndex, SeatMetadata},
};

/// A message sent from the server to one or more sessions.
///
/// Every variant encodes as a positional JSON array whose first element is
/// the wire tag returned by [`ServerMessage::tag`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Identifier accepted.
    IdentifierAck {
        /// Identifier now bound to the session
        id: String,
    },

    /// Seat claimed for the joining session.
    SeatAssigned {
        /// Claimed seat
        seat: SeatIndex,
    },

    /// Occupied seats of a room, sent to a joiner.
    SeatSnapshot {
        /// Room being joined
        room: String,
        /// Occupied seats with their metadata, ascending by seat
        seats: Vec<(SeatIndex, SeatMetadata)>,
    },

    /// Occupancy of one room.
    RoomUserCount {
        /// Room
        room: String,
        /// Occupied seats
        count: usize,
    },

    /// No free seat was available.
    RoomFull {
        /// Room that was full
        room: String,
    },

    /// Batched seat metadata changes since the previous flush.
    SeatBatchUpdate {
        /// Room
        room: String,
        /// Latest metadata per touched seat, ascending by seat
        updates: Vec<(SeatIndex, SeatMetadata)>,
    },

    /// One buffered pointer update.
    PointUpdated {
        /// Room
        room: String,
        /// Publishing seat
        seat: SeatIndex,
        /// Pointer position
        point: Point,
    },

    /// Seat released by removal, room switch, reset or lock expiry.
    SeatRemoved {
        /// Room
        room: String,
        /// Released seat
        seat: SeatIndex,
    },

    /// Seat released because its holder disconnected.
    UserDisconnected {
        /// Room
        room: String,
        /// Released seat
        seat: SeatIndex,
    },

    /// Room chat line.
    Chat {
        /// Room
        room: String,
        /// Chat content
        chat: ChatMessage,
    },

    /// Direct message delivered to its recipient.
    Private {
        /// Sender avatar image reference
        image_url: String,
        /// Message text
        message: String,
        /// Server wall-clock time in Unix milliseconds
        timestamp: u64,
        /// Sender name
        sender: String,
    },

    /// Direct message had no connected recipient.
    PrivateFailed {
        /// Identifier that was not online
        target: String,
    },

    /// Answer to a presence check.
    UserOnlineStatus {
        /// Identifier checked
        id: String,
        /// Whether a connected session carries the identifier
        online: bool,
    },

    /// Occupancy of every configured room.
    AllRoomsUserCount {
        /// Occupied seats per room
        counts: BTreeMap<String, usize>,
    },

    /// Occupied seat numbers of one room.
    OccupiedSeats {
        /// Room
        room: String,
        /// Occupied seats, ascending
        seats: Vec<SeatIndex>,
    },

    /// Value of the rotating counter.
    CurrentNumber {
        /// Counter value
        number: u32,
    },

    /// Every seat of a room was freed.
    RoomReset {
        /// Room
        room: String,
    },

    /// Reply to `ping`.
    Pong,

    /// Local error reply. The session stays open.
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl ServerMessage {
    /// Build an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::IdentifierAck { .. } => "setIdTargetAck",
            Self::SeatAssigned { .. } => "numberKursiSaya",
            Self::SeatSnapshot { .. } => "allUpdateKursiList",
            Self::RoomUserCount { .. } => "roomUserCount",
            Self::RoomFull { .. } => "roomFull",
            Self::SeatBatchUpdate { .. } => "kursiBatchUpdate",
            Self::PointUpdated { .. } => "pointUpdated",
            Self::SeatRemoved { .. } => "removeKursi",
            Self::UserDisconnected { .. } => "userDisconnected",
            Self::Chat { .. } => "chat",
            Self::Private { .. } => "private",
            Self::PrivateFailed { .. } => "privateFailed",
            Self::UserOnlineStatus { .. } => "userOnlineStatus",
            Self::AllRoomsUserCount { .. } => "allRoomsUserCount",
            Self::OccupiedSeats { .. } => "numKursiList",
            Self::CurrentNumber { .. } => "currentNumber",
            Self::RoomReset { .. } => "resetRoom",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
        }
    }

    /// Encode into a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        let tag = self.tag();
        let value = match self {
            Self::IdentifierAck { id } => json!([tag, id]),
            Self::SeatAssigned { seat } => json!([tag, seat]),
            Self::SeatSnapshot { room, seats: entries }
            | Self::SeatBatchUpdate { room, updates: entries } => {
                json!([tag, room, seat_entries(entries)?])
            },
            Self::RoomUserCount { room, count } => json!([tag, room, count]),
            Self::RoomFull { room } | Self::RoomReset { room } => json!([tag, room]),
            Self::PointUpdated { room, seat, point } => {
                json!([tag, room, seat, point.x, point.y, point.fast])
            },
            Self::SeatRemoved { room, seat } | Self::UserDisconnected { room, seat } => {
                json!([tag, room, seat])
            },
            Self::Chat { room, chat } => json!([
                tag,
                room,
                chat.image_url,
                chat.username,
                chat.message,
                chat.username_color,
                chat.text_color
            ]),
            Self::Private { image_url, message, timestamp, sender } => {
                json!([tag, image_url, message, timestamp, sender])
            },
            Self::PrivateFailed { target } => json!([tag, target, "User not online"]),
            Self::UserOnlineStatus { id, online } => json!([tag, id, online]),
            Self::AllRoomsUserCount { counts } => json!([tag, counts]),
            Self::OccupiedSeats { room, seats } => json!([tag, room, seats]),
            Self::CurrentNumber { number } => json!([tag, number]),
            Self::Pong => json!([tag]),
            Self::Error { message } => json!([tag, message]),
        };

        Ok(value)
    }

    /// Encode into a compact JSON text frame.
    pub fn encode(&self) -> Result<String> {
        let value = self.to_value()?;
        serde_json::to_string(&value).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

fn seat_entries(entries: &[(SeatIndex, SeatMetadata)]) -> Result<Value> {
    entries
        .iter()
        .map(|(seat, metadata)| {
            let metadata =
                serde_json::to_value(metadata).map_err(|e| ProtocolError::Encode(e.to_string()))?;
            Ok(json!([seat, metadata]))
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}
