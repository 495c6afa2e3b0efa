//! Inbound (client → server) messages.
//!
//! Clients send either a positional array whose first element is the event
//! tag, or a keyed object carrying the tag under `"type"`. Both forms decode
//! into the same [`ClientMessage`], and malformed shapes are rejected here,
//! before anything reaches the server core.

use serde_json::{Map, Value};

use crate::{
    errors::{ProtocolError, Result},
    seat::{Point, SeatIndex, SeatMetadata},
};

/// Chat line published to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender avatar image reference
    pub image_url: String,
    /// Sender display name
    pub username: String,
    /// Message text
    pub message: String,
    /// Color of the sender name
    pub username_color: String,
    /// Color of the message text
    pub text_color: String,
}

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `setIdTarget`: choose the identifier used for private addressing.
    SetIdentifier {
        /// Client-chosen identifier
        id: String,
    },

    /// `joinRoom`: claim a seat in a room.
    JoinRoom {
        /// Target room
        room: String,
    },

    /// `updateKursi` / `confirmSeat`: publish occupant metadata on a claimed
    /// seat.
    ConfirmSeat {
        /// Room of the seat
        room: String,
        /// Seat being confirmed
        seat: SeatIndex,
        /// Occupant metadata
        metadata: SeatMetadata,
    },

    /// `removeKursi`: give up a held seat.
    RemoveSeat {
        /// Room of the seat
        room: String,
        /// Seat being released
        seat: SeatIndex,
    },

    /// `removeKursiAndPoint`: give up a held seat and drop its pending
    /// pointer updates.
    RemoveSeatAndPoints {
        /// Room of the seat
        room: String,
        /// Seat being released
        seat: SeatIndex,
    },

    /// `chat`: room chat line.
    Chat {
        /// Target room
        room: String,
        /// Chat content
        chat: ChatMessage,
    },

    /// `pointUpdate`: pointer movement from a held seat.
    PointUpdate {
        /// Room of the seat
        room: String,
        /// Seat publishing the point
        seat: SeatIndex,
        /// Pointer position
        point: Point,
    },

    /// `private`: direct message to an identifier.
    Private {
        /// Recipient identifier
        target: String,
        /// Sender avatar image reference
        image_url: String,
        /// Message text
        message: String,
        /// Sender name as shown to the recipient
        sender: String,
    },

    /// `isUserOnline`: presence check for an identifier.
    IsUserOnline {
        /// Identifier to look up
        id: String,
    },

    /// `getAllRoomsUserCount`: occupancy of every room.
    AllRoomsUserCount,

    /// `getAllNumKursi`: occupied seat numbers of one room.
    OccupiedSeats {
        /// Room to list
        room: String,
    },

    /// `getCurrentNumber`: current value of the rotating counter.
    CurrentNumber,

    /// `resetRoom`: free every seat of a room.
    ResetRoom {
        /// Room to reset
        room: String,
    },

    /// `ping`: liveness probe.
    Ping,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let args = match value {
            Value::Array(items) => {
                let (tag, rest) = items.split_first().ok_or(ProtocolError::InvalidFormat)?;
                let event = tag.as_str().ok_or(ProtocolError::InvalidFormat)?;
                Args { event, source: Source::Positional(rest) }
            },
            Value::Object(map) => {
                let event =
                    map.get("type").and_then(Value::as_str).ok_or(ProtocolError::InvalidFormat)?;
                Args { event, source: Source::Keyed(map) }
            },
            _ => return Err(ProtocolError::InvalidFormat),
        };

        args.decode()
    }

    /// Canonical wire tag for this event.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SetIdentifier { .. } => "setIdTarget",
            Self::JoinRoom { .. } => "joinRoom",
            Self::ConfirmSeat { .. } => "updateKursi",
            Self::RemoveSeat { .. } => "removeKursi",
            Self::RemoveSeatAndPoints { .. } => "removeKursiAndPoint",
            Self::Chat { .. } => "chat",
            Self::PointUpdate { .. } => "pointUpdate",
            Self::Private { .. } => "private",
            Self::IsUserOnline { .. } => "isUserOnline",
            Self::AllRoomsUserCount => "getAllRoomsUserCount",
            Self::OccupiedSeats { .. } => "getAllNumKursi",
            Self::CurrentNumber => "getCurrentNumber",
            Self::ResetRoom { .. } => "resetRoom",
            Self::Ping => "ping",
        }
    }
}

/// Where arguments are read from: array position or object key.
enum Source<'a> {
    Positional(&'a [Value]),
    Keyed(&'a Map<String, Value>),
}

/// Argument accessor for one inbound frame.
///
/// Every accessor takes both the array position (counted after the tag) and
/// the object key, so each event is described once for both wire forms.
struct Args<'a> {
    event: &'a str,
    source: Source<'a>,
}

impl<'a> Args<'a> {
    fn decode(&self) -> Result<ClientMessage> {
        let message = match self.event {
            "setIdTarget" => ClientMessage::SetIdentifier { id: self.string(0, "id")? },
            "joinRoom" => ClientMessage::JoinRoom { room: self.string(0, "room")? },
            "updateKursi" | "confirmSeat" => ClientMessage::ConfirmSeat {
                room: self.string(0, "room")?,
                seat: self.seat(1)?,
                metadata: SeatMetadata {
                    image_url: self.optional_string(2, "noimageUrl")?,
                    display_name: self.string(3, "namauser")?,
                    color: self.optional_string(4, "color")?,
                    lower_item: self.optional_string(5, "itembawah")?,
                    upper_item: self.optional_string(6, "itematas")?,
                    vip: self.flag(7, "vip")?,
                    vip_badge: self.badge(8, "viptanda")?,
                },
            },
            "removeKursi" => {
                ClientMessage::RemoveSeat { room: self.string(0, "room")?, seat: self.seat(1)? }
            },
            "removeKursiAndPoint" => ClientMessage::RemoveSeatAndPoints {
                room: self.string(0, "room")?,
                seat: self.seat(1)?,
            },
            "chat" => ClientMessage::Chat {
                room: self.string(0, "room")?,
                chat: ChatMessage {
                    image_url: self.optional_string(1, "noImageUrl")?,
                    username: self.string(2, "username")?,
                    message: self.string(3, "message")?,
                    username_color: self.optional_string(4, "usernameColor")?,
                    text_color: self.optional_string(5, "chatTextColor")?,
                },
            },
            "pointUpdate" => ClientMessage::PointUpdate {
                room: self.string(0, "room")?,
                seat: self.seat(1)?,
                point: Point {
                    x: self.number(2, "x")?,
                    y: self.number(3, "y")?,
                    fast: self.flag(4, "fast")?,
                },
            },
            "private" => ClientMessage::Private {
                target: self.string(0, "idtarget")?,
                image_url: self.optional_string(1, "noimageUrl")?,
                message: self.string(2, "message")?,
                sender: self.string(3, "sender")?,
            },
            "isUserOnline" => ClientMessage::IsUserOnline { id: self.string(0, "id")? },
            "getAllRoomsUserCount" => ClientMessage::AllRoomsUserCount,
            "getAllNumKursi" => ClientMessage::OccupiedSeats { room: self.string(0, "room")? },
            "getCurrentNumber" => ClientMessage::CurrentNumber,
            "resetRoom" => ClientMessage::ResetRoom { room: self.string(0, "room")? },
            "ping" => ClientMessage::Ping,
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        Ok(message)
    }

    fn get(&self, position: usize, name: &'static str) -> Option<&'a Value> {
        let value = match self.source {
            Source::Positional(values) => values.get(position),
            Source::Keyed(map) => map.get(name),
        };
        value.filter(|v| !v.is_null())
    }

    fn required(&self, position: usize, name: &'static str) -> Result<&'a Value> {
        self.get(position, name)
            .ok_or_else(|| ProtocolError::MissingArgument { event: self.event.to_string(), name })
    }

    fn invalid(&self, name: &'static str, expected: &'static str) -> ProtocolError {
        ProtocolError::InvalidArgument { event: self.event.to_string(), name, expected }
    }

    fn string(&self, position: usize, name: &'static str) -> Result<String> {
        match self.required(position, name)? {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid(name, "a non-empty string")),
        }
    }

    fn optional_string(&self, position: usize, name: &'static str) -> Result<String> {
        match self.get(position, name) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(self.invalid(name, "a string")),
        }
    }

    fn seat(&self, position: usize) -> Result<SeatIndex> {
        let value = self.required(position, "seat")?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .and_then(|n| SeatIndex::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid("seat", "a positive integer"))
    }

    fn number(&self, position: usize, name: &'static str) -> Result<f64> {
        self.required(position, name)?
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| self.invalid(name, "a finite number"))
    }

    fn flag(&self, position: usize, name: &'static str) -> Result<bool> {
        match self.get(position, name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
            Some(_) => Err(self.invalid(name, "a boolean or number")),
        }
    }

    fn badge(&self, position: usize, name: &'static str) -> Result<u32> {
        match self.get(position, name) {
            None => Ok(0),
            Some(value) => value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| self.invalid(name, "a non-negative integer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_positional_join() {
        let msg = ClientMessage::decode(r#"["joinRoom", "room1"]"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { room: "room1".to_string() });
        assert_eq!(msg.tag(), "joinRoom");
    }

    #[test]
    fn decodes_keyed_join() {
        let msg = ClientMessage::decode(r#"{"type": "joinRoom", "room": "room2"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { room: "room2".to_string() });
    }

    #[test]
    fn confirm_seat_alias_normalizes_tag() {
        let msg = ClientMessage::decode(
            r#"["confirmSeat", "room1", 4, "img.png", "alice", "red", "hat", "shoes", 1, 3]"#,
        )
        .unwrap();

        let ClientMessage::ConfirmSeat { room, seat, metadata } = &msg else {
            panic!("expected ConfirmSeat, got {msg:?}");
        };
        assert_eq!(room, "room1");
        assert_eq!(*seat, 4);
        assert_eq!(metadata.display_name, "alice");
        assert_eq!(metadata.lower_item, "hat");
        assert_eq!(metadata.upper_item, "shoes");
        assert!(metadata.vip);
        assert_eq!(metadata.vip_badge, 3);
        assert_eq!(msg.tag(), "updateKursi");
    }

    #[test]
    fn confirm_seat_optional_fields_default() {
        let msg = ClientMessage::decode(r#"["updateKursi", "room1", 2, null, "bob"]"#).unwrap();
        let ClientMessage::ConfirmSeat { metadata, .. } = msg else {
            panic!("expected ConfirmSeat");
        };
        assert_eq!(metadata.image_url, "");
        assert!(!metadata.vip);
        assert_eq!(metadata.vip_badge, 0);
    }

    #[test]
    fn decodes_point_update() {
        let msg = ClientMessage::decode(r#"["pointUpdate", "room1", 7, 10.5, 20, true]"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PointUpdate {
                room: "room1".to_string(),
                seat: 7,
                point: Point { x: 10.5, y: 20.0, fast: true },
            }
        );
    }

    #[test]
    fn numeric_string_seat_is_accepted() {
        let msg = ClientMessage::decode(r#"["removeKursi", "room1", "12"]"#).unwrap();
        assert_eq!(msg, ClientMessage::RemoveSeat { room: "room1".to_string(), seat: 12 });
    }

    #[test]
    fn zero_seat_is_rejected() {
        let err = ClientMessage::decode(r#"["removeKursi", "room1", 0]"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument { name: "seat", .. }));
    }

    #[test]
    fn missing_argument_is_reported() {
        let err = ClientMessage::decode(r#"["joinRoom"]"#).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingArgument { event: "joinRoom".to_string(), name: "room" }
        );
    }

    #[test]
    fn unknown_event_is_reported() {
        let err = ClientMessage::decode(r#"["dance", 1]"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEvent("dance".to_string()));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(ClientMessage::decode("not json"), Err(ProtocolError::InvalidJson(_))));
        assert_eq!(ClientMessage::decode("[]"), Err(ProtocolError::InvalidFormat));
        assert_eq!(ClientMessage::decode("42"), Err(ProtocolError::InvalidFormat));
        assert_eq!(ClientMessage::decode("[1, 2]"), Err(ProtocolError::InvalidFormat));
        assert_eq!(ClientMessage::decode(r#"{"room": "x"}"#), Err(ProtocolError::InvalidFormat));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let err = ClientMessage::decode(r#"["pointUpdate", "room1", 1, "left", 2]"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument { name: "x", .. }));
    }

    #[test]
    fn decodes_private_message() {
        let msg = ClientMessage::decode(r#"["private", "bob", "a.png", "hi", "alice"]"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Private {
                target: "bob".to_string(),
                image_url: "a.png".to_string(),
                message: "hi".to_string(),
                sender: "alice".to_string(),
            }
        );
    }

    #[test]
    fn argument_free_events_decode() {
        assert_eq!(ClientMessage::decode(r#"["ping"]"#).unwrap(), ClientMessage::Ping);
        assert_eq!(
            ClientMessage::decode(r#"["getAllRoomsUserCount"]"#).unwrap(),
            ClientMessage::AllRoomsUserCount
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type": "getCurrentNumber"}"#).unwrap(),
            ClientMessage::CurrentNumber
        );
    }
}
