//! Kursi wire protocol.
//!
//! Every frame on the wire is a JSON text message. Inbound frames are decoded
//! into a validated [`ClientMessage`] at the boundary so the server core never
//! branches on raw array indices; outbound frames are built from
//! [`ServerMessage`] and encoded as positional JSON arrays.
//!
//! # Wire Shapes
//!
//! ```text
//! inbound:  ["joinRoom", "room1"]
//!           {"type": "joinRoom", "room": "room1"}
//! outbound: ["numberKursiSaya", 3]
//!           ["kursiBatchUpdate", "room1", [[3, {"namauser": "alice", ...}]]]
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod errors;
mod seat;
mod server;

pub use client::{ChatMessage, ClientMessage};
pub use errors::{ProtocolError, Result};
pub use seat::{Point, SeatIndex, SeatMetadata};
pub use server::ServerMessage;
