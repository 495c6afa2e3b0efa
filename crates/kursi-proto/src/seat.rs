//! Seat payload types shared by inbound and outbound messages.

use serde::{Deserialize, Serialize};

/// Seat number inside a room, starting at 1.
pub type SeatIndex = u32;

/// Occupant metadata published on a seat.
///
/// Serialized with the field names clients already use, so a batch update
/// carries `{"noimageUrl": ..., "namauser": ..., ...}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMetadata {
    /// Avatar image reference
    #[serde(rename = "noimageUrl")]
    pub image_url: String,
    /// Display name. Non-empty for every occupied seat.
    #[serde(rename = "namauser")]
    pub display_name: String,
    /// Name color
    pub color: String,
    /// Lower decoration item
    #[serde(rename = "itembawah")]
    pub lower_item: String,
    /// Upper decoration item
    #[serde(rename = "itematas")]
    pub upper_item: String,
    /// VIP flag
    pub vip: bool,
    /// VIP badge level
    #[serde(rename = "viptanda")]
    pub vip_badge: u32,
}

impl SeatMetadata {
    /// Metadata of a free seat.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this metadata marks the seat as occupied.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty()
    }
}

/// A pointer position published from a seat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Whether the client animates this move at high speed
    pub fast: bool,
}
