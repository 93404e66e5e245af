//! Identifier newtypes and the shared wire vector type.
//!
//! All connection-scoped identifiers are opaque strings assigned by the
//! server. Wrapping them in newtypes keeps participant ids, zone names, and
//! voice peer addresses from being mixed up in map keys and message fields.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParticipantId
// ---------------------------------------------------------------------------

/// Stable identifier for one connected participant. Assigned by the server
/// when the connection is accepted; valid only for the lifetime of that
/// connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Wraps a raw server-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fallback display name when the participant never announced one:
    /// `Player_<first 4 chars of the id>`.
    pub fn default_display_name(&self) -> String {
        let short: String = self.0.chars().take(4).collect();
        format!("Player_{short}")
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ZoneId
// ---------------------------------------------------------------------------

/// Name of a joinable zone (a server-side room/world). The default zone is
/// used for legacy joins and as the fallback when a requested zone is
/// rejected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(pub String);

impl ZoneId {
    /// Wraps a zone name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The default zone every client can always join.
    pub fn default_zone() -> Self {
        Self("overworld".to_string())
    }

    /// Returns the raw zone name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PeerAddr
// ---------------------------------------------------------------------------

/// Address of a voice-chat peer endpoint, exchanged over the reliable
/// channel during voice signaling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddr(pub String);

impl PeerAddr {
    /// Wraps a raw peer address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Derives the local peer address from a participant id. The transport
    /// forbids punctuation in peer addresses, so non-alphanumeric characters
    /// are stripped.
    pub fn derive(id: &ParticipantId) -> Self {
        let safe: String = id.0.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        Self(format!("vc_{safe}"))
    }

    /// Returns the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

/// Position or velocity in world units. Shared between the wire protocol and
/// the sync core.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component (vertical).
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// Constructs a vector from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise linear interpolation with `t` in `[0, 1]`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance to `other` in the horizontal (XZ) plane.
    pub fn horizontal_distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
