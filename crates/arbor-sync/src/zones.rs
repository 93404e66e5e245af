//! Vertical zone bands and the cross-world visibility rule.
//!
//! Zones are derived purely from the Y coordinate, so visibility is a pure
//! function of two current positions and is re-evaluated every frame. No
//! network traffic is involved.

use arbor_protocol::Vec3;

/// Y coordinate where the arena band begins.
pub const ARENA_MIN_Y: f32 = 256.0;

/// Y coordinate where the sky band begins.
pub const SKY_MIN_Y: f32 = 768.0;

/// Logical vertical band a participant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Ground-level world, below [`ARENA_MIN_Y`].
    Overworld,
    /// Mid-air arena, `ARENA_MIN_Y..SKY_MIN_Y`.
    Arena,
    /// Everything at and above [`SKY_MIN_Y`].
    Sky,
}

impl Zone {
    /// Maps a vertical coordinate to its zone band.
    pub fn from_y(y: f32) -> Self {
        if y < ARENA_MIN_Y {
            Zone::Overworld
        } else if y < SKY_MIN_Y {
            Zone::Arena
        } else {
            Zone::Sky
        }
    }

    /// Maps a position to its zone band.
    pub fn from_pos(pos: Vec3) -> Self {
        Self::from_y(pos.y)
    }
}

/// Whether a remote entity at `subject` should be visible to an observer at
/// `observer`. True exactly when both derive the same zone.
pub fn visible_to(observer: Vec3, subject: Vec3) -> bool {
    Zone::from_pos(observer) == Zone::from_pos(subject)
}
