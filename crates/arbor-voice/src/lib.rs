//! Voice signaling bridge for the Arbor multiplayer client.

pub mod bridge;

pub use bridge::{LinkState, PeerLink, VoiceBridge, VoiceEffect};
