//! Configuration for the Arbor multiplayer client: RON-backed settings
//! with per-section serde defaults.

pub mod config;
pub mod error;

pub use config::{Config, DebugConfig, NetworkConfig, PlayerConfig, VoiceConfig};
pub use error::ConfigError;
