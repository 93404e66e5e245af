//! Transport layer for the Arbor multiplayer client.
//!
//! Length-prefixed frames over TCP, a sans-IO connection/join state
//! machine, indefinite backoff reconnection, and a tokio driver that
//! bridges the socket to the single-threaded game loop via channels.

pub mod client;
pub mod connection;
pub mod framing;
pub mod reconnect;

pub use client::{NetClient, NetEvent};
pub use connection::{
    ConnectionManager, ConnectionNotice, JoinConfig, NetEffect, zone_from_path,
};
pub use framing::{FrameError, MAX_PAYLOAD_BYTES, read_frame, write_frame};
pub use reconnect::{Backoff, BackoffConfig};
