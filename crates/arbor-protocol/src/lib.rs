//! Wire protocol for the Arbor multiplayer client: typed message catalog,
//! identifier newtypes, and versioned binary encoding.

pub mod ids;
pub mod messages;

pub use ids::{ParticipantId, PeerAddr, Vec3, ZoneId};
pub use messages::{
    ClientMessage, ServerMessage, WireError, decode_client, decode_server, encode_client,
    encode_server,
};
