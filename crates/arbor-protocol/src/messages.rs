//! Message catalog and versioned binary encoding.
//!
//! Two top-level enums carry the whole protocol: [`ClientMessage`] for
//! everything the local client sends, [`ServerMessage`] for everything the
//! server delivers. Both are serialized with [`postcard`] behind a single
//! protocol version byte; use [`encode_client`] / [`decode_server`] (and
//! their mirrors) at the transport boundary.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::ids::{ParticipantId, PeerAddr, Vec3, ZoneId};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Message sent by the local client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Join a zone (room/world). First message after the transport opens,
    /// and re-sent after every transport-level reconnect.
    JoinZone(JoinZone),
    /// Local transform + flags broadcast.
    PlayerMove(PlayerMove),
    /// Local world edit.
    BlockChange(BlockChange),
    /// Non-player entity spawned locally.
    EntitySpawn(EntityEvent),
    /// Non-player entity state changed locally.
    EntityUpdate(EntityEvent),
    /// Held tool/item changed.
    HeldItem(HeldItem),
    /// Shirt color changed.
    PlayerColor(PlayerColor),
    /// Damage dealt to another participant.
    Damage(Damage),
    /// Local player died.
    Death,
    /// One-shot animation/action trigger.
    Action(PlayerAction),
    /// Chat line.
    Chat(Chat),
    /// Speech-bubble text.
    Speech(Speech),
    /// Ball physics state; only the current ball holder may send this.
    BallState(BallState),
    /// Discrete kick feedback event.
    BallKick,
    /// A goal was scored; carries the scorer's view of the score.
    Goal(Goal),
    /// Match finished.
    GameOver(GameOver),
    /// Match reset to initial state.
    GameReset,
    /// Ball teleported back to its spawn.
    BallReset(BallReset),
    /// Ask the server to make us the ball holder.
    RequestHost,
    /// Voluntarily give up the ball holder role.
    ReleaseHost,
    /// Announce our voice peer address.
    PeerAddress(PeerAddress),
    /// Request a world wipe.
    WorldReset,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Message delivered by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Join acknowledged; carries a snapshot of existing participants.
    Joined(Joined),
    /// Join rejected (zone missing or access denied).
    JoinError(JoinError),
    /// Remote participant transform + flags.
    PlayerMove(RemoteMove),
    /// A participant joined the zone.
    PlayerJoined(PlayerJoined),
    /// A participant disconnected.
    PlayerLeft(PlayerLeft),
    /// Remote world edit.
    BlockChange(BlockChange),
    /// Remote non-player entity spawned.
    EntitySpawn(RemoteEntityEvent),
    /// Remote non-player entity updated.
    EntityUpdate(RemoteEntityEvent),
    /// Remote held-item change.
    HeldItem(RemoteHeldItem),
    /// Remote shirt-color change.
    PlayerColor(RemotePlayerColor),
    /// Damage event (either targeting us or visible on another player).
    Damage(RemoteDamage),
    /// A remote participant died.
    Death(RemoteDeath),
    /// Remote one-shot action trigger.
    Action(RemoteAction),
    /// Remote chat line.
    Chat(RemoteChat),
    /// Remote speech-bubble text.
    Speech(RemoteSpeech),
    /// Ball physics state from the current holder.
    BallState(RemoteBallState),
    /// Discrete kick feedback from any participant.
    BallKick(RemoteBallKick),
    /// Goal event; scores are authoritative only when the sender holds
    /// the ball.
    Goal(RemoteGoal),
    /// Match finished.
    GameOver(GameOver),
    /// Match reset.
    GameReset,
    /// Ball teleported back to its spawn.
    BallReset(BallReset),
    /// Ball holder changed; `holder` is `None` when the role is vacant.
    HostAssigned(HostAssigned),
    /// A peer announced its voice address.
    PeerAddress(RemotePeerAddress),
    /// The world was wiped.
    WorldReset(WorldReset),
}

// ---------------------------------------------------------------------------
// Join handshake payloads
// ---------------------------------------------------------------------------

/// Zone join request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinZone {
    /// Requested zone; `None` asks for the legacy/default join.
    pub zone: Option<ZoneId>,
    /// Display name to announce.
    pub name: String,
    /// Shirt color as packed RGB, if customized.
    pub shirt_color: Option<u32>,
    /// Persistent account id, if logged in.
    pub user_id: Option<String>,
}

/// Join acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Joined {
    /// Server-side room instance id.
    pub room_id: String,
    /// Zone actually joined (may differ from the request after fallback).
    pub zone: ZoneId,
    /// Our connection-scoped participant id.
    pub self_id: ParticipantId,
    /// Permission flags granted in this zone.
    pub can_edit: bool,
    /// States of participants already present.
    pub player_states: Vec<PlayerState>,
    /// Server wall-clock milliseconds at join time.
    pub time_ms: f64,
}

/// Reason a join was rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JoinErrorKind {
    /// The requested zone does not exist.
    ZoneNotFound,
    /// The requester is not allowed into the zone.
    AccessDenied,
}

/// Join rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinError {
    /// Machine-readable reason.
    pub kind: JoinErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Full state of one participant, delivered inside [`Joined`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerState {
    /// Participant id.
    pub id: ParticipantId,
    /// Display name, if announced.
    pub name: Option<String>,
    /// Position in world units.
    pub pos: Vec3,
    /// Yaw in radians.
    pub rot_y: f32,
    /// Crouching flag.
    pub is_crouching: bool,
    /// Flying flag.
    pub is_flying: bool,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Shirt color as packed RGB.
    pub shirt_color: Option<u32>,
    /// Held item type, if any.
    pub held_item: Option<String>,
}

// ---------------------------------------------------------------------------
// Movement payloads
// ---------------------------------------------------------------------------

/// Outbound local transform broadcast. Safe to resend redundantly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerMove {
    /// Position in world units.
    pub pos: Vec3,
    /// Yaw in radians; `None` lets receivers infer facing from displacement.
    pub rot_y: Option<f32>,
    /// Display name (repeated so late joiners pick it up).
    pub name: String,
    /// Crouching flag.
    pub is_crouching: bool,
    /// Flying flag.
    pub is_flying: bool,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Shirt color as packed RGB.
    pub shirt_color: Option<u32>,
}

/// Inbound remote transform update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteMove {
    /// Originating participant.
    pub id: ParticipantId,
    /// Position in world units.
    pub pos: Vec3,
    /// Yaw in radians, if the sender included one.
    pub rot_y: Option<f32>,
    /// Display name, if the sender included one.
    pub name: Option<String>,
    /// Crouching flag.
    pub is_crouching: bool,
    /// Flying flag.
    pub is_flying: bool,
    /// Current health, if included.
    pub health: Option<f32>,
    /// Maximum health, if included.
    pub max_health: Option<f32>,
    /// Shirt color as packed RGB, if included.
    pub shirt_color: Option<u32>,
}

// ---------------------------------------------------------------------------
// Lifecycle payloads
// ---------------------------------------------------------------------------

/// A participant joined the zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerJoined {
    /// The new participant.
    pub id: ParticipantId,
    /// Display name, if announced at join time.
    pub name: Option<String>,
}

/// A participant disconnected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerLeft {
    /// The departed participant.
    pub id: ParticipantId,
}

// ---------------------------------------------------------------------------
// World / entity payloads
// ---------------------------------------------------------------------------

/// A single voxel edit. `kind` 0 means air (removal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockChange {
    /// Block X coordinate.
    pub x: i32,
    /// Block Y coordinate.
    pub y: i32,
    /// Block Z coordinate.
    pub z: i32,
    /// Block type id; 0 removes the block.
    pub kind: u16,
}

/// Opaque non-player entity event. The payload format is owned by the
/// entity registries, not by this core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityEvent {
    /// Entity identifier.
    pub entity_id: String,
    /// Entity kind tag.
    pub kind: String,
    /// Registry-defined payload bytes.
    pub payload: Vec<u8>,
}

/// [`EntityEvent`] with the originating participant attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteEntityEvent {
    /// Originating participant.
    pub id: ParticipantId,
    /// The event itself.
    pub event: EntityEvent,
}

// ---------------------------------------------------------------------------
// Appearance / combat payloads
// ---------------------------------------------------------------------------

/// Held tool/item changed. `item` of `None` empties the hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeldItem {
    /// Item type tag, e.g. `"pickaxe"`.
    pub item: Option<String>,
}

/// Remote held-item change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteHeldItem {
    /// Originating participant.
    pub id: ParticipantId,
    /// New held item, if any.
    pub item: Option<String>,
}

/// Shirt color change (packed RGB).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerColor {
    /// Packed RGB color.
    pub shirt_color: u32,
}

/// Remote shirt-color change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemotePlayerColor {
    /// Originating participant.
    pub id: ParticipantId,
    /// Packed RGB color.
    pub shirt_color: u32,
}

/// Damage dealt to a target participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Damage {
    /// The participant being hit.
    pub target: ParticipantId,
    /// Damage amount.
    pub amount: f32,
}

/// Inbound damage event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteDamage {
    /// The attacker.
    pub from: ParticipantId,
    /// The participant being hit.
    pub target: ParticipantId,
    /// Damage amount.
    pub amount: f32,
}

/// A remote participant died.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteDeath {
    /// The participant that died.
    pub id: ParticipantId,
}

/// One-shot animation/action trigger, e.g. `"wave"` or `"swing"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerAction {
    /// Action tag.
    pub action: String,
}

/// Remote one-shot action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteAction {
    /// Originating participant.
    pub id: ParticipantId,
    /// Action tag.
    pub action: String,
}

// ---------------------------------------------------------------------------
// Chat payloads
// ---------------------------------------------------------------------------

/// Chat line. Unlike movement, never safe to resend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    /// Sender display name.
    pub name: String,
    /// Message text.
    pub text: String,
}

/// Remote chat line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteChat {
    /// Originating participant.
    pub id: ParticipantId,
    /// Sender display name.
    pub name: String,
    /// Message text.
    pub text: String,
}

/// Speech-bubble text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Speech {
    /// Bubble text.
    pub text: String,
}

/// Remote speech-bubble text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSpeech {
    /// Originating participant.
    pub id: ParticipantId,
    /// Bubble text.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Shared ball payloads
// ---------------------------------------------------------------------------

/// Ball physics state published by the current holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BallState {
    /// Ball position in world units.
    pub pos: Vec3,
    /// Ball velocity in world units per second.
    pub vel: Vec3,
}

/// Inbound ball physics state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteBallState {
    /// The publisher (should match the current holder).
    pub id: ParticipantId,
    /// Ball position.
    pub pos: Vec3,
    /// Ball velocity.
    pub vel: Vec3,
}

/// Inbound kick feedback event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteBallKick {
    /// The kicker.
    pub id: ParticipantId,
}

/// Which side of the pitch scored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GoalSide {
    /// Left goal.
    Left,
    /// Right goal.
    Right,
}

/// Goal event with the sender's view of the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    /// Side that scored.
    pub side: GoalSide,
    /// Left-side total after the goal.
    pub score_left: u32,
    /// Right-side total after the goal.
    pub score_right: u32,
}

/// Inbound goal event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteGoal {
    /// Originating participant.
    pub id: ParticipantId,
    /// The goal itself.
    pub goal: Goal,
}

/// Match finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOver {
    /// Winning side.
    pub winner: GoalSide,
    /// Final left-side score.
    pub score_left: u32,
    /// Final right-side score.
    pub score_right: u32,
}

/// Ball teleported back to a spawn position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BallReset {
    /// Spawn position.
    pub pos: Vec3,
}

/// Ball holder changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostAssigned {
    /// Current holder; `None` when the role is vacant.
    pub holder: Option<ParticipantId>,
}

// ---------------------------------------------------------------------------
// Voice / world payloads
// ---------------------------------------------------------------------------

/// Voice peer address announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerAddress {
    /// Our voice peer address.
    pub addr: PeerAddr,
}

/// Remote voice peer address announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemotePeerAddress {
    /// The announcing participant.
    pub id: ParticipantId,
    /// Their voice peer address.
    pub addr: PeerAddr,
}

/// World wipe notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldReset {
    /// `true` on the client that requested the wipe.
    pub is_initiator: bool,
    /// Server wall-clock milliseconds of the wipe.
    pub time_ms: f64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while decoding a wire payload.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload was empty (no version byte).
    #[error("empty payload: missing version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("malformed payload: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, WireError> {
    let Some((&version, body)) = data.split_first() else {
        return Err(WireError::EmptyPayload);
    };
    if version != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

/// Serializes a [`ClientMessage`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded message]`.
pub fn encode_client(msg: &ClientMessage) -> Result<Vec<u8>, postcard::Error> {
    encode(msg)
}

/// Deserializes a versioned payload into a [`ClientMessage`].
pub fn decode_client(data: &[u8]) -> Result<ClientMessage, WireError> {
    decode(data)
}

/// Serializes a [`ServerMessage`] into a versioned binary payload.
pub fn encode_server(msg: &ServerMessage) -> Result<Vec<u8>, postcard::Error> {
    encode(msg)
}

/// Deserializes a versioned payload into a [`ServerMessage`].
pub fn decode_server(data: &[u8]) -> Result<ServerMessage, WireError> {
    decode(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
