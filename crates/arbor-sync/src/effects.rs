//! Effects emitted by the sync core.
//!
//! Handlers never touch meshes, audio, or the transport directly. They
//! mutate core state and return [`Effect`] values; the host application
//! drains the list and performs the side effects. This keeps every handler
//! testable without a live connection or a renderer.

use arbor_protocol::messages::{EntityEvent, GoalSide};
use arbor_protocol::{ParticipantId, PeerAddr, Vec3, ZoneId};

/// A side effect requested by the sync core.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create the visual representation for a newly seen participant. The
    /// host must call back into the registry once the visual exists.
    CreateVisual {
        /// Participant to build a visual for.
        id: ParticipantId,
        /// Display name to label it with.
        name: String,
    },
    /// Destroy a participant's visual and release its resources.
    RemoveVisual {
        /// Departed participant.
        id: ParticipantId,
    },
    /// Swap the item shown in a participant's hand. `None` empties it.
    SetHeldItem {
        /// Owning participant.
        id: ParticipantId,
        /// New item tag.
        item: Option<String>,
    },
    /// Re-tint a participant's shirt.
    SetShirtColor {
        /// Owning participant.
        id: ParticipantId,
        /// Packed RGB color.
        color: u32,
    },
    /// Update a participant's health indicator.
    SetHealth {
        /// Owning participant.
        id: ParticipantId,
        /// Current health.
        health: f32,
        /// Maximum health.
        max_health: f32,
    },
    /// Play a one-shot action animation.
    PlayAction {
        /// Acting participant.
        id: ParticipantId,
        /// Action tag.
        action: String,
    },
    /// Begin a participant's death animation. Position ingestion for the
    /// record is suspended until the host clears the dying state.
    StartDeath {
        /// Dying participant.
        id: ParticipantId,
    },
    /// We took damage from another participant.
    LocalDamage {
        /// The attacker.
        from: ParticipantId,
        /// Damage amount.
        amount: f32,
    },
    /// Apply a remote voxel edit to the world.
    ApplyBlockChange {
        /// Block X coordinate.
        x: i32,
        /// Block Y coordinate.
        y: i32,
        /// Block Z coordinate.
        z: i32,
        /// Block type id; 0 removes.
        kind: u16,
    },
    /// Spawn a remote non-player entity from an opaque payload.
    SpawnEntity {
        /// Originating participant.
        id: ParticipantId,
        /// The opaque event.
        event: EntityEvent,
    },
    /// Update a remote non-player entity from an opaque payload.
    UpdateEntity {
        /// Originating participant.
        id: ParticipantId,
        /// The opaque event.
        event: EntityEvent,
    },
    /// Show a chat line.
    ShowChat {
        /// Originating participant.
        id: ParticipantId,
        /// Sender display name.
        name: String,
        /// Message text.
        text: String,
    },
    /// Show a speech bubble over a participant.
    ShowSpeech {
        /// Originating participant.
        id: ParticipantId,
        /// Bubble text.
        text: String,
    },
    /// Snap the shared ball to the holder's published state. Applied
    /// directly; the ball is re-simulated locally each tick regardless.
    BallSnap {
        /// Ball position.
        pos: Vec3,
        /// Ball velocity.
        vel: Vec3,
    },
    /// Play kick feedback (sound/particles) for a participant.
    BallKickFeedback {
        /// The kicker.
        id: ParticipantId,
    },
    /// A goal was scored. `authoritative` is true only when the sender held
    /// the ball; non-authoritative goals are feedback-only.
    GoalScored {
        /// Side that scored.
        side: GoalSide,
        /// Left-side total.
        score_left: u32,
        /// Right-side total.
        score_right: u32,
        /// Whether the scores may overwrite local score state.
        authoritative: bool,
    },
    /// The match ended.
    MatchOver {
        /// Winning side.
        winner: GoalSide,
        /// Final left-side score.
        score_left: u32,
        /// Final right-side score.
        score_right: u32,
    },
    /// The match was reset to its initial state.
    MatchReset,
    /// Teleport the ball back to a spawn position.
    BallRespawn {
        /// Spawn position.
        pos: Vec3,
    },
    /// The ball holder changed. When `holder` is `None` the host may decide
    /// to request the role (e.g. if the ball is in play nearby).
    HostChanged {
        /// Current holder, if any.
        holder: Option<ParticipantId>,
        /// Whether the local participant now holds the role.
        we_hold: bool,
    },
    /// A peer announced its voice address; forward to the voice bridge.
    VoicePeerAnnounced {
        /// Announcing participant.
        id: ParticipantId,
        /// Their voice peer address.
        addr: PeerAddr,
    },
    /// A voice peer departed; forward to the voice bridge for teardown.
    VoicePeerLeft {
        /// Departed participant.
        id: ParticipantId,
    },
    /// The world was wiped; clear world-derived state.
    WorldWiped {
        /// True on the client that requested the wipe.
        is_initiator: bool,
        /// Server wall-clock milliseconds of the wipe.
        time_ms: f64,
    },
    /// Broadcast the local transform immediately (fresh join; other
    /// participants should not wait a full broadcast cycle to see us).
    PushLocalState,
    /// Surface a user-visible notice.
    Notify(Notice),
}

/// User-visible notices surfaced by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// We joined a zone.
    JoinedZone {
        /// Zone actually joined.
        zone: ZoneId,
        /// Whether world edits are permitted.
        can_edit: bool,
    },
    /// The requested zone was rejected and we fell back to the default.
    JoinRejected {
        /// Server-provided detail.
        message: String,
    },
    /// A participant joined.
    PlayerJoined {
        /// Their display name.
        name: String,
    },
    /// A participant left.
    PlayerLeft {
        /// Their display name.
        name: String,
    },
}
