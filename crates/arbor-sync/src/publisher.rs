//! Outbound state publisher.
//!
//! Local state goes out on every locally meaningful change rather than one
//! combined fixed-rate tick: movement, block edits, held-item changes,
//! color changes, chat, actions, and damage each have their own publish
//! call because their urgency and idempotency differ. A transform is safe
//! to resend redundantly; a chat line is not.

use arbor_protocol::messages::{
    BallReset, BlockChange, Chat, ClientMessage, Damage, EntityEvent, GameOver, Goal, HeldItem,
    JoinZone, PeerAddress, PlayerAction, PlayerColor, PlayerMove, Speech,
};
use arbor_protocol::{ParticipantId, PeerAddr, Vec3, ZoneId};

/// Snapshot of the local player's publishable state, supplied by the host
/// each time movement is published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    /// Position in world units.
    pub pos: Vec3,
    /// Yaw in radians; `None` lets receivers infer facing from motion.
    pub rot_y: Option<f32>,
    /// Crouching flag.
    pub is_crouching: bool,
    /// Flying flag.
    pub is_flying: bool,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
}

/// Builds outbound messages from local player state. Holds the identity
/// fields repeated in every movement broadcast so late joiners pick them up.
#[derive(Debug, Clone)]
pub struct OutboundPublisher {
    name: String,
    shirt_color: Option<u32>,
    user_id: Option<String>,
}

impl OutboundPublisher {
    /// Creates a publisher announcing `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shirt_color: None,
            user_id: None,
        }
    }

    /// Sets the persistent account id carried in join requests.
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Current display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Updates the display name used in subsequent broadcasts.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The join request for `zone` (`None` for the legacy/default join).
    pub fn join(&self, zone: Option<ZoneId>) -> ClientMessage {
        ClientMessage::JoinZone(JoinZone {
            zone,
            name: self.name.clone(),
            shirt_color: self.shirt_color,
            user_id: self.user_id.clone(),
        })
    }

    /// Movement broadcast. Unthrottled; called once per movement frame.
    pub fn movement(&self, t: &LocalTransform) -> ClientMessage {
        ClientMessage::PlayerMove(PlayerMove {
            pos: t.pos,
            rot_y: t.rot_y,
            name: self.name.clone(),
            is_crouching: t.is_crouching,
            is_flying: t.is_flying,
            health: t.health,
            max_health: t.max_health,
            shirt_color: self.shirt_color,
        })
    }

    /// Voxel edit echo.
    pub fn block_change(&self, x: i32, y: i32, z: i32, kind: u16) -> ClientMessage {
        ClientMessage::BlockChange(BlockChange { x, y, z, kind })
    }

    /// Non-player entity spawn.
    pub fn entity_spawn(&self, event: EntityEvent) -> ClientMessage {
        ClientMessage::EntitySpawn(event)
    }

    /// Non-player entity update.
    pub fn entity_update(&self, event: EntityEvent) -> ClientMessage {
        ClientMessage::EntityUpdate(event)
    }

    /// Held-item change; `None` empties the hand.
    pub fn held_item(&self, item: Option<String>) -> ClientMessage {
        ClientMessage::HeldItem(HeldItem { item })
    }

    /// Shirt-color change. Remembered so future movement broadcasts and
    /// join requests carry it.
    pub fn shirt_color(&mut self, color: u32) -> ClientMessage {
        self.shirt_color = Some(color);
        ClientMessage::PlayerColor(PlayerColor { shirt_color: color })
    }

    /// Damage dealt to another participant.
    pub fn damage(&self, target: ParticipantId, amount: f32) -> ClientMessage {
        ClientMessage::Damage(Damage { target, amount })
    }

    /// Local death notice.
    pub fn death(&self) -> ClientMessage {
        ClientMessage::Death
    }

    /// One-shot action trigger.
    pub fn action(&self, action: impl Into<String>) -> ClientMessage {
        ClientMessage::Action(PlayerAction {
            action: action.into(),
        })
    }

    /// Chat line. Never auto-resent.
    pub fn chat(&self, text: impl Into<String>) -> ClientMessage {
        ClientMessage::Chat(Chat {
            name: self.name.clone(),
            text: text.into(),
        })
    }

    /// Speech-bubble text.
    pub fn speech(&self, text: impl Into<String>) -> ClientMessage {
        ClientMessage::Speech(Speech { text: text.into() })
    }

    /// Kick feedback broadcast.
    pub fn ball_kick(&self) -> ClientMessage {
        ClientMessage::BallKick
    }

    /// Goal broadcast with our view of the score.
    pub fn goal(&self, goal: Goal) -> ClientMessage {
        ClientMessage::Goal(goal)
    }

    /// Match-over broadcast.
    pub fn game_over(&self, over: GameOver) -> ClientMessage {
        ClientMessage::GameOver(over)
    }

    /// Match-reset broadcast.
    pub fn game_reset(&self) -> ClientMessage {
        ClientMessage::GameReset
    }

    /// Ball respawn broadcast.
    pub fn ball_reset(&self, pos: Vec3) -> ClientMessage {
        ClientMessage::BallReset(BallReset { pos })
    }

    /// Voice peer address announcement.
    pub fn peer_address(&self, addr: PeerAddr) -> ClientMessage {
        ClientMessage::PeerAddress(PeerAddress { addr })
    }

    /// World wipe request.
    pub fn world_reset(&self) -> ClientMessage {
        ClientMessage::WorldReset
    }
}
