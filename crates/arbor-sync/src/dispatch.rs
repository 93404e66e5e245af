//! Typed message dispatch for the sync core.
//!
//! [`SyncCore`] owns the registry and the ball authority tracker, applies
//! every inbound [`ServerMessage`] with an exhaustive match, and returns the
//! side effects for the host to perform. Handlers run on the single game
//! loop thread and never block; malformed messages are rejected at the
//! transport layer before reaching this point.

use arbor_protocol::messages::ServerMessage;
use arbor_protocol::{ParticipantId, Vec3, ZoneId};
use tracing::{debug, info, warn};

use crate::authority::BallAuthority;
use crate::effects::{Effect, Notice};
use crate::registry::{EntityRegistry, FrameUpdate};

/// State of the current zone membership, set by the join acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Server-side room instance id.
    pub room_id: String,
    /// Zone we are in.
    pub zone: ZoneId,
    /// Our connection-scoped participant id.
    pub self_id: ParticipantId,
    /// Whether world edits are permitted.
    pub can_edit: bool,
}

/// The client-side synchronization core.
#[derive(Debug, Default)]
pub struct SyncCore {
    /// Remote participant records.
    pub registry: EntityRegistry,
    /// Shared-ball authority tracking.
    pub ball: BallAuthority,
    session: Option<Session>,
}

impl SyncCore {
    /// Creates an empty core with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session, if a join has been acknowledged.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Our participant id, if joined.
    pub fn self_id(&self) -> Option<&ParticipantId> {
        self.session.as_ref().map(|s| &s.self_id)
    }

    /// Applies one inbound message. `now_ms` is the local receive clock
    /// used to stamp snapshots.
    pub fn handle(&mut self, msg: ServerMessage, now_ms: f64) -> Vec<Effect> {
        match msg {
            ServerMessage::Joined(joined) => {
                info!(zone = %joined.zone, room = %joined.room_id, "joined zone");
                let mut effects = Vec::new();

                // Room membership does not survive a reconnect; the join
                // snapshot is the new truth. Drop whatever we had.
                let stale: Vec<ParticipantId> =
                    self.registry.iter().map(|r| r.id.clone()).collect();
                for id in stale {
                    let (_, teardown) = self.registry.remove(&id);
                    effects.extend(teardown);
                    effects.push(Effect::VoicePeerLeft { id });
                }

                for state in &joined.player_states {
                    effects.extend(self.registry.seed(state, now_ms));
                }
                self.session = Some(Session {
                    room_id: joined.room_id,
                    zone: joined.zone.clone(),
                    self_id: joined.self_id,
                    can_edit: joined.can_edit,
                });
                effects.push(Effect::Notify(Notice::JoinedZone {
                    zone: joined.zone,
                    can_edit: joined.can_edit,
                }));
                // Don't make others wait a broadcast cycle to see us.
                effects.push(Effect::PushLocalState);
                effects
            }
            ServerMessage::JoinError(err) => {
                warn!(kind = ?err.kind, "zone join rejected: {}", err.message);
                vec![Effect::Notify(Notice::JoinRejected {
                    message: err.message,
                })]
            }
            ServerMessage::PlayerMove(mv) => self.registry.ingest_move(&mv, now_ms),
            ServerMessage::PlayerJoined(joined) => {
                // The record itself is created lazily on the first
                // position-bearing message.
                let name = joined
                    .name
                    .unwrap_or_else(|| joined.id.default_display_name());
                vec![Effect::Notify(Notice::PlayerJoined { name })]
            }
            ServerMessage::PlayerLeft(left) => {
                let (name, mut effects) = self.registry.remove(&left.id);
                effects.push(Effect::VoicePeerLeft {
                    id: left.id.clone(),
                });
                if let Some(name) = name {
                    effects.push(Effect::Notify(Notice::PlayerLeft { name }));
                }
                effects
            }
            ServerMessage::BlockChange(bc) => vec![Effect::ApplyBlockChange {
                x: bc.x,
                y: bc.y,
                z: bc.z,
                kind: bc.kind,
            }],
            ServerMessage::EntitySpawn(ev) => vec![Effect::SpawnEntity {
                id: ev.id,
                event: ev.event,
            }],
            ServerMessage::EntityUpdate(ev) => vec![Effect::UpdateEntity {
                id: ev.id,
                event: ev.event,
            }],
            ServerMessage::HeldItem(held) => self.registry.set_held_item(&held.id, held.item),
            ServerMessage::PlayerColor(color) => {
                self.registry.set_shirt_color(&color.id, color.shirt_color)
            }
            ServerMessage::Damage(dmg) => {
                if self.self_id() == Some(&dmg.target) {
                    vec![Effect::LocalDamage {
                        from: dmg.from,
                        amount: dmg.amount,
                    }]
                } else {
                    // Health for other participants arrives with their
                    // movement updates; nothing to do here.
                    debug!(target = %dmg.target, "damage for another participant");
                    Vec::new()
                }
            }
            ServerMessage::Death(death) => self.registry.mark_dying(&death.id),
            ServerMessage::Action(action) => vec![Effect::PlayAction {
                id: action.id,
                action: action.action,
            }],
            ServerMessage::Chat(chat) => vec![Effect::ShowChat {
                id: chat.id,
                name: chat.name,
                text: chat.text,
            }],
            ServerMessage::Speech(speech) => vec![Effect::ShowSpeech {
                id: speech.id,
                text: speech.text,
            }],
            ServerMessage::BallState(state) => self.ball.on_remote_state(&state),
            ServerMessage::BallKick(kick) => vec![Effect::BallKickFeedback { id: kick.id }],
            ServerMessage::Goal(goal) => self.ball.on_goal(&goal.id, &goal.goal),
            ServerMessage::GameOver(over) => vec![Effect::MatchOver {
                winner: over.winner,
                score_left: over.score_left,
                score_right: over.score_right,
            }],
            ServerMessage::GameReset => {
                self.ball.reset_match();
                vec![Effect::MatchReset]
            }
            ServerMessage::BallReset(reset) => vec![Effect::BallRespawn { pos: reset.pos }],
            ServerMessage::HostAssigned(assigned) => match self.self_id().cloned() {
                Some(self_id) => self.ball.on_host_assigned(assigned.holder, &self_id),
                None => {
                    debug!("host assignment before join ack; ignored");
                    Vec::new()
                }
            },
            ServerMessage::PeerAddress(peer) => vec![Effect::VoicePeerAnnounced {
                id: peer.id,
                addr: peer.addr,
            }],
            ServerMessage::WorldReset(reset) => {
                self.ball.reset_match();
                vec![Effect::WorldWiped {
                    is_initiator: reset.is_initiator,
                    time_ms: reset.time_ms,
                }]
            }
        }
    }

    /// Per-frame update: interpolates every record at the delayed render
    /// time and evaluates visibility against the local player's position.
    pub fn update(&mut self, now_ms: f64, dt: f32, local_pos: Vec3) -> Vec<FrameUpdate> {
        self.registry.update(now_ms, dt, local_pos)
    }

    /// Informs the core that the transport dropped. Authority never
    /// survives a reconnect; records are refreshed by the next join ack.
    pub fn on_transport_lost(&mut self) {
        self.ball.on_transport_lost();
        self.session = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_protocol::messages::{
        HostAssigned, Joined, PlayerLeft, PlayerState, RemoteDamage, RemoteMove,
        RemotePeerAddress,
    };
    use arbor_protocol::PeerAddr;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn joined_msg(self_id: &str, others: Vec<&str>) -> ServerMessage {
        ServerMessage::Joined(Joined {
            room_id: "room-1".to_string(),
            zone: ZoneId::default_zone(),
            self_id: pid(self_id),
            can_edit: true,
            player_states: others
                .into_iter()
                .map(|id| PlayerState {
                    id: pid(id),
                    name: None,
                    pos: Vec3::new(0.0, 10.0, 0.0),
                    rot_y: 0.0,
                    is_crouching: false,
                    is_flying: false,
                    health: 100.0,
                    max_health: 100.0,
                    shirt_color: None,
                    held_item: None,
                })
                .collect(),
            time_ms: 0.0,
        })
    }

    #[test]
    fn test_join_seeds_records_and_pushes_local_state() {
        let mut core = SyncCore::new();
        let effects = core.handle(joined_msg("me", vec!["p1", "p2"]), 0.0);

        assert_eq!(core.registry.len(), 2);
        assert_eq!(core.self_id(), Some(&pid("me")));
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, Effect::CreateVisual { .. }))
                .count(),
            2
        );
        assert!(effects.contains(&Effect::PushLocalState));
    }

    #[test]
    fn test_rejoin_replaces_stale_records() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec!["p1"]), 0.0);

        // Reconnect: the new snapshot has a different roster.
        let effects = core.handle(joined_msg("me", vec!["p2"]), 1000.0);
        assert_eq!(core.registry.len(), 1);
        assert!(core.registry.get(&pid("p1")).is_none());
        assert!(core.registry.get(&pid("p2")).is_some());
        assert!(effects.contains(&Effect::RemoveVisual { id: pid("p1") }));
        assert!(effects.contains(&Effect::VoicePeerLeft { id: pid("p1") }));
    }

    #[test]
    fn test_player_left_tears_down_voice() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec!["p1"]), 0.0);
        let effects = core.handle(
            ServerMessage::PlayerLeft(PlayerLeft { id: pid("p1") }),
            10.0,
        );
        assert!(effects.contains(&Effect::RemoveVisual { id: pid("p1") }));
        assert!(effects.contains(&Effect::VoicePeerLeft { id: pid("p1") }));
        assert!(core.registry.is_empty());
    }

    #[test]
    fn test_damage_routed_only_to_self() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec![]), 0.0);

        let hit_me = ServerMessage::Damage(RemoteDamage {
            from: pid("p1"),
            target: pid("me"),
            amount: 12.0,
        });
        let effects = core.handle(hit_me, 1.0);
        assert_eq!(
            effects,
            vec![Effect::LocalDamage {
                from: pid("p1"),
                amount: 12.0,
            }]
        );

        let hit_other = ServerMessage::Damage(RemoteDamage {
            from: pid("p1"),
            target: pid("p2"),
            amount: 12.0,
        });
        assert!(core.handle(hit_other, 2.0).is_empty());
    }

    #[test]
    fn test_host_assignment_flows_into_ball_authority() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec![]), 0.0);

        let effects = core.handle(
            ServerMessage::HostAssigned(HostAssigned {
                holder: Some(pid("me")),
            }),
            1.0,
        );
        assert!(core.ball.is_authoritative());
        assert!(matches!(
            effects[0],
            Effect::HostChanged { we_hold: true, .. }
        ));
    }

    #[test]
    fn test_host_assignment_before_join_is_dropped() {
        let mut core = SyncCore::new();
        let effects = core.handle(
            ServerMessage::HostAssigned(HostAssigned { holder: None }),
            0.0,
        );
        assert!(effects.is_empty());
        assert!(!core.ball.is_authoritative());
    }

    #[test]
    fn test_move_then_frame_update_produces_transform() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec![]), 0.0);
        core.handle(
            ServerMessage::PlayerMove(RemoteMove {
                id: pid("p1"),
                pos: Vec3::new(2.0, 10.0, 0.0),
                rot_y: Some(1.0),
                name: Some("Dana".to_string()),
                is_crouching: false,
                is_flying: false,
                health: Some(90.0),
                max_health: Some(100.0),
                shirt_color: None,
            }),
            0.0,
        );
        core.registry.visual_created(&pid("p1"));

        let updates = core.update(150.0, 0.016, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].pos, Vec3::new(2.0, 10.0, 0.0));
        assert!(updates[0].visible);
    }

    #[test]
    fn test_peer_address_forwarded_to_voice() {
        let mut core = SyncCore::new();
        let effects = core.handle(
            ServerMessage::PeerAddress(RemotePeerAddress {
                id: pid("p1"),
                addr: PeerAddr::new("vc_p1"),
            }),
            0.0,
        );
        assert_eq!(
            effects,
            vec![Effect::VoicePeerAnnounced {
                id: pid("p1"),
                addr: PeerAddr::new("vc_p1"),
            }]
        );
    }

    #[test]
    fn test_transport_loss_clears_session_and_token() {
        let mut core = SyncCore::new();
        core.handle(joined_msg("me", vec!["p1"]), 0.0);
        core.handle(
            ServerMessage::HostAssigned(HostAssigned {
                holder: Some(pid("me")),
            }),
            1.0,
        );

        core.on_transport_lost();
        assert!(core.session().is_none());
        assert!(!core.ball.is_authoritative());
    }
}
