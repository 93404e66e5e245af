//! Connection lifecycle and join-handshake state machine, sans I/O.
//!
//! [`ConnectionManager`] never touches a socket. The driver feeds it
//! lifecycle events and raw inbound frames; it answers with [`NetEffect`]
//! values (messages to write, a reconnect schedule, deliveries to the app).
//! Keeping the handshake rules out of the async code makes the tricky
//! cases — zone fallback, rejoin after reconnect, the shutdown/close
//! race — plain synchronous tests.

use std::time::Duration;

use arbor_protocol::messages::{ClientMessage, JoinZone, ServerMessage};
use arbor_protocol::{ZoneId, decode_server};
use tracing::{debug, info, warn};

use crate::reconnect::Backoff;

/// Everything needed to (re)issue the join request.
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Requested zone; `None` asks for the legacy/default join.
    pub zone: Option<ZoneId>,
    /// Display name to announce.
    pub name: String,
    /// Shirt color as packed RGB, if customized.
    pub shirt_color: Option<u32>,
    /// Persistent account id, if logged in.
    pub user_id: Option<String>,
}

/// Parses the requested zone out of a navigation path.
///
/// `/world/<name>` and `/w/<name>` select a zone; anything else (including
/// the root path) means the legacy/default join.
pub fn zone_from_path(path: &str) -> Option<ZoneId> {
    let mut segments = path.trim_start_matches('/').splitn(2, '/');
    let head = segments.next()?;
    let rest = segments.next()?.trim_end_matches('/');
    if (head == "world" || head == "w") && !rest.is_empty() {
        Some(ZoneId::new(rest))
    } else {
        None
    }
}

/// What the driver must do in response to an event.
#[derive(Debug, PartialEq)]
pub enum NetEffect {
    /// Write this message to the transport.
    Send(ClientMessage),
    /// Hand this message to the application.
    Deliver(ServerMessage),
    /// The transport dropped; session-scoped client state is now invalid.
    TransportLost,
    /// Schedule a reconnection attempt after the delay.
    ReconnectAfter(Duration),
    /// Surface a connection-level notice to the user.
    Notice(ConnectionNotice),
}

/// User-visible connection notices.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionNotice {
    /// The requested zone was rejected; retrying with the default.
    FallingBackToDefault {
        /// The zone that was rejected.
        requested: ZoneId,
        /// Server-provided detail.
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum HandshakeState {
    Disconnected,
    AwaitingJoinAck,
    InZone(ZoneId),
}

/// Drives the join handshake and reconnect schedule for one logical
/// connection.
#[derive(Debug)]
pub struct ConnectionManager {
    join: JoinConfig,
    state: HandshakeState,
    backoff: Backoff,
    // Set by shutdown() BEFORE the transport is closed, so a same-tick
    // close event cannot schedule a stray reconnect.
    detached: bool,
    fallback_attempted: bool,
}

impl ConnectionManager {
    /// Creates a manager for the given join parameters.
    pub fn new(join: JoinConfig) -> Self {
        Self {
            join,
            state: HandshakeState::Disconnected,
            backoff: Backoff::default(),
            detached: false,
            fallback_attempted: false,
        }
    }

    /// True once a join has been acknowledged on the current transport.
    pub fn is_joined(&self) -> bool {
        matches!(self.state, HandshakeState::InZone(_))
    }

    /// Zone of the current acknowledged join.
    pub fn zone(&self) -> Option<&ZoneId> {
        match &self.state {
            HandshakeState::InZone(zone) => Some(zone),
            _ => None,
        }
    }

    /// True after [`Self::detach`]; no further reconnects will be scheduled.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn join_message(&self, zone: Option<ZoneId>) -> ClientMessage {
        ClientMessage::JoinZone(JoinZone {
            zone,
            name: self.join.name.clone(),
            shirt_color: self.join.shirt_color,
            user_id: self.join.user_id.clone(),
        })
    }

    /// The transport (re)opened. Room membership does not survive a
    /// reconnect, so the join handshake re-runs every time.
    pub fn on_connected(&mut self) -> Vec<NetEffect> {
        self.backoff.reset();
        self.fallback_attempted = false;
        self.state = HandshakeState::AwaitingJoinAck;
        info!(zone = ?self.join.zone, "transport up, joining");
        vec![NetEffect::Send(self.join_message(self.join.zone.clone()))]
    }

    /// A raw inbound frame arrived. Malformed payloads are dropped and
    /// logged; they never tear down the connection.
    pub fn on_frame(&mut self, payload: &[u8]) -> Vec<NetEffect> {
        match decode_server(payload) {
            Ok(msg) => self.on_message(msg),
            Err(e) => {
                warn!("dropping malformed inbound frame: {e}");
                Vec::new()
            }
        }
    }

    fn on_message(&mut self, msg: ServerMessage) -> Vec<NetEffect> {
        match &msg {
            ServerMessage::Joined(joined) => {
                self.state = HandshakeState::InZone(joined.zone.clone());
            }
            ServerMessage::JoinError(err) => {
                if let Some(requested) = self.join.zone.clone()
                    && !self.fallback_attempted
                {
                    // Recovered error: retry with the default zone. The
                    // rejection is not delivered; the fallback notice is.
                    self.fallback_attempted = true;
                    warn!(zone = %requested, "zone rejected, falling back to default");
                    return vec![
                        NetEffect::Notice(ConnectionNotice::FallingBackToDefault {
                            requested,
                            message: err.message.clone(),
                        }),
                        NetEffect::Send(self.join_message(None)),
                    ];
                }
            }
            _ => {}
        }
        vec![NetEffect::Deliver(msg)]
    }

    /// The transport closed. Schedules a backoff reconnect unless the
    /// manager was detached first.
    pub fn on_closed(&mut self) -> Vec<NetEffect> {
        self.state = HandshakeState::Disconnected;
        if self.detached {
            debug!("transport closed after detach; no reconnect");
            return Vec::new();
        }
        let delay = self.backoff.next_delay();
        info!(?delay, attempt = self.backoff.attempts(), "transport lost, reconnecting");
        vec![NetEffect::TransportLost, NetEffect::ReconnectAfter(delay)]
    }

    /// A reconnection attempt failed; returns the delay before the next one.
    pub fn on_reconnect_failed(&mut self) -> Duration {
        self.backoff.next_delay()
    }

    /// Detaches the manager ahead of an intentional close. Must be called
    /// before the transport is torn down.
    pub fn detach(&mut self) {
        self.detached = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
