//! Voice signaling bridge.
//!
//! Peer addresses travel over the reliable game channel; the actual audio
//! stack (microphone, peer connections, playback sinks) lives on the
//! platform side. The bridge is a state machine: platform and network
//! events go in, [`VoiceEffect`] values come out. Blocking operations like
//! microphone acquisition complete as later events, never inline.
//!
//! Links are established lazily. A peer announced before our own
//! capability is ready goes into a pending queue and is dialed when the
//! capability initializes. Muting stops the outbound track without tearing
//! links down, so re-enabling is cheap; full teardown happens only on peer
//! departure or explicit shutdown.

use std::collections::BTreeMap;

use arbor_protocol::{ParticipantId, PeerAddr};
use tracing::{debug, info, warn};

/// State of one peer audio link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Dial requested, media negotiation in progress.
    Connecting,
    /// Audio flowing.
    Connected,
}

/// One voice-chat counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerLink {
    /// The peer's announced address.
    pub addr: PeerAddr,
    /// Link lifecycle state.
    pub state: LinkState,
    /// Whether a playback sink exists for this peer.
    pub has_sink: bool,
    /// Whether playback is waiting on a user-input autoplay retry.
    pub awaiting_input: bool,
}

/// Side effect requested by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEffect {
    /// Send our peer address over the reliable channel.
    AnnounceAddress(PeerAddr),
    /// Open a peer connection to `addr`.
    Dial {
        /// The counterpart.
        id: ParticipantId,
        /// Their announced address.
        addr: PeerAddr,
    },
    /// Close the peer connection.
    CloseLink {
        /// The counterpart.
        id: ParticipantId,
    },
    /// Create a playback sink for the peer's inbound stream.
    CreateSink {
        /// The counterpart.
        id: ParticipantId,
    },
    /// Replace the stream on the peer's existing sink.
    ReplaceStream {
        /// The counterpart.
        id: ParticipantId,
    },
    /// Start (or retry) playback on the peer's sink.
    Play {
        /// The counterpart.
        id: ParticipantId,
    },
    /// Stop playback and release the peer's sink.
    ReleaseSink {
        /// The counterpart.
        id: ParticipantId,
    },
    /// Mute or unmute the outbound microphone track.
    SetMicMuted(bool),
    /// Start watching for the next user input (autoplay retry).
    ListenForUserInput,
    /// Stop watching for user input; all blocked playbacks recovered.
    StopListeningForUserInput,
    /// Voice chat is unavailable; shown once.
    NoticeUnavailable {
        /// Human-readable reason.
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    /// Microphone not requested or still pending.
    Uninitialized,
    /// Microphone granted; we can dial and answer.
    Ready,
    /// Microphone denied or platform failure; voice stays silent.
    Unavailable,
}

/// The voice signaling bridge.
#[derive(Debug)]
pub struct VoiceBridge {
    capability: Capability,
    self_addr: Option<PeerAddr>,
    links: BTreeMap<ParticipantId, PeerLink>,
    // Peers announced before our capability initialized.
    pending: BTreeMap<ParticipantId, PeerAddr>,
    muted: bool,
}

impl Default for VoiceBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceBridge {
    /// Creates a bridge with no capability and no links.
    pub fn new() -> Self {
        Self {
            capability: Capability::Uninitialized,
            self_addr: None,
            links: BTreeMap::new(),
            pending: BTreeMap::new(),
            muted: false,
        }
    }

    /// The link for `id`, if one exists.
    pub fn link(&self, id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(id)
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// True while the outbound track is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Microphone granted. Derives our peer address from the session's
    /// participant id ([`PeerAddr::derive`]), announces it, and dials every
    /// queued peer that is not already linked.
    pub fn on_capability_ready(&mut self, self_id: &ParticipantId) -> Vec<VoiceEffect> {
        let self_addr = PeerAddr::derive(self_id);
        self.capability = Capability::Ready;
        self.self_addr = Some(self_addr.clone());
        info!(addr = %self_addr.as_str(), "voice capability ready");

        let mut effects = vec![VoiceEffect::AnnounceAddress(self_addr)];
        let queued: Vec<(ParticipantId, PeerAddr)> = std::mem::take(&mut self.pending)
            .into_iter()
            .collect();
        for (id, addr) in queued {
            effects.extend(self.dial(id, addr));
        }
        effects
    }

    /// Microphone denied or the platform voice stack failed. Voice chat
    /// degrades to silent; the rest of the system is unaffected.
    pub fn on_capability_denied(&mut self, reason: impl Into<String>) -> Vec<VoiceEffect> {
        let reason = reason.into();
        warn!("voice capability unavailable: {reason}");
        self.capability = Capability::Unavailable;
        self.pending.clear();
        vec![VoiceEffect::NoticeUnavailable { reason }]
    }

    /// A peer announced its address over the reliable channel.
    pub fn on_peer_announced(&mut self, id: ParticipantId, addr: PeerAddr) -> Vec<VoiceEffect> {
        match self.capability {
            Capability::Ready => self.dial(id, addr),
            Capability::Uninitialized => {
                debug!(peer = %id, "queueing voice pairing until capability ready");
                self.pending.insert(id, addr);
                Vec::new()
            }
            Capability::Unavailable => Vec::new(),
        }
    }

    fn dial(&mut self, id: ParticipantId, addr: PeerAddr) -> Vec<VoiceEffect> {
        if self.links.contains_key(&id) {
            return Vec::new();
        }
        self.links.insert(
            id.clone(),
            PeerLink {
                addr: addr.clone(),
                state: LinkState::Connecting,
                has_sink: false,
                awaiting_input: false,
            },
        );
        vec![VoiceEffect::Dial { id, addr }]
    }

    /// An inbound dial reached us; track the link so we do not dial back.
    pub fn on_incoming_link(&mut self, id: ParticipantId, addr: PeerAddr) {
        self.links.entry(id).or_insert(PeerLink {
            addr,
            state: LinkState::Connecting,
            has_sink: false,
            awaiting_input: false,
        });
    }

    /// Media negotiation finished for `id`.
    pub fn on_link_established(&mut self, id: &ParticipantId) {
        if let Some(link) = self.links.get_mut(id) {
            link.state = LinkState::Connected;
        }
    }

    /// An inbound audio stream arrived for `id`. Reuses the existing sink
    /// when there is one (stream replacement), otherwise creates it, then
    /// starts playback.
    pub fn on_stream(&mut self, id: &ParticipantId) -> Vec<VoiceEffect> {
        let Some(link) = self.links.get_mut(id) else {
            debug!(peer = %id, "stream for unknown link; ignoring");
            return Vec::new();
        };
        link.state = LinkState::Connected;
        let mut effects = if link.has_sink {
            vec![VoiceEffect::ReplaceStream { id: id.clone() }]
        } else {
            link.has_sink = true;
            vec![VoiceEffect::CreateSink { id: id.clone() }]
        };
        effects.push(VoiceEffect::Play { id: id.clone() });
        effects
    }

    /// Platform autoplay policy blocked playback for `id`; retry on the
    /// next user input.
    pub fn on_autoplay_blocked(&mut self, id: &ParticipantId) -> Vec<VoiceEffect> {
        let already_listening = self.links.values().any(|l| l.awaiting_input);
        let Some(link) = self.links.get_mut(id) else {
            return Vec::new();
        };
        link.awaiting_input = true;
        if already_listening {
            Vec::new()
        } else {
            vec![VoiceEffect::ListenForUserInput]
        }
    }

    /// A user input happened; retry every blocked playback.
    pub fn on_user_input(&mut self) -> Vec<VoiceEffect> {
        self.links
            .iter()
            .filter(|(_, link)| link.awaiting_input)
            .map(|(id, _)| VoiceEffect::Play { id: id.clone() })
            .collect()
    }

    /// Playback actually started for `id`; stop the input listener once no
    /// link is waiting anymore.
    pub fn on_playback_started(&mut self, id: &ParticipantId) -> Vec<VoiceEffect> {
        if let Some(link) = self.links.get_mut(id) {
            link.awaiting_input = false;
        }
        if self.links.values().any(|l| l.awaiting_input) {
            Vec::new()
        } else {
            vec![VoiceEffect::StopListeningForUserInput]
        }
    }

    /// A counterpart departed: close the link, release its sink, and drop
    /// any unresolved pairing.
    pub fn on_peer_left(&mut self, id: &ParticipantId) -> Vec<VoiceEffect> {
        self.pending.remove(id);
        let Some(link) = self.links.remove(id) else {
            return Vec::new();
        };
        let mut effects = vec![VoiceEffect::CloseLink { id: id.clone() }];
        if link.has_sink {
            effects.push(VoiceEffect::ReleaseSink { id: id.clone() });
        }
        effects
    }

    /// Mutes or unmutes the outbound track. Links stay up.
    pub fn set_muted(&mut self, muted: bool) -> Vec<VoiceEffect> {
        if self.capability != Capability::Ready || self.muted == muted {
            return Vec::new();
        }
        self.muted = muted;
        vec![VoiceEffect::SetMicMuted(muted)]
    }

    /// Full teardown on explicit capability shutdown: every link closed,
    /// every sink released, pending queue dropped.
    pub fn shutdown(&mut self) -> Vec<VoiceEffect> {
        self.pending.clear();
        self.capability = Capability::Uninitialized;
        self.self_addr = None;

        let links = std::mem::take(&mut self.links);
        let mut effects = Vec::new();
        for (id, link) in links {
            effects.push(VoiceEffect::CloseLink { id: id.clone() });
            if link.has_sink {
                effects.push(VoiceEffect::ReleaseSink { id });
            }
        }
        effects
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
