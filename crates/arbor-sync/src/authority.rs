//! Authority election for the shared ball.
//!
//! The server is the arbiter: this side never assumes authority without an
//! explicit grant, and the publish path is gated on the state machine so
//! publishing without the token is structurally impossible rather than
//! merely checked.
//!
//! State machine: `Unclaimed → (request) → Pending → (granted) →
//! Authoritative`, `Pending → (denied) → Unclaimed`, `Authoritative →
//! (release | holder change | transport loss) → Unclaimed`.

use arbor_protocol::messages::{
    BallState, ClientMessage, Goal, RemoteBallState,
};
use arbor_protocol::{ParticipantId, Vec3};
use tracing::{debug, info};

use crate::effects::Effect;

/// Minimum wall-clock milliseconds between ball state publishes (20 Hz).
pub const BALL_PUBLISH_INTERVAL_MS: f64 = 50.0;

/// Local view of the authority state machine for the ball.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AuthorityState {
    /// Someone else (or nobody) holds the token.
    Unclaimed,
    /// We asked for the token and are awaiting the server's decision.
    Pending,
    /// We hold the token and may publish.
    Authoritative {
        /// Wall-clock of the last publish; `None` before the first.
        last_publish_ms: Option<f64>,
    },
}

/// Authority token tracking plus match score state for the shared ball.
#[derive(Debug)]
pub struct BallAuthority {
    state: AuthorityState,
    holder: Option<ParticipantId>,
    score_left: u32,
    score_right: u32,
}

impl Default for BallAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl BallAuthority {
    /// Creates the tracker in the unclaimed state with a zeroed score.
    pub fn new() -> Self {
        Self {
            state: AuthorityState::Unclaimed,
            holder: None,
            score_left: 0,
            score_right: 0,
        }
    }

    /// Current holder as last announced by the server.
    pub fn holder(&self) -> Option<&ParticipantId> {
        self.holder.as_ref()
    }

    /// True when we hold the token.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.state, AuthorityState::Authoritative { .. })
    }

    /// True while a request is in flight.
    pub fn is_pending(&self) -> bool {
        self.state == AuthorityState::Pending
    }

    /// Current match score as `(left, right)`.
    pub fn score(&self) -> (u32, u32) {
        (self.score_left, self.score_right)
    }

    /// Asks the server for the token. Returns the request message, or
    /// `None` when a request is already in flight or we already hold it.
    pub fn request(&mut self) -> Option<ClientMessage> {
        match self.state {
            AuthorityState::Unclaimed => {
                self.state = AuthorityState::Pending;
                debug!("requesting ball authority");
                Some(ClientMessage::RequestHost)
            }
            AuthorityState::Pending | AuthorityState::Authoritative { .. } => None,
        }
    }

    /// Voluntarily gives up the token. Returns the release message when we
    /// actually held it.
    pub fn release(&mut self) -> Option<ClientMessage> {
        match self.state {
            AuthorityState::Authoritative { .. } => {
                self.state = AuthorityState::Unclaimed;
                self.holder = None;
                info!("released ball authority");
                Some(ClientMessage::ReleaseHost)
            }
            _ => None,
        }
    }

    /// Applies the server's holder announcement. The grant is authoritative:
    /// whatever the announcement says overrides local pending state.
    pub fn on_host_assigned(
        &mut self,
        holder: Option<ParticipantId>,
        self_id: &ParticipantId,
    ) -> Vec<Effect> {
        let we_hold = holder.as_ref() == Some(self_id);
        self.state = if we_hold {
            info!("granted ball authority");
            AuthorityState::Authoritative {
                last_publish_ms: None,
            }
        } else {
            if self.state == AuthorityState::Pending {
                debug!(?holder, "ball authority request denied");
            }
            AuthorityState::Unclaimed
        };
        self.holder = holder.clone();
        vec![Effect::HostChanged { holder, we_hold }]
    }

    /// Publishes the ball's physics state if we hold the token and the 20 Hz
    /// wall-clock throttle allows it. Non-holders always get `None`; there
    /// is no other publish path.
    pub fn try_publish(&mut self, now_ms: f64, pos: Vec3, vel: Vec3) -> Option<ClientMessage> {
        let AuthorityState::Authoritative { last_publish_ms } = &mut self.state else {
            return None;
        };
        if let Some(last) = *last_publish_ms
            && now_ms - last < BALL_PUBLISH_INTERVAL_MS
        {
            return None;
        }
        *last_publish_ms = Some(now_ms);
        Some(ClientMessage::BallState(BallState { pos, vel }))
    }

    /// Applies an inbound ball state. Ignored while we are authoritative
    /// (our own simulation wins); otherwise the state is applied directly,
    /// since the ball is re-simulated locally each tick anyway.
    pub fn on_remote_state(&mut self, msg: &RemoteBallState) -> Vec<Effect> {
        if self.is_authoritative() {
            return Vec::new();
        }
        vec![Effect::BallSnap {
            pos: msg.pos,
            vel: msg.vel,
        }]
    }

    /// Applies an inbound goal event. Feedback always fires; the carried
    /// scores overwrite local score state only when the sender holds the
    /// token.
    pub fn on_goal(&mut self, from: &ParticipantId, goal: &Goal) -> Vec<Effect> {
        let authoritative = self.holder.as_ref() == Some(from);
        if authoritative {
            self.score_left = goal.score_left;
            self.score_right = goal.score_right;
        }
        vec![Effect::GoalScored {
            side: goal.side,
            score_left: goal.score_left,
            score_right: goal.score_right,
            authoritative,
        }]
    }

    /// Resets match score to the initial state.
    pub fn reset_match(&mut self) {
        self.score_left = 0;
        self.score_right = 0;
    }

    /// Drops all authority state after a transport loss. Room membership
    /// does not survive a reconnect, so neither does the token.
    pub fn on_transport_lost(&mut self) {
        self.state = AuthorityState::Unclaimed;
        self.holder = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn test_grant_after_vacancy_yields_single_holder() {
        let me = pid("me");
        let mut ball = BallAuthority::new();

        // Someone else holds the token.
        ball.on_host_assigned(Some(pid("other")), &me);
        assert!(!ball.is_authoritative());
        assert_eq!(ball.holder(), Some(&pid("other")));

        // Holder disconnects: vacancy, nobody authoritative.
        ball.on_host_assigned(None, &me);
        assert!(!ball.is_authoritative());
        assert_eq!(ball.holder(), None);

        // We request and the grant arrives: exactly one holder (us).
        assert!(matches!(ball.request(), Some(ClientMessage::RequestHost)));
        assert!(ball.is_pending());
        assert!(!ball.is_authoritative(), "pending is not authority");

        let effects = ball.on_host_assigned(Some(me.clone()), &me);
        assert!(ball.is_authoritative());
        assert_eq!(ball.holder(), Some(&me));
        assert_eq!(
            effects,
            vec![Effect::HostChanged {
                holder: Some(me),
                we_hold: true,
            }]
        );
    }

    #[test]
    fn test_denied_request_returns_to_unclaimed() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        ball.request();
        assert!(ball.is_pending());

        ball.on_host_assigned(Some(pid("rival")), &me);
        assert!(!ball.is_authoritative());
        assert!(!ball.is_pending());

        // A new request is allowed after the denial.
        assert!(ball.request().is_some());
    }

    #[test]
    fn test_duplicate_request_suppressed() {
        let mut ball = BallAuthority::new();
        assert!(ball.request().is_some());
        assert!(ball.request().is_none(), "second request while pending");
    }

    #[test]
    fn test_publish_gated_on_authority() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        let pos = Vec3::new(0.0, 500.0, 0.0);
        let vel = Vec3::new(1.0, 0.0, 0.0);

        assert!(ball.try_publish(0.0, pos, vel).is_none());
        ball.request();
        assert!(ball.try_publish(10.0, pos, vel).is_none(), "pending may not publish");

        ball.on_host_assigned(Some(me.clone()), &me);
        assert!(ball.try_publish(20.0, pos, vel).is_some());

        // Losing the token stops publishing the same instant.
        ball.on_host_assigned(Some(pid("rival")), &me);
        assert!(ball.try_publish(1000.0, pos, vel).is_none());
    }

    #[test]
    fn test_publish_throttled_to_twenty_hz() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        ball.on_host_assigned(Some(me.clone()), &me);
        let pos = Vec3::default();
        let vel = Vec3::default();

        assert!(ball.try_publish(1000.0, pos, vel).is_some());
        assert!(ball.try_publish(1030.0, pos, vel).is_none(), "30 ms < 50 ms");
        assert!(ball.try_publish(1050.0, pos, vel).is_some());
        assert!(ball.try_publish(1099.0, pos, vel).is_none());
        assert!(ball.try_publish(1100.0, pos, vel).is_some());
    }

    #[test]
    fn test_remote_state_ignored_while_authoritative() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        let msg = RemoteBallState {
            id: pid("rival"),
            pos: Vec3::new(1.0, 2.0, 3.0),
            vel: Vec3::default(),
        };

        assert_eq!(ball.on_remote_state(&msg).len(), 1);

        ball.on_host_assigned(Some(me.clone()), &me);
        assert!(ball.on_remote_state(&msg).is_empty());
    }

    #[test]
    fn test_goal_scores_trusted_only_from_holder() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        ball.on_host_assigned(Some(pid("holder")), &me);

        let goal = Goal {
            side: arbor_protocol::messages::GoalSide::Left,
            score_left: 3,
            score_right: 1,
        };

        // Non-holder goal: feedback only, score untouched.
        let effects = ball.on_goal(&pid("bystander"), &goal);
        assert!(matches!(
            effects[0],
            Effect::GoalScored { authoritative: false, .. }
        ));
        assert_eq!(ball.score(), (0, 0));

        // Holder goal: score applied.
        let effects = ball.on_goal(&pid("holder"), &goal);
        assert!(matches!(
            effects[0],
            Effect::GoalScored { authoritative: true, .. }
        ));
        assert_eq!(ball.score(), (3, 1));

        ball.reset_match();
        assert_eq!(ball.score(), (0, 0));
    }

    #[test]
    fn test_transport_loss_drops_token() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        ball.on_host_assigned(Some(me.clone()), &me);
        assert!(ball.is_authoritative());

        ball.on_transport_lost();
        assert!(!ball.is_authoritative());
        assert_eq!(ball.holder(), None);
        assert!(ball.try_publish(0.0, Vec3::default(), Vec3::default()).is_none());
    }

    #[test]
    fn test_release_only_when_held() {
        let me = pid("me");
        let mut ball = BallAuthority::new();
        assert!(ball.release().is_none());

        ball.on_host_assigned(Some(me.clone()), &me);
        assert!(matches!(ball.release(), Some(ClientMessage::ReleaseHost)));
        assert!(!ball.is_authoritative());
    }
}
