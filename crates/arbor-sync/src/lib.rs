//! Client-side synchronization core for the Arbor multiplayer client.
//!
//! Reconciles the local view of remote participants and the shared ball
//! against a lossy, latency-bearing server stream: snapshot interpolation
//! at a fixed rendering delay, server-arbitrated authority election for
//! the ball, a same-zone visibility filter, and an outbound publisher for
//! local state. The whole core is sans-IO: inbound messages go through
//! [`SyncCore::handle`], side effects come back as [`Effect`] values, and
//! the host performs them.

pub mod authority;
pub mod dispatch;
pub mod effects;
pub mod interpolation;
pub mod publisher;
pub mod registry;
pub mod zones;

pub use authority::{BALL_PUBLISH_INTERVAL_MS, BallAuthority};
pub use dispatch::{Session, SyncCore};
pub use effects::{Effect, Notice};
pub use interpolation::{RENDER_DELAY_MS, SNAPSHOT_CAP, Snapshot, SnapshotBuffer};
pub use publisher::{LocalTransform, OutboundPublisher};
pub use registry::{EntityRegistry, FrameUpdate, RemoteEntityRecord, VisualState};
pub use zones::{Zone, visible_to};
