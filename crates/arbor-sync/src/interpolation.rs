//! Snapshot buffering and interpolation for remote entities.
//!
//! Remote transforms are rendered [`RENDER_DELAY_MS`] behind the local clock
//! so that two bracketing samples are almost always available to blend
//! between. On buffer underrun (packet loss, bursty arrival) the sampler
//! clamps to the newest snapshot instead of extrapolating.

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};

use arbor_protocol::Vec3;

/// Fixed rendering delay behind "now", in milliseconds.
pub const RENDER_DELAY_MS: f64 = 100.0;

/// Maximum snapshots retained per entity; oldest evicted first.
pub const SNAPSHOT_CAP: usize = 20;

/// Minimum per-axis displacement before yaw is inferred from movement.
/// Below this, jitter while standing still would cause spurious spins.
pub const YAW_DEAD_ZONE: f32 = 0.01;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One timestamped state sample for a remote entity. Immutable once pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Local receive time in milliseconds (monotonic).
    pub time_ms: f64,
    /// Position in world units.
    pub pos: Vec3,
    /// Yaw in radians.
    pub yaw: f32,
    /// Crouching flag.
    pub is_crouching: bool,
    /// Flying flag.
    pub is_flying: bool,
}

/// Result of sampling a buffer at a render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampled {
    /// Interpolated (or clamped) position.
    pub pos: Vec3,
    /// Yaw target in radians, interpolated along the shortest arc.
    pub yaw: f32,
    /// Crouching flag from the later bracketing sample.
    pub is_crouching: bool,
    /// Flying flag from the later bracketing sample.
    pub is_flying: bool,
    /// Horizontal speed between the bracketing samples, world units/second.
    pub speed: f32,
    /// `true` when the render time fell outside the buffered range and the
    /// result was clamped to the nearest snapshot.
    pub clamped: bool,
}

// ---------------------------------------------------------------------------
// SnapshotBuffer
// ---------------------------------------------------------------------------

/// Time-ordered snapshot buffer, capped at [`SNAPSHOT_CAP`] entries.
///
/// Times are forced non-decreasing on insert: a sample stamped earlier than
/// the newest retained entry is clamped to the newest time rather than
/// reordering the buffer.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuffer {
    entries: VecDeque<Snapshot>,
}

impl SnapshotBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot, evicting the oldest entry at capacity.
    pub fn push(&mut self, mut snap: Snapshot) {
        if let Some(last) = self.entries.back()
            && snap.time_ms < last.time_ms
        {
            snap.time_ms = last.time_ms;
        }
        if self.entries.len() >= SNAPSHOT_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back(snap);
    }

    /// Returns the newest snapshot, if any.
    pub fn newest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no snapshots are buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Samples the buffer at `render_time_ms`.
    ///
    /// Returns `None` only when the buffer is empty. With a bracketing pair
    /// `(s0, s1)` such that `s0.time ≤ t ≤ s1.time`, position is lerped
    /// component-wise and yaw is interpolated along the shortest angular
    /// path. Outside the buffered range the result clamps to the nearest
    /// snapshot with no velocity extrapolation.
    pub fn sample(&self, render_time_ms: f64) -> Option<Sampled> {
        let newest = self.entries.back()?;

        if render_time_ms >= newest.time_ms {
            return Some(Self::clamp_to(newest));
        }
        let oldest = self.entries.front()?;
        if render_time_ms <= oldest.time_ms {
            return Some(Self::clamp_to(oldest));
        }

        for i in 0..self.entries.len().saturating_sub(1) {
            if let Some(sampled) =
                Self::blend(&self.entries[i], &self.entries[i + 1], render_time_ms)
            {
                return Some(sampled);
            }
        }

        Some(Self::clamp_to(newest))
    }

    fn blend(s0: &Snapshot, s1: &Snapshot, t_ms: f64) -> Option<Sampled> {
        if !(s0.time_ms <= t_ms && t_ms <= s1.time_ms) {
            return None;
        }
        let span = s1.time_ms - s0.time_ms;
        let t = if span > 0.0 {
            (((t_ms - s0.time_ms) / span) as f32).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let yaw = s0.yaw + wrap_angle(s1.yaw - s0.yaw) * t;
        let speed = if span > 0.0 {
            s0.pos.horizontal_distance(s1.pos) / (span as f32 / 1000.0)
        } else {
            0.0
        };
        Some(Sampled {
            pos: s0.pos.lerp(s1.pos, t),
            yaw,
            is_crouching: s1.is_crouching,
            is_flying: s1.is_flying,
            speed,
            clamped: false,
        })
    }

    fn clamp_to(snap: &Snapshot) -> Sampled {
        Sampled {
            pos: snap.pos,
            yaw: snap.yaw,
            is_crouching: snap.is_crouching,
            is_flying: snap.is_flying,
            speed: 0.0,
            clamped: true,
        }
    }

    /// Drops entries no longer needed for bracketing `render_time_ms`,
    /// always retaining at least the two most recent snapshots.
    pub fn prune(&mut self, render_time_ms: f64) {
        while self.entries.len() > 2 {
            // entries[0] is only needed while entries[1] is still ahead of
            // the render time.
            if self.entries[1].time_ms <= render_time_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Iterates snapshots oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Angle helpers
// ---------------------------------------------------------------------------

/// Normalizes an angle difference into `(-π, π]`, the shortest arc.
pub fn wrap_angle(mut a: f32) -> f32 {
    while a > PI {
        a -= TAU;
    }
    while a <= -PI {
        a += TAU;
    }
    a
}

/// Advances `current` toward `target` along the shortest arc by fraction
/// `rate` (clamped to 1). Used to re-home rotation after an underrun clamp
/// without visible snapping.
pub fn approach_angle(current: f32, target: f32, rate: f32) -> f32 {
    current + wrap_angle(target - current) * rate.min(1.0)
}

/// Infers facing from a displacement between the previous target position
/// and a newly received one. Returns `None` while displacement stays inside
/// the dead-zone on both horizontal axes.
pub fn infer_yaw(prev: Vec3, next: Vec3) -> Option<f32> {
    let dx = next.x - prev.x;
    let dz = next.z - prev.z;
    if dx.abs() > YAW_DEAD_ZONE || dz.abs() > YAW_DEAD_ZONE {
        Some(dx.atan2(dz) + PI)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(time_ms: f64, x: f32, yaw: f32) -> Snapshot {
        Snapshot {
            time_ms,
            pos: Vec3::new(x, 0.0, 0.0),
            yaw,
            is_crouching: false,
            is_flying: false,
        }
    }

    #[test]
    fn test_buffer_times_non_decreasing_after_out_of_order_push() {
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(100.0, 0.0, 0.0));
        buf.push(snap(50.0, 1.0, 0.0)); // stale stamp, clamped to 100
        buf.push(snap(200.0, 2.0, 0.0));

        let times: Vec<f64> = buf.iter().map(|s| s.time_ms).collect();
        assert!(
            times.windows(2).all(|w| w[0] <= w[1]),
            "times must be non-decreasing: {times:?}"
        );
    }

    #[test]
    fn test_buffer_capped_at_twenty() {
        let mut buf = SnapshotBuffer::new();
        for i in 0..50 {
            buf.push(snap(i as f64, i as f32, 0.0));
        }
        assert_eq!(buf.len(), SNAPSHOT_CAP);
        // Oldest survivor is entry 30 of 0..50.
        assert_eq!(buf.iter().next().unwrap().time_ms, 30.0);
    }

    #[test]
    fn test_midpoint_interpolation_and_short_arc_yaw() {
        let mut buf = SnapshotBuffer::new();
        buf.push(Snapshot {
            time_ms: 0.0,
            pos: Vec3::new(0.0, 0.0, 0.0),
            yaw: 0.0,
            is_crouching: false,
            is_flying: false,
        });
        buf.push(Snapshot {
            time_ms: 200.0,
            pos: Vec3::new(10.0, 0.0, 0.0),
            yaw: PI + 0.1,
            is_crouching: true,
            is_flying: false,
        });

        let s = buf.sample(100.0).unwrap();
        assert!(!s.clamped);
        assert!((s.pos.x - 5.0).abs() < 1e-5);
        assert_eq!(s.pos.y, 0.0);
        assert_eq!(s.pos.z, 0.0);

        // Shortest arc: the (-π, π]-normalized difference to π+0.1 is
        // -(π-0.1), so the midpoint yaw goes negative, not through +π/2.
        let expected = wrap_angle(PI + 0.1) * 0.5;
        assert!(
            (s.yaw - expected).abs() < 1e-5,
            "yaw {} should follow the short arc to {expected}",
            s.yaw
        );
        assert!(s.yaw < 0.0, "long-way interpolation would give ~+{}", PI / 2.0);

        // Discrete flags come from the later bracketing sample.
        assert!(s.is_crouching);
    }

    #[test]
    fn test_single_snapshot_clamps_without_extrapolation() {
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(0.0, 3.0, 1.0));

        let s = buf.sample(500.0).unwrap();
        assert!(s.clamped);
        assert_eq!(s.pos, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(s.speed, 0.0);
    }

    #[test]
    fn test_render_time_before_oldest_clamps_to_oldest() {
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(1000.0, 1.0, 0.0));
        buf.push(snap(1100.0, 2.0, 0.0));

        let s = buf.sample(900.0).unwrap();
        assert!(s.clamped);
        assert_eq!(s.pos.x, 1.0);
    }

    #[test]
    fn test_empty_buffer_samples_none() {
        let buf = SnapshotBuffer::new();
        assert!(buf.sample(0.0).is_none());
    }

    #[test]
    fn test_prune_keeps_bracketing_pair() {
        let mut buf = SnapshotBuffer::new();
        for i in 0..6 {
            buf.push(snap(i as f64 * 100.0, i as f32, 0.0));
        }
        // Render time 350 needs the 300/400 pair; 0..=200 are prunable.
        buf.prune(350.0);
        let times: Vec<f64> = buf.iter().map(|s| s.time_ms).collect();
        assert_eq!(times, vec![300.0, 400.0, 500.0]);

        // Aggressive pruning never drops below two entries.
        buf.prune(10_000.0);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_speed_reflects_horizontal_motion() {
        let mut buf = SnapshotBuffer::new();
        buf.push(snap(0.0, 0.0, 0.0));
        buf.push(snap(1000.0, 4.0, 0.0)); // 4 units over 1 s
        let s = buf.sample(500.0).unwrap();
        assert!((s.speed - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI) - PI).abs() < 1e-5); // -π maps to +π
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        let w = wrap_angle(PI + 0.1);
        assert!(w < 0.0 && (w + (PI - 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_infer_yaw_dead_zone() {
        let prev = Vec3::new(0.0, 0.0, 0.0);
        assert!(infer_yaw(prev, Vec3::new(0.005, 0.0, 0.005)).is_none());

        let yaw = infer_yaw(prev, Vec3::new(0.0, 0.0, 1.0)).unwrap();
        assert!((yaw - PI).abs() < 1e-5, "moving +z faces atan2(0,1)+π = π");
    }
}
