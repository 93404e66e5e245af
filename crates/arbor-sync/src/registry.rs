//! Remote participant registry.
//!
//! One [`RemoteEntityRecord`] per connected remote participant, keyed by
//! [`ParticipantId`]. Records are created on the first position-bearing
//! message for an unseen id and destroyed only on an explicit disconnect
//! notice. All mutation goes through registry methods so buffer ordering
//! and the pending-held-item race stay handled in one place.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use arbor_protocol::ParticipantId;
use arbor_protocol::Vec3;
use arbor_protocol::messages::{PlayerState, RemoteMove};
use tracing::{debug, trace};

use crate::effects::Effect;
use crate::interpolation::{
    RENDER_DELAY_MS, Snapshot, SnapshotBuffer, approach_angle, infer_yaw,
};
use crate::zones::visible_to;

/// Per-second chase rate for smoothed quantities (crouch scale, clamped
/// rotation re-homing).
const SMOOTH_RATE: f32 = 10.0;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Whether a record has a visual representation yet, and in what state.
///
/// `Dying` suspends position ingestion so a mid-animation entity cannot
/// slide around; health-only updates still apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    /// Visual creation requested but not yet confirmed by the host.
    Uninitialized,
    /// Visual exists and tracks the interpolated transform.
    Active,
    /// Death animation in progress; transform frozen.
    Dying,
}

/// Everything known about one remote participant.
#[derive(Debug, Clone)]
pub struct RemoteEntityRecord {
    /// Participant id.
    pub id: ParticipantId,
    /// Display name; falls back to a truncated id until announced.
    pub display_name: String,
    /// Time-ordered snapshot buffer.
    pub buffer: SnapshotBuffer,
    /// Current rendered position, mutated only by [`EntityRegistry::update`].
    pub rendered_pos: Vec3,
    /// Current rendered yaw in radians.
    pub rendered_yaw: f32,
    /// Smoothed crouch scale in `[0, 1]`.
    pub crouch_amount: f32,
    /// Last known flying flag.
    pub is_flying: bool,
    /// Last known health.
    pub health: f32,
    /// Last known maximum health.
    pub max_health: f32,
    /// Last known shirt color.
    pub shirt_color: Option<u32>,
    /// Currently shown held item.
    pub held_item: Option<String>,
    /// Visual lifecycle state.
    pub visual: VisualState,
    /// Whether the record was visible to the observer last frame.
    pub visible: bool,
}

impl RemoteEntityRecord {
    fn new(id: ParticipantId, name: Option<String>) -> Self {
        let display_name = name.unwrap_or_else(|| id.default_display_name());
        Self {
            id,
            display_name,
            buffer: SnapshotBuffer::new(),
            rendered_pos: Vec3::default(),
            rendered_yaw: 0.0,
            crouch_amount: 0.0,
            is_flying: false,
            health: 100.0,
            max_health: 100.0,
            shirt_color: None,
            held_item: None,
            visual: VisualState::Uninitialized,
            visible: true,
        }
    }
}

/// Per-frame output for one record, consumed by the host to drive its mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    /// Participant id.
    pub id: ParticipantId,
    /// Interpolated position.
    pub pos: Vec3,
    /// Interpolated yaw in radians.
    pub yaw: f32,
    /// Smoothed crouch scale in `[0, 1]`.
    pub crouch_amount: f32,
    /// Flying flag.
    pub is_flying: bool,
    /// Horizontal speed hint for the walk cycle, world units/second.
    pub speed: f32,
    /// Whether the mesh should be shown (same-zone rule).
    pub visible: bool,
    /// Whether the record is mid death animation.
    pub dying: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry of all remote participant records.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    records: HashMap<ParticipantId, RemoteEntityRecord>,
    // Held-item updates that raced ahead of visual creation.
    pending_items: HashMap<ParticipantId, Option<String>>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `id`, if present.
    pub fn get(&self, id: &ParticipantId) -> Option<&RemoteEntityRecord> {
        self.records.get(id)
    }

    /// Number of tracked participants.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no participants are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ingests a remote movement update, creating the record on first sight.
    ///
    /// `now_ms` is the local receive clock; snapshots are stamped with it
    /// rather than a wire timestamp. For a dying record only health fields
    /// are applied.
    pub fn ingest_move(&mut self, mv: &RemoteMove, now_ms: f64) -> Vec<Effect> {
        let mut effects = Vec::new();

        let record = match self.records.entry(mv.id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let record = RemoteEntityRecord::new(mv.id.clone(), mv.name.clone());
                trace!(id = %mv.id, "first movement from unseen participant");
                effects.push(Effect::CreateVisual {
                    id: record.id.clone(),
                    name: record.display_name.clone(),
                });
                entry.insert(record)
            }
        };

        if let Some(name) = &mv.name {
            record.display_name = name.clone();
        }
        let mut health_changed = false;
        if let Some(health) = mv.health
            && record.health != health
        {
            record.health = health;
            health_changed = true;
        }
        if let Some(max_health) = mv.max_health
            && record.max_health != max_health
        {
            record.max_health = max_health;
            health_changed = true;
        }
        if health_changed {
            effects.push(Effect::SetHealth {
                id: record.id.clone(),
                health: record.health,
                max_health: record.max_health,
            });
        }
        if let Some(color) = mv.shirt_color
            && record.shirt_color != Some(color)
        {
            record.shirt_color = Some(color);
            effects.push(Effect::SetShirtColor {
                id: record.id.clone(),
                color,
            });
        }

        if record.visual == VisualState::Dying {
            // Position ingestion is suspended mid death animation.
            return effects;
        }

        let yaw = match mv.rot_y {
            Some(yaw) => yaw,
            None => {
                let prev = record
                    .buffer
                    .newest()
                    .map(|s| s.pos)
                    .unwrap_or(mv.pos);
                infer_yaw(prev, mv.pos).unwrap_or(record.rendered_yaw)
            }
        };

        let first = record.buffer.is_empty();
        record.buffer.push(Snapshot {
            time_ms: now_ms,
            pos: mv.pos,
            yaw,
            is_crouching: mv.is_crouching,
            is_flying: mv.is_flying,
        });
        record.is_flying = mv.is_flying;
        if first {
            record.rendered_pos = mv.pos;
            record.rendered_yaw = yaw;
        }

        effects
    }

    /// Seeds a record from the join snapshot of an already-present
    /// participant.
    pub fn seed(&mut self, state: &PlayerState, now_ms: f64) -> Vec<Effect> {
        let mut record = RemoteEntityRecord::new(state.id.clone(), state.name.clone());
        record.buffer.push(Snapshot {
            time_ms: now_ms,
            pos: state.pos,
            yaw: state.rot_y,
            is_crouching: state.is_crouching,
            is_flying: state.is_flying,
        });
        record.rendered_pos = state.pos;
        record.rendered_yaw = state.rot_y;
        record.is_flying = state.is_flying;
        record.health = state.health;
        record.max_health = state.max_health;
        record.shirt_color = state.shirt_color;

        let mut effects = vec![
            Effect::CreateVisual {
                id: record.id.clone(),
                name: record.display_name.clone(),
            },
            // The join snapshot carries current health; the indicator must
            // not start at full for an already-wounded participant.
            Effect::SetHealth {
                id: record.id.clone(),
                health: state.health,
                max_health: state.max_health,
            },
        ];
        if let Some(color) = state.shirt_color {
            effects.push(Effect::SetShirtColor {
                id: record.id.clone(),
                color,
            });
        }
        if let Some(item) = &state.held_item {
            // Applied once the visual exists, same path as a live update.
            self.pending_items
                .insert(state.id.clone(), Some(item.clone()));
        }
        self.records.insert(state.id.clone(), record);
        effects
    }

    /// Confirms that the host created the visual for `id`. Flushes any
    /// pending held item exactly once.
    pub fn visual_created(&mut self, id: &ParticipantId) -> Vec<Effect> {
        let Some(record) = self.records.get_mut(id) else {
            debug!(%id, "visual confirmed for unknown participant");
            return Vec::new();
        };
        if record.visual == VisualState::Uninitialized {
            record.visual = VisualState::Active;
        }
        match self.pending_items.remove(id) {
            Some(item) => {
                record.held_item = item.clone();
                vec![Effect::SetHeldItem {
                    id: id.clone(),
                    item,
                }]
            }
            None => Vec::new(),
        }
    }

    /// Applies a held-item change, queueing it while the visual does not
    /// exist yet.
    pub fn set_held_item(&mut self, id: &ParticipantId, item: Option<String>) -> Vec<Effect> {
        match self.records.get_mut(id) {
            Some(record) if record.visual != VisualState::Uninitialized => {
                record.held_item = item.clone();
                vec![Effect::SetHeldItem {
                    id: id.clone(),
                    item,
                }]
            }
            _ => {
                // Participant announced but mesh not built yet; latest wins.
                self.pending_items.insert(id.clone(), item);
                Vec::new()
            }
        }
    }

    /// Applies a shirt-color change.
    pub fn set_shirt_color(&mut self, id: &ParticipantId, color: u32) -> Vec<Effect> {
        match self.records.get_mut(id) {
            Some(record) => {
                record.shirt_color = Some(color);
                vec![Effect::SetShirtColor {
                    id: id.clone(),
                    color,
                }]
            }
            None => Vec::new(),
        }
    }

    /// Marks a record as dying, freezing its transform.
    pub fn mark_dying(&mut self, id: &ParticipantId) -> Vec<Effect> {
        match self.records.get_mut(id) {
            Some(record) => {
                record.visual = VisualState::Dying;
                vec![Effect::StartDeath { id: id.clone() }]
            }
            None => Vec::new(),
        }
    }

    /// Clears the dying state after the host finished the death animation
    /// (respawn). The record resumes consuming position updates.
    pub fn clear_dying(&mut self, id: &ParticipantId) {
        if let Some(record) = self.records.get_mut(id)
            && record.visual == VisualState::Dying
        {
            record.visual = VisualState::Active;
        }
    }

    /// Removes a record on an explicit disconnect notice. Returns the
    /// departed record's display name alongside the teardown effect.
    pub fn remove(&mut self, id: &ParticipantId) -> (Option<String>, Vec<Effect>) {
        self.pending_items.remove(id);
        match self.records.remove(id) {
            Some(record) => (
                Some(record.display_name),
                vec![Effect::RemoveVisual { id: id.clone() }],
            ),
            None => (None, Vec::new()),
        }
    }

    /// Per-frame update: samples every buffer at `now_ms - RENDER_DELAY_MS`,
    /// advances smoothed quantities by `dt` seconds, evaluates the same-zone
    /// visibility rule against `observer_pos`, and prunes stale snapshots.
    pub fn update(&mut self, now_ms: f64, dt: f32, observer_pos: Vec3) -> Vec<FrameUpdate> {
        let render_time = now_ms - RENDER_DELAY_MS;
        let chase = (dt * SMOOTH_RATE).min(1.0);
        let mut out = Vec::with_capacity(self.records.len());

        for record in self.records.values_mut() {
            let Some(sampled) = record.buffer.sample(render_time) else {
                continue;
            };

            record.rendered_pos = sampled.pos;
            if sampled.clamped {
                // Underrun: position clamps, rotation re-homes smoothly so
                // the next fresh snapshot does not snap the facing.
                record.rendered_yaw = approach_angle(record.rendered_yaw, sampled.yaw, chase);
            } else {
                record.rendered_yaw = sampled.yaw;
            }

            let crouch_target = if sampled.is_crouching { 1.0 } else { 0.0 };
            record.crouch_amount += (crouch_target - record.crouch_amount) * chase;
            record.is_flying = sampled.is_flying;
            record.visible = visible_to(observer_pos, record.rendered_pos);
            record.buffer.prune(render_time);

            out.push(FrameUpdate {
                id: record.id.clone(),
                pos: record.rendered_pos,
                yaw: record.rendered_yaw,
                crouch_amount: record.crouch_amount,
                is_flying: record.is_flying,
                speed: sampled.speed,
                visible: record.visible,
                dying: record.visual == VisualState::Dying,
            });
        }
        out
    }

    /// Iterates all records.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntityRecord> {
        self.records.values()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
