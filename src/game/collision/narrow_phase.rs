//! Narrow-phase collision test run by the worker threads.
//!
//! Pure geometry over owned task copies: head point vs opponent trail
//! segments. Tasks and responses follow the worker wire contract
//! (camelCase JSON field names).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::game::state::EntityId;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for TrailPoint {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<TrailPoint> for Vec2 {
    fn from(p: TrailPoint) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Snapshot of one opponent: head first, then its trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentTrail {
    pub id: EntityId,
    pub trail: Vec<TrailPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionTask {
    pub entity_id: EntityId,
    pub head_x: f32,
    pub head_y: f32,
    pub opponents: Vec<OpponentTrail>,
    pub collision_radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionHit {
    pub killer_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WorkerError {
    #[error("Task head position is not finite")]
    InvalidHead,
    #[error("Task collision radius is invalid")]
    InvalidRadius,
    #[error("Worker panicked: {0}")]
    Panicked(String),
}

/// Worker reply, correlated to the task by `entity_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionResponse {
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub outcome: CollisionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionOutcome {
    /// `None` = no collision
    Collision(Option<CollisionHit>),
    Error(WorkerError),
}

/// Squared distance from `p` to segment `a-b`, projection clamped to [0, 1]
#[inline]
pub fn point_segment_distance_sq(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance_sq_to(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    p.distance_sq_to(closest)
}

/// Run one task.
///
/// Opponents are scanned in order and each trail from index 0; the first
/// segment closer than the radius wins, not the globally nearest one.
pub fn check_collision(task: &CollisionTask) -> Result<Option<CollisionHit>, WorkerError> {
    let head = Vec2::new(task.head_x, task.head_y);
    if !head.is_finite() {
        return Err(WorkerError::InvalidHead);
    }
    if !task.collision_radius.is_finite() || task.collision_radius <= 0.0 {
        return Err(WorkerError::InvalidRadius);
    }
    let radius_sq = task.collision_radius * task.collision_radius;

    for opponent in &task.opponents {
        if opponent.id == task.entity_id {
            continue;
        }

        if let [only] = opponent.trail.as_slice() {
            let point = Vec2::from(*only);
            if point.is_finite() && head.distance_sq_to(point) < radius_sq {
                return Ok(Some(CollisionHit { killer_id: opponent.id }));
            }
            continue;
        }

        for segment in opponent.trail.windows(2) {
            let a = Vec2::from(segment[0]);
            let b = Vec2::from(segment[1]);
            if !a.is_finite() || !b.is_finite() {
                warn!("Skipping malformed trail segment of entity {}", opponent.id);
                continue;
            }
            if point_segment_distance_sq(head, a, b) < radius_sq {
                return Ok(Some(CollisionHit { killer_id: opponent.id }));
            }
        }
    }

    Ok(None)
}

/// Run a task, turning any panic into an error response
pub fn run_task(task: &CollisionTask) -> CollisionResponse {
    let outcome = match std::panic::catch_unwind(|| check_collision(task)) {
        Ok(Ok(hit)) => CollisionOutcome::Collision(hit),
        Ok(Err(e)) => CollisionOutcome::Error(e),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            CollisionOutcome::Error(WorkerError::Panicked(message))
        }
    };

    CollisionResponse {
        entity_id: task.entity_id,
        outcome,
    }
}
