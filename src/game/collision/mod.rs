//! Player-vs-player collision detection
//!
//! The broad phase runs on the tick thread against the spatial index; the
//! narrow phase runs on [`CollisionWorkerPool`] threads over owned snapshots.

pub mod narrow_phase;
pub mod pool;

pub use narrow_phase::{
    point_segment_distance_sq, CollisionHit, CollisionOutcome, CollisionResponse, CollisionTask, OpponentTrail,
    TrailPoint, WorkerError,
};
pub use pool::{CollisionWorkerPool, PoolError};
