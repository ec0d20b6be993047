//! Default tuning values. Every one of these can be overridden through
//! [`crate::config::SimConfig`]; the simulation never reads them directly.

/// World dimensions
pub mod world {
    /// Map width in world units (rectangle) or disc diameter
    pub const WIDTH: f32 = 6000.0;
    /// Map height in world units
    pub const HEIGHT: f32 = 6000.0;
    /// Spatial index cell size, roughly the AoI radius / 7
    pub const SPATIAL_CELL_SIZE: f32 = 200.0;
}

/// Movement constants (per tick, not per second)
pub mod physics {
    /// Target simulation rate
    pub const TARGET_FPS: u32 = 60;
    /// Frame interval never drops below this, whatever the target rate
    pub const MIN_FRAME_INTERVAL_MS: u64 = 16;
    /// Distance travelled per tick at normal speed
    pub const BASE_SPEED: f32 = 3.0;
    /// Speed multiplier while boosting
    pub const BOOST_MULTIPLIER: f32 = 2.0;
    /// Max heading change per tick (radians)
    pub const TURN_RATE: f32 = 0.12;
    /// Head-to-body distance below which two entities collide
    pub const COLLISION_RADIUS: f32 = 10.0;
}

/// Trail / capacity constants
pub mod trail {
    /// Absolute maximum trail length regardless of capacity
    pub const HARD_CAP: usize = 1200;
    /// Capacity of a freshly spawned entity
    pub const INITIAL_CAPACITY: f32 = 40.0;
    /// Every Nth trail point is indexed for the collision broad phase
    pub const BODY_SAMPLE_STRIDE: usize = 4;
}

/// Boost constants
pub mod boost {
    /// Capacity floor; boosting is switched off at or below it
    pub const MIN_CAPACITY: f32 = 20.0;
    /// Ticks between capacity deductions while boosting
    pub const COST_INTERVAL_TICKS: u32 = 5;
    /// Lifetime of an exhaust particle
    pub const EXHAUST_LIFETIME_MS: u64 = 1500;
    /// Radius of an exhaust particle
    pub const EXHAUST_SIZE: f32 = 3.0;
}

/// Food constants
pub mod food {
    pub const SPAWN_INTERVAL_MS: u64 = 250;
    pub const SPAWN_BATCH: usize = 8;
    /// Spawner stops topping up past this count
    pub const MAX_COUNT: usize = 800;
    pub const MIN_SIZE: f32 = 3.0;
    pub const MAX_SIZE: f32 = 7.0;
    pub const LIFETIME_MS: u64 = 90_000;
    /// Fade-out duration after expiry; fully faded food is removed
    pub const FADE_MS: u64 = 2_000;
    /// Food closer than this drifts toward a head in front of it
    pub const ATTRACTION_RADIUS: f32 = 60.0;
    /// Drift distance per tick
    pub const DRIFT_SPEED: f32 = 2.5;
    /// Drifting food this close to the head is eaten
    pub const SNAP_DISTANCE: f32 = 4.0;
    /// Capacity gained per unit of food size
    pub const GROWTH_PER_SIZE: f32 = 0.5;
    /// Share of a dead entity's trail converted into food
    pub const DEATH_FRACTION: f32 = 0.5;
    /// Max offset applied to death food positions
    pub const DEATH_JITTER: f32 = 8.0;
    /// Number of colors in the client palette
    pub const PALETTE_SIZE: u8 = 12;
}

/// Spawn placement constants
pub mod spawn {
    /// Candidates sampled per placement attempt
    pub const CANDIDATES: usize = 24;
    /// Candidates are never sampled closer than this to the border
    pub const BORDER_MARGIN: f32 = 100.0;
    /// Candidates closer than this to the border are disqualified
    pub const BORDER_SAFE_DISTANCE: f32 = 250.0;
    /// Candidates closer than this to any occupant are disqualified
    pub const PLAYER_SAFE_DISTANCE: f32 = 200.0;
    /// Wall-clock budget for one placement attempt
    pub const TIME_BUDGET_MS: u64 = 15;
    /// Planner attempts before falling back to an unweighted point
    pub const RETRIES: u32 = 3;
    /// Post-spawn invulnerability
    pub const GOD_MODE_MS: u64 = 3_000;
    /// Input is ignored for this long after spawning
    pub const CONTROL_DELAY_MS: u64 = 400;
}

/// Anti-cheat constants
pub mod anticheat {
    /// Multiplier over the theoretical max distance before a move counts as a teleport
    pub const TELEPORT_TOLERANCE: f32 = 1.5;
    /// Extra multiplier in relaxed trust settings
    pub const RELAXED_TOLERANCE_MULTIPLIER: f32 = 2.0;
    /// Consecutive violations before death
    pub const TELEPORT_VIOLATION_LIMIT: u32 = 3;
    /// Trail points nearest the head that are never self-collision checked
    pub const SELF_COLLISION_SAFE_COUNT: usize = 12;
    /// Overlap must persist this long before it counts
    pub const SELF_COLLISION_GRACE_MS: u64 = 600;
    /// No input for this long kills a human entity
    pub const INACTIVITY_TIMEOUT_MS: u64 = 60_000;
    /// Heading only follows input received within this window
    pub const INPUT_RECENCY_MS: u64 = 1_500;
}

/// AI bot constants
pub mod ai {
    /// Target number of live bots
    pub const COUNT: usize = 12;
    pub const SPAWN_INTERVAL_MS: u64 = 2_000;
    pub const LIFETIME_MS: u64 = 180_000;
    /// Bot speed as a fraction of player base speed
    pub const SPEED_FRACTION: f32 = 0.75;
    pub const TURN_RATE: f32 = 0.08;
    pub const RETARGET_MIN_MS: u64 = 800;
    pub const RETARGET_MAX_MS: u64 = 3_000;
    /// Bots closer than this to the border head back toward the center
    pub const BORDER_AVOID_DISTANCE: f32 = 300.0;
}

/// Networking constants
pub mod net {
    /// Area-of-interest radius around each viewer
    pub const AOI_RADIUS: f32 = 1400.0;
    pub const BROADCAST_MIN_HZ: u32 = 8;
    pub const BROADCAST_MAX_HZ: u32 = 30;
    /// Throttle is re-evaluated at most this often
    pub const BROADCAST_CHECK_INTERVAL_MS: u64 = 2_000;
    /// Human count at which the player factor reaches sqrt(2)
    pub const BROADCAST_PLAYER_SCALE: f32 = 50.0;
    pub const LEADERBOARD_INTERVAL_MS: u64 = 1_000;
    pub const LEADERBOARD_SIZE: usize = 10;
}
