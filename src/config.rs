//! Typed simulation configuration
//!
//! Every tunable lives in [`SimConfig`], grouped by the component that reads
//! it. Values come from `Default`, then the environment
//! ([`SimConfig::load_or_default`]), then optional admin updates
//! ([`SimConfig::apply_update`]) which validate each field on its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::game::constants::{ai, anticheat, boost, food, net, physics, spawn, trail, world};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown trust mode '{0}' (expected high, medium or low)")]
    InvalidTrustMode(String),
    #[error("Unknown map shape '{0}' (expected rectangle or circle)")]
    InvalidMapShape(String),
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("Field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("Unknown config field '{0}'")]
    UnknownField(String),
    #[error("Config update must be a JSON object")]
    NotAnObject,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How far the server trusts clients about collisions
///
/// - `High`: server-authoritative, every entity is checked by the worker pool
/// - `Medium`: elevated/admin accounts self-report, everyone else is checked
/// - `Low`: humans self-report; bots are still checked by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustMode {
    High,
    Medium,
    Low,
}

impl FromStr for TrustMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "strict" => Ok(TrustMode::High),
            "medium" => Ok(TrustMode::Medium),
            "low" => Ok(TrustMode::Low),
            _ => Err(ConfigError::InvalidTrustMode(s.to_string())),
        }
    }
}

impl fmt::Display for TrustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrustMode::High => "high",
            TrustMode::Medium => "medium",
            TrustMode::Low => "low",
        };
        f.write_str(name)
    }
}

/// Playable area shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapShape {
    Rectangle,
    /// Disc inscribed in the width x height box
    Circle,
}

impl FromStr for MapShape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" | "square" => Ok(MapShape::Rectangle),
            "circle" | "disc" => Ok(MapShape::Circle),
            _ => Err(ConfigError::InvalidMapShape(s.to_string())),
        }
    }
}

/// Map geometry. World coordinates run from (0, 0) to (width, height).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub shape: MapShape,
    pub width: f32,
    pub height: f32,
    /// Spatial index cell size
    pub cell_size: f32,
}

impl MapConfig {
    /// Largest useful view radius
    pub fn diagonal(&self) -> f32 {
        self.width.hypot(self.height)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            shape: MapShape::Rectangle,
            width: world::WIDTH,
            height: world::HEIGHT,
            cell_size: world::SPATIAL_CELL_SIZE,
        }
    }
}

/// Per-tick movement and growth tuning
#[derive(Debug, Clone)]
pub struct MovementConfig {
    pub base_speed: f32,
    pub boost_multiplier: f32,
    pub turn_rate: f32,
    pub collision_radius: f32,
    pub initial_capacity: f32,
    pub trail_hard_cap: usize,
    pub body_sample_stride: usize,
    pub min_boost_capacity: f32,
    pub boost_cost_interval_ticks: u32,
    pub god_mode_ms: u64,
    pub control_delay_ms: u64,
    pub input_recency_ms: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: physics::BASE_SPEED,
            boost_multiplier: physics::BOOST_MULTIPLIER,
            turn_rate: physics::TURN_RATE,
            collision_radius: physics::COLLISION_RADIUS,
            initial_capacity: trail::INITIAL_CAPACITY,
            trail_hard_cap: trail::HARD_CAP,
            body_sample_stride: trail::BODY_SAMPLE_STRIDE,
            min_boost_capacity: boost::MIN_CAPACITY,
            boost_cost_interval_ticks: boost::COST_INTERVAL_TICKS,
            god_mode_ms: spawn::GOD_MODE_MS,
            control_delay_ms: spawn::CONTROL_DELAY_MS,
            input_recency_ms: anticheat::INPUT_RECENCY_MS,
        }
    }
}

/// Food spawning, aging and consumption
#[derive(Debug, Clone)]
pub struct FoodConfig {
    pub spawn_interval_ms: u64,
    pub spawn_batch: usize,
    pub max_count: usize,
    pub min_size: f32,
    pub max_size: f32,
    pub lifetime_ms: u64,
    pub fade_ms: u64,
    pub exhaust_lifetime_ms: u64,
    pub exhaust_size: f32,
    pub attraction_radius: f32,
    pub drift_speed: f32,
    pub snap_distance: f32,
    pub growth_per_size: f32,
    pub death_fraction: f32,
    pub death_jitter: f32,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ms: food::SPAWN_INTERVAL_MS,
            spawn_batch: food::SPAWN_BATCH,
            max_count: food::MAX_COUNT,
            min_size: food::MIN_SIZE,
            max_size: food::MAX_SIZE,
            lifetime_ms: food::LIFETIME_MS,
            fade_ms: food::FADE_MS,
            exhaust_lifetime_ms: boost::EXHAUST_LIFETIME_MS,
            exhaust_size: boost::EXHAUST_SIZE,
            attraction_radius: food::ATTRACTION_RADIUS,
            drift_speed: food::DRIFT_SPEED,
            snap_distance: food::SNAP_DISTANCE,
            growth_per_size: food::GROWTH_PER_SIZE,
            death_fraction: food::DEATH_FRACTION,
            death_jitter: food::DEATH_JITTER,
        }
    }
}

/// Spawn placement search
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub candidates: usize,
    pub border_margin: f32,
    pub border_safe_distance: f32,
    pub player_safe_distance: f32,
    pub time_budget_ms: u64,
    pub retries: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            candidates: spawn::CANDIDATES,
            border_margin: spawn::BORDER_MARGIN,
            border_safe_distance: spawn::BORDER_SAFE_DISTANCE,
            player_safe_distance: spawn::PLAYER_SAFE_DISTANCE,
            time_budget_ms: spawn::TIME_BUDGET_MS,
            retries: spawn::RETRIES,
        }
    }
}

/// Server-side cheat detection thresholds
#[derive(Debug, Clone)]
pub struct AntiCheatConfig {
    pub teleport_tolerance: f32,
    pub relaxed_tolerance_multiplier: f32,
    pub teleport_violation_limit: u32,
    pub self_collision_safe_count: usize,
    pub self_collision_grace_ms: u64,
    pub inactivity_timeout_ms: u64,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            teleport_tolerance: anticheat::TELEPORT_TOLERANCE,
            relaxed_tolerance_multiplier: anticheat::RELAXED_TOLERANCE_MULTIPLIER,
            teleport_violation_limit: anticheat::TELEPORT_VIOLATION_LIMIT,
            self_collision_safe_count: anticheat::SELF_COLLISION_SAFE_COUNT,
            self_collision_grace_ms: anticheat::SELF_COLLISION_GRACE_MS,
            inactivity_timeout_ms: anticheat::INACTIVITY_TIMEOUT_MS,
        }
    }
}

/// AI bot population and steering
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub count: usize,
    pub spawn_interval_ms: u64,
    pub lifetime_ms: u64,
    pub speed_fraction: f32,
    pub turn_rate: f32,
    pub retarget_min_ms: u64,
    pub retarget_max_ms: u64,
    pub border_avoid_distance: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            count: ai::COUNT,
            spawn_interval_ms: ai::SPAWN_INTERVAL_MS,
            lifetime_ms: ai::LIFETIME_MS,
            speed_fraction: ai::SPEED_FRACTION,
            turn_rate: ai::TURN_RATE,
            retarget_min_ms: ai::RETARGET_MIN_MS,
            retarget_max_ms: ai::RETARGET_MAX_MS,
            border_avoid_distance: ai::BORDER_AVOID_DISTANCE,
        }
    }
}

/// AoI snapshots, broadcast throttling and leaderboard cadence
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub aoi_radius: f32,
    pub broadcast_min_hz: u32,
    pub broadcast_max_hz: u32,
    pub broadcast_check_interval_ms: u64,
    pub broadcast_player_scale: f32,
    pub leaderboard_interval_ms: u64,
    pub leaderboard_size: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            aoi_radius: net::AOI_RADIUS,
            broadcast_min_hz: net::BROADCAST_MIN_HZ,
            broadcast_max_hz: net::BROADCAST_MAX_HZ,
            broadcast_check_interval_ms: net::BROADCAST_CHECK_INTERVAL_MS,
            broadcast_player_scale: net::BROADCAST_PLAYER_SCALE,
            leaderboard_interval_ms: net::LEADERBOARD_INTERVAL_MS,
            leaderboard_size: net::LEADERBOARD_SIZE,
        }
    }
}

impl NetConfig {
    /// Shortest allowed broadcast interval
    pub fn min_interval_ms(&self) -> u64 {
        1000 / self.broadcast_max_hz.max(1) as u64
    }

    /// Longest allowed broadcast interval
    pub fn max_interval_ms(&self) -> u64 {
        1000 / self.broadcast_min_hz.max(1) as u64
    }
}

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub target_fps: u32,
    pub trust_mode: TrustMode,
    /// Collision worker threads
    pub collision_workers: usize,
    /// Keep food/bot spawners running with no humans connected
    pub spawn_without_humans: bool,
    pub map: MapConfig,
    pub movement: MovementConfig,
    pub food: FoodConfig,
    pub spawn: SpawnConfig,
    pub anticheat: AntiCheatConfig,
    pub bots: BotConfig,
    pub net: NetConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            target_fps: physics::TARGET_FPS,
            trust_mode: TrustMode::High,
            collision_workers: default_worker_count(),
            spawn_without_humans: false,
            map: MapConfig::default(),
            movement: MovementConfig::default(),
            food: FoodConfig::default(),
            spawn: SpawnConfig::default(),
            anticheat: AntiCheatConfig::default(),
            bots: BotConfig::default(),
            net: NetConfig::default(),
        }
    }
}

/// One worker per core, leaving one for the tick thread
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Result of an admin config update
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdateReport {
    /// Fields that were applied
    pub applied: Vec<String>,
    /// Fields that were rejected, with the reason
    pub skipped: Vec<(String, ConfigError)>,
}

impl ConfigUpdateReport {
    pub fn changed(&self, field: &str) -> bool {
        self.applied.iter().any(|f| f == field)
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(shape) = std::env::var("MAP_SHAPE") {
            if let Err(e) = config.set_map_shape(&shape) {
                warn!("{}, using default", e);
            }
        }

        if let Ok(mode) = std::env::var("TRUST_MODE") {
            if let Err(e) = config.set_trust_mode(&mode) {
                warn!("{}, using default", e);
            }
        }

        if let Some(fps) = env_parse::<u32>("TARGET_FPS") {
            if let Err(e) = config.set_target_fps(fps) {
                warn!("{}, using default", e);
            }
        }

        if let Some(width) = env_parse::<f32>("MAP_WIDTH") {
            if width.is_finite() && width > 0.0 {
                config.map.width = width;
            } else {
                warn!("MAP_WIDTH must be > 0, using default");
            }
        }

        if let Some(height) = env_parse::<f32>("MAP_HEIGHT") {
            if height.is_finite() && height > 0.0 {
                config.map.height = height;
            } else {
                warn!("MAP_HEIGHT must be > 0, using default");
            }
        }

        if let Some(count) = env_parse::<usize>("BOT_COUNT") {
            if count <= 1000 {
                config.bots.count = count;
            } else {
                warn!("BOT_COUNT must be 0-1000, using default");
            }
        }

        if let Some(radius) = env_parse::<f32>("AOI_RADIUS") {
            if radius.is_finite() && radius > 0.0 {
                config.net.aoi_radius = radius;
            } else {
                warn!("AOI_RADIUS must be > 0, using default");
            }
        }

        if let Some(workers) = env_parse::<usize>("COLLISION_WORKERS") {
            if (1..=256).contains(&workers) {
                config.collision_workers = workers;
            } else {
                warn!("COLLISION_WORKERS must be 1-256, using default");
            }
        }

        if let Some(enabled) = env_parse::<bool>("SPAWN_WITHOUT_HUMANS") {
            config.spawn_without_humans = enabled;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.map.width > 0.0 && self.map.height > 0.0) {
            return Err(ConfigError::Invalid("map dimensions must be positive".into()));
        }
        if self.map.cell_size <= 0.0 {
            return Err(ConfigError::Invalid("cell_size must be positive".into()));
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be at least 1".into()));
        }
        if self.collision_workers == 0 {
            return Err(ConfigError::Invalid("collision_workers must be at least 1".into()));
        }
        if self.movement.collision_radius <= 0.0 {
            return Err(ConfigError::Invalid("collision_radius must be positive".into()));
        }
        if self.movement.trail_hard_cap == 0 || self.movement.body_sample_stride == 0 {
            return Err(ConfigError::Invalid("trail_hard_cap and body_sample_stride must be at least 1".into()));
        }
        if self.food.min_size > self.food.max_size {
            return Err(ConfigError::Invalid("food min_size cannot exceed max_size".into()));
        }
        if self.bots.retarget_min_ms > self.bots.retarget_max_ms {
            return Err(ConfigError::Invalid("bot retarget_min_ms cannot exceed retarget_max_ms".into()));
        }
        if !(self.net.aoi_radius > 0.0 && self.net.aoi_radius <= self.map.diagonal()) {
            return Err(ConfigError::Invalid("aoi_radius must be within the map diagonal".into()));
        }
        if self.net.broadcast_min_hz == 0 || self.net.broadcast_min_hz > self.net.broadcast_max_hz {
            return Err(ConfigError::Invalid("broadcast_min_hz must be 1..=broadcast_max_hz".into()));
        }
        Ok(())
    }

    /// Tick interval: `max(16ms, 1000 / target_fps)`
    pub fn frame_interval_ms(&self) -> u64 {
        (1000 / self.target_fps.max(1) as u64).max(physics::MIN_FRAME_INTERVAL_MS)
    }

    /// Fastest legal movement, in world units per millisecond
    pub fn max_speed_per_ms(&self) -> f32 {
        self.movement.base_speed * self.movement.boost_multiplier / self.frame_interval_ms() as f32
    }

    pub fn set_trust_mode(&mut self, value: &str) -> Result<(), ConfigError> {
        self.trust_mode = value.parse()?;
        Ok(())
    }

    pub fn set_map_shape(&mut self, value: &str) -> Result<(), ConfigError> {
        self.map.shape = value.parse()?;
        Ok(())
    }

    pub fn set_target_fps(&mut self, fps: u32) -> Result<(), ConfigError> {
        if !(1..=240).contains(&fps) {
            return Err(ConfigError::OutOfRange {
                field: "targetFps",
                value: fps.to_string(),
            });
        }
        self.target_fps = fps;
        Ok(())
    }

    /// Apply an admin update (JSON object keyed by camelCase field name).
    ///
    /// Each field is converted and validated on its own; a bad field is
    /// skipped with a warning and the rest of the update still applies.
    pub fn apply_update(&mut self, update: &Value) -> ConfigUpdateReport {
        let mut report = ConfigUpdateReport::default();

        let Some(fields) = update.as_object() else {
            warn!("Rejected config update: not a JSON object");
            report.skipped.push((String::new(), ConfigError::NotAnObject));
            return report;
        };

        for (key, value) in fields {
            match self.apply_field(key, value) {
                Ok(()) => report.applied.push(key.clone()),
                Err(e) => {
                    warn!("Skipping config field '{}': {}", key, e);
                    report.skipped.push((key.clone(), e));
                }
            }
        }

        report
    }

    fn apply_field(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        match key {
            "trustMode" => self.set_trust_mode(as_str(key, value)?),
            "mapShape" => self.set_map_shape(as_str(key, value)?),
            "targetFps" => {
                let fps = as_u64(key, value)?;
                let fps = u32::try_from(fps).map_err(|_| ConfigError::OutOfRange {
                    field: "targetFps",
                    value: fps.to_string(),
                })?;
                self.set_target_fps(fps)
            }
            "mapWidth" => {
                self.map.width = as_positive_f32("mapWidth", value)?;
                Ok(())
            }
            "mapHeight" => {
                self.map.height = as_positive_f32("mapHeight", value)?;
                Ok(())
            }
            "aoiRadius" => {
                let radius = as_positive_f32("aoiRadius", value)?;
                if radius > self.map.diagonal() {
                    return Err(ConfigError::OutOfRange {
                        field: "aoiRadius",
                        value: radius.to_string(),
                    });
                }
                self.net.aoi_radius = radius;
                Ok(())
            }
            "collisionRadius" => {
                self.movement.collision_radius = as_positive_f32("collisionRadius", value)?;
                Ok(())
            }
            "baseSpeed" => {
                self.movement.base_speed = as_positive_f32("baseSpeed", value)?;
                Ok(())
            }
            "turnRate" => {
                self.movement.turn_rate = as_positive_f32("turnRate", value)?;
                Ok(())
            }
            "teleportTolerance" => {
                self.anticheat.teleport_tolerance = as_positive_f32("teleportTolerance", value)?;
                Ok(())
            }
            "botCount" => {
                self.bots.count = as_u64(key, value)? as usize;
                Ok(())
            }
            "maxFood" => {
                self.food.max_count = as_u64(key, value)? as usize;
                Ok(())
            }
            "godModeMs" => {
                self.movement.god_mode_ms = as_u64(key, value)?;
                Ok(())
            }
            "inactivityTimeoutMs" => {
                let ms = as_u64(key, value)?;
                if ms == 0 {
                    return Err(ConfigError::OutOfRange {
                        field: "inactivityTimeoutMs",
                        value: ms.to_string(),
                    });
                }
                self.anticheat.inactivity_timeout_ms = ms;
                Ok(())
            }
            "broadcastMinHz" => {
                let hz = as_u64(key, value)?;
                if hz == 0 || hz > self.net.broadcast_max_hz as u64 {
                    return Err(ConfigError::OutOfRange {
                        field: "broadcastMinHz",
                        value: hz.to_string(),
                    });
                }
                self.net.broadcast_min_hz = hz as u32;
                Ok(())
            }
            "broadcastMaxHz" => {
                let hz = as_u64(key, value)?;
                if hz < self.net.broadcast_min_hz as u64 || hz > 1000 {
                    return Err(ConfigError::OutOfRange {
                        field: "broadcastMaxHz",
                        value: hz.to_string(),
                    });
                }
                self.net.broadcast_max_hz = hz as u32;
                Ok(())
            }
            _ => Err(ConfigError::UnknownField(key.to_string())),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

fn as_str<'a>(field: &str, value: &'a Value) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::WrongType {
        field: field.to_string(),
        expected: "a string",
    })
}

fn as_u64(field: &str, value: &Value) -> Result<u64, ConfigError> {
    value.as_u64().ok_or_else(|| ConfigError::WrongType {
        field: field.to_string(),
        expected: "a non-negative integer",
    })
}

fn as_positive_f32(field: &'static str, value: &Value) -> Result<f32, ConfigError> {
    let raw = value.as_f64().ok_or_else(|| ConfigError::WrongType {
        field: field.to_string(),
        expected: "a number",
    })?;
    let parsed = raw as f32;
    if parsed.is_finite() && parsed > 0.0 {
        Ok(parsed)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.trust_mode, TrustMode::High);
        assert!(config.collision_workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.target_fps > 0);
    }

    #[test]
    fn test_frame_interval_has_floor() {
        let mut config = SimConfig::default();
        config.target_fps = 60;
        assert_eq!(config.frame_interval_ms(), 16);
        config.target_fps = 240;
        assert_eq!(config.frame_interval_ms(), 16);
        config.target_fps = 20;
        assert_eq!(config.frame_interval_ms(), 50);
    }

    #[test]
    fn test_trust_mode_parsing() {
        assert_eq!("high".parse::<TrustMode>(), Ok(TrustMode::High));
        assert_eq!(" Medium ".parse::<TrustMode>(), Ok(TrustMode::Medium));
        assert_eq!("LOW".parse::<TrustMode>(), Ok(TrustMode::Low));
        assert!(matches!(
            "paranoid".parse::<TrustMode>(),
            Err(ConfigError::InvalidTrustMode(_))
        ));
    }

    #[test]
    fn test_setters_reject_invalid_enums() {
        let mut config = SimConfig::default();
        assert!(config.set_map_shape("hexagon").is_err());
        assert_eq!(config.map.shape, MapShape::Rectangle);
        assert!(config.set_map_shape("circle").is_ok());
        assert_eq!(config.map.shape, MapShape::Circle);
        assert!(config.set_trust_mode("sometimes").is_err());
        assert_eq!(config.trust_mode, TrustMode::High);
    }

    #[test]
    fn test_update_skips_bad_fields_only() {
        let mut config = SimConfig::default();
        let report = config.apply_update(&json!({
            "trustMode": "low",
            "mapShape": "triangle",
            "aoiRadius": -5.0,
            "botCount": 3,
            "nonsense": true,
        }));

        assert_eq!(config.trust_mode, TrustMode::Low);
        assert_eq!(config.bots.count, 3);
        assert_eq!(config.map.shape, MapShape::Rectangle);
        assert_eq!(config.net.aoi_radius, net::AOI_RADIUS);

        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.skipped.len(), 3);
        assert!(report.changed("trustMode"));
        assert!(!report.changed("mapShape"));
    }

    #[test]
    fn test_update_caps_aoi_radius_at_map_diagonal() {
        let mut config = SimConfig::default();
        let report = config.apply_update(&json!({ "aoiRadius": 1e12 }));
        assert!(matches!(
            report.skipped[0].1,
            ConfigError::OutOfRange { field: "aoiRadius", .. }
        ));
        assert_eq!(config.net.aoi_radius, net::AOI_RADIUS);

        config.net.aoi_radius = config.map.diagonal() * 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_update_wrong_type() {
        let mut config = SimConfig::default();
        let report = config.apply_update(&json!({ "targetFps": "fast" }));
        assert!(matches!(report.skipped[0].1, ConfigError::WrongType { .. }));
        assert_eq!(config.target_fps, 60);
    }

    #[test]
    fn test_update_not_object() {
        let mut config = SimConfig::default();
        let report = config.apply_update(&json!([1, 2, 3]));
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped[0].1, ConfigError::NotAnObject);
    }

    #[test]
    fn test_validate_rejects_bad_broadcast_range() {
        let mut config = SimConfig::default();
        config.net.broadcast_min_hz = 50;
        config.net.broadcast_max_hz = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_speed_per_ms() {
        let config = SimConfig::default();
        // 3.0 * 2.0 / 16ms
        assert!((config.max_speed_per_ms() - 0.375).abs() < 1e-6);
    }
}
