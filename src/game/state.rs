//! Simulation state definitions
//!
//! Entities (humans and bots share one record) and food items. The
//! simulation owns both registries; nothing in here is shared across threads.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{FoodConfig, MovementConfig};
use crate::util::vec2::Vec2;

/// Unique entity identifier (humans and bots share the id space)
pub type EntityId = u64;

/// Food identifier
pub type FoodId = u64;

/// Persistent account identifier owned by the session collaborator
pub type AccountId = Uuid;

/// Why an entity died. Serialized as the client-facing cause code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeathCause {
    Boundary,
    Teleport,
    SelfCollision,
    Inactivity,
    /// Head touched another entity's body
    Collision,
    /// Bot lifetime ran out
    Expired,
    Admin,
}

impl DeathCause {
    /// Every tick-driven death is blocked by god mode. Admin kills are
    /// forced removals and always apply.
    pub fn blocked_by_god_mode(&self) -> bool {
        !matches!(self, DeathCause::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeathCause::Boundary => "boundary",
            DeathCause::Teleport => "teleport",
            DeathCause::SelfCollision => "self-collision",
            DeathCause::Inactivity => "inactivity",
            DeathCause::Collision => "collision",
            DeathCause::Expired => "expired",
            DeathCause::Admin => "admin",
        }
    }
}

/// Lifecycle state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Active,
    /// Holds position, ignores input and most checks
    Frozen,
    /// Spectator: no physics, never collides, still receives snapshots
    Ghost,
    /// Death observed; finalized at the start of the next tick
    Dying {
        cause: DeathCause,
        killer: Option<EntityId>,
    },
}

impl EntityState {
    fn name(&self) -> &'static str {
        match self {
            EntityState::Active => "active",
            EntityState::Frozen => "frozen",
            EntityState::Ghost => "ghost",
            EntityState::Dying { .. } => "dying",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Cannot {action} an entity that is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error("Bots cannot be ghosts")]
    BotGhost,
    #[error("Entities cannot be created dying")]
    BornDying,
}

/// Account privileges relevant to collision trust
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trust {
    pub elevated: bool,
    pub admin: bool,
}

impl Trust {
    pub fn is_privileged(&self) -> bool {
        self.elevated || self.admin
    }
}

/// Identity fields sent to viewers only when they change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cosmetic {
    pub name: String,
    pub colors: Vec<String>,
    pub skin: Option<String>,
}

/// Bot steering state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotState {
    pub expires_at_ms: u64,
    pub target_heading: f32,
    pub next_retarget_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Human { account: Option<AccountId> },
    Bot(BotState),
}

/// A serpent. Humans and bots share this record.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Head position
    pub position: Vec2,
    /// Heading in radians
    pub heading: f32,
    /// Historical head positions, index 0 = newest
    pub trail: VecDeque<Vec2>,
    /// Size; also bounds the trail length
    pub capacity: f32,
    pub boosting: bool,
    /// Ticks spent boosting since the last capacity deduction
    pub boost_ticks: u32,
    pub state: EntityState,

    /// Heading requested by the last input
    pub input_heading: Option<f32>,
    pub last_input_at_ms: u64,

    pub teleport_violations: u32,
    /// Start of the current self-overlap streak
    pub self_collision_since_ms: Option<u64>,
    pub last_known_position: Vec2,
    pub last_known_at_ms: u64,

    pub spawned_at_ms: u64,
    pub god_mode_until_ms: u64,
    pub control_at_ms: u64,
    /// Kills scored during this life
    pub kills: u32,

    pub id: EntityId,
    pub kind: EntityKind,
    pub trust: Trust,
    pub cosmetic: Cosmetic,
}

impl Entity {
    /// Create an entity at `position`. Rejects dying entities and ghost bots.
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        state: EntityState,
        position: Vec2,
        heading: f32,
        movement: &MovementConfig,
        now_ms: u64,
    ) -> Result<Self, StateError> {
        match (&kind, state) {
            (_, EntityState::Dying { .. }) => return Err(StateError::BornDying),
            (EntityKind::Bot(_), EntityState::Ghost) => return Err(StateError::BotGhost),
            _ => {}
        }

        Ok(Self {
            position,
            heading,
            trail: VecDeque::with_capacity(movement.initial_capacity as usize + 1),
            capacity: movement.initial_capacity,
            boosting: false,
            boost_ticks: 0,
            state,
            input_heading: None,
            last_input_at_ms: now_ms,
            teleport_violations: 0,
            self_collision_since_ms: None,
            last_known_position: position,
            last_known_at_ms: now_ms,
            spawned_at_ms: now_ms,
            god_mode_until_ms: now_ms + movement.god_mode_ms,
            control_at_ms: now_ms + movement.control_delay_ms,
            kills: 0,
            id,
            kind,
            trust: Trust::default(),
            cosmetic: Cosmetic::default(),
        })
    }

    pub fn with_trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_cosmetic(mut self, cosmetic: Cosmetic) -> Self {
        self.cosmetic = cosmetic;
        self
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, EntityKind::Bot(_))
    }

    pub fn is_human(&self) -> bool {
        matches!(self.kind, EntityKind::Human { .. })
    }

    pub fn account(&self) -> Option<AccountId> {
        match self.kind {
            EntityKind::Human { account } => account,
            EntityKind::Bot(_) => None,
        }
    }

    pub fn bot_state(&self) -> Option<&BotState> {
        match &self.kind {
            EntityKind::Bot(bot) => Some(bot),
            EntityKind::Human { .. } => None,
        }
    }

    pub fn bot_state_mut(&mut self) -> Option<&mut BotState> {
        match &mut self.kind {
            EntityKind::Bot(bot) => Some(bot),
            EntityKind::Human { .. } => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }

    pub fn is_frozen(&self) -> bool {
        self.state == EntityState::Frozen
    }

    pub fn is_ghost(&self) -> bool {
        self.state == EntityState::Ghost
    }

    pub fn is_dying(&self) -> bool {
        matches!(self.state, EntityState::Dying { .. })
    }

    /// Takes part in physics and collisions (active or frozen)
    pub fn is_live(&self) -> bool {
        matches!(self.state, EntityState::Active | EntityState::Frozen)
    }

    pub fn has_god_mode(&self, now_ms: u64) -> bool {
        now_ms < self.god_mode_until_ms
    }

    pub fn has_control(&self, now_ms: u64) -> bool {
        now_ms >= self.control_at_ms
    }

    /// Max trail length: `min(floor(capacity), hard_cap)`
    pub fn trail_limit(&self, hard_cap: usize) -> usize {
        (self.capacity.max(0.0).floor() as usize).min(hard_cap)
    }

    /// Drop the oldest trail points beyond the limit
    pub fn trim_trail(&mut self, hard_cap: usize) {
        let limit = self.trail_limit(hard_cap);
        self.trail.truncate(limit);
    }

    /// Record a new head position at the front of the trail
    pub fn push_trail(&mut self) {
        self.trail.push_front(self.position);
    }

    pub fn freeze(&mut self) -> Result<(), StateError> {
        match self.state {
            EntityState::Active => {
                self.state = EntityState::Frozen;
                Ok(())
            }
            other => Err(StateError::InvalidTransition {
                from: other.name(),
                action: "freeze",
            }),
        }
    }

    pub fn unfreeze(&mut self) -> Result<(), StateError> {
        match self.state {
            EntityState::Frozen => {
                self.state = EntityState::Active;
                Ok(())
            }
            other => Err(StateError::InvalidTransition {
                from: other.name(),
                action: "unfreeze",
            }),
        }
    }

    /// Mark for death. The first death wins; ghosts cannot die.
    pub fn mark_dying(&mut self, cause: DeathCause, killer: Option<EntityId>) -> Result<(), StateError> {
        match self.state {
            EntityState::Active | EntityState::Frozen => {
                self.state = EntityState::Dying { cause, killer };
                Ok(())
            }
            other => Err(StateError::InvalidTransition {
                from: other.name(),
                action: "kill",
            }),
        }
    }

    /// Pending death, if any
    pub fn death(&self) -> Option<(DeathCause, Option<EntityId>)> {
        match self.state {
            EntityState::Dying { cause, killer } => Some((cause, killer)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodKind {
    Ordinary,
    /// Boost exhaust; its owner cannot eat it
    Exhaust { owner: EntityId },
}

/// Collectible food item
#[derive(Debug, Clone)]
pub struct Food {
    pub id: FoodId,
    pub position: Vec2,
    /// Radius
    pub size: f32,
    /// Palette index
    pub color: u8,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub kind: FoodKind,
    /// Set when eaten; swept at the end of the tick
    pub consumed: bool,
}

impl Food {
    pub fn ordinary(id: FoodId, position: Vec2, size: f32, color: u8, now_ms: u64, config: &FoodConfig) -> Self {
        Self {
            id,
            position,
            size,
            color,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + config.lifetime_ms,
            kind: FoodKind::Ordinary,
            consumed: false,
        }
    }

    pub fn exhaust(id: FoodId, owner: EntityId, position: Vec2, color: u8, now_ms: u64, config: &FoodConfig) -> Self {
        Self {
            id,
            position,
            size: config.exhaust_size,
            color,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + config.exhaust_lifetime_ms,
            kind: FoodKind::Exhaust { owner },
            consumed: false,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// 1.0 until expiry, then fades linearly to 0 over `fade_ms`
    pub fn opacity(&self, now_ms: u64, fade_ms: u64) -> f32 {
        if now_ms <= self.expires_at_ms {
            return 1.0;
        }
        if fade_ms == 0 {
            return 0.0;
        }
        let faded = (now_ms - self.expires_at_ms) as f32 / fade_ms as f32;
        (1.0 - faded).clamp(0.0, 1.0)
    }

    pub fn is_faded(&self, now_ms: u64, fade_ms: u64) -> bool {
        now_ms >= self.expires_at_ms + fade_ms
    }

    /// Whether `entity` may eat this item
    pub fn edible_by(&self, entity: EntityId) -> bool {
        !self.consumed
            && match self.kind {
                FoodKind::Ordinary => true,
                FoodKind::Exhaust { owner } => owner != entity,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human(state: EntityState) -> Result<Entity, StateError> {
        Entity::new(
            1,
            EntityKind::Human { account: None },
            state,
            Vec2::new(100.0, 100.0),
            0.0,
            &MovementConfig::default(),
            1_000,
        )
    }

    fn bot(state: EntityState) -> Result<Entity, StateError> {
        let brain = BotState {
            expires_at_ms: 10_000,
            target_heading: 0.0,
            next_retarget_ms: 0,
        };
        Entity::new(
            2,
            EntityKind::Bot(brain),
            state,
            Vec2::new(100.0, 100.0),
            0.0,
            &MovementConfig::default(),
            1_000,
        )
    }

    #[test]
    fn test_new_entity_defaults() {
        let entity = human(EntityState::Active).unwrap();
        assert!(entity.is_active());
        assert!(entity.is_human());
        assert!(entity.trail.is_empty());
        assert_eq!(entity.capacity, MovementConfig::default().initial_capacity);
        assert!(entity.has_god_mode(1_000));
        assert!(!entity.has_control(1_000));
    }

    #[test]
    fn test_bot_ghost_rejected() {
        assert_eq!(bot(EntityState::Ghost).unwrap_err(), StateError::BotGhost);
        assert!(bot(EntityState::Active).is_ok());
        assert!(human(EntityState::Ghost).is_ok());
    }

    #[test]
    fn test_cannot_spawn_dying() {
        let dying = EntityState::Dying {
            cause: DeathCause::Admin,
            killer: None,
        };
        assert_eq!(human(dying).unwrap_err(), StateError::BornDying);
    }

    #[test]
    fn test_transition_table() {
        let mut entity = human(EntityState::Active).unwrap();
        assert!(entity.unfreeze().is_err());
        entity.freeze().unwrap();
        assert!(entity.is_frozen());
        assert!(entity.freeze().is_err());
        entity.unfreeze().unwrap();
        assert!(entity.is_active());

        entity.freeze().unwrap();
        entity.mark_dying(DeathCause::Admin, None).unwrap();
        assert_eq!(entity.death(), Some((DeathCause::Admin, None)));

        // First death wins
        assert!(entity.mark_dying(DeathCause::Boundary, Some(9)).is_err());
        assert_eq!(entity.death(), Some((DeathCause::Admin, None)));
        assert!(entity.freeze().is_err());
        assert!(entity.unfreeze().is_err());
    }

    #[test]
    fn test_ghost_transitions_rejected() {
        let mut ghost = human(EntityState::Ghost).unwrap();
        assert!(ghost.freeze().is_err());
        assert!(ghost.unfreeze().is_err());
        assert!(ghost.mark_dying(DeathCause::Collision, None).is_err());
        assert!(ghost.is_ghost());
    }

    #[test]
    fn test_trail_limit() {
        let mut entity = human(EntityState::Active).unwrap();
        entity.capacity = 5.9;
        assert_eq!(entity.trail_limit(1_000), 5);
        assert_eq!(entity.trail_limit(3), 3);

        for i in 0..10 {
            entity.position = Vec2::new(i as f32, 0.0);
            entity.push_trail();
        }
        entity.trim_trail(1_000);
        assert_eq!(entity.trail.len(), 5);
        // Newest stays at the front
        assert_eq!(entity.trail[0], Vec2::new(9.0, 0.0));
    }

    #[test]
    fn test_death_cause_codes() {
        assert_eq!(
            serde_json::to_string(&DeathCause::SelfCollision).unwrap(),
            "\"self-collision\""
        );
        assert_eq!(DeathCause::Inactivity.as_str(), "inactivity");
        assert!(DeathCause::Boundary.blocked_by_god_mode());
        assert!(DeathCause::Teleport.blocked_by_god_mode());
        assert!(DeathCause::Inactivity.blocked_by_god_mode());
        assert!(!DeathCause::Admin.blocked_by_god_mode());
    }

    #[test]
    fn test_food_fade() {
        let config = FoodConfig::default();
        let food = Food::ordinary(1, Vec2::ZERO, 4.0, 0, 0, &config);
        let expiry = config.lifetime_ms;
        assert_eq!(food.opacity(expiry, 2_000), 1.0);
        assert!((food.opacity(expiry + 1_000, 2_000) - 0.5).abs() < 1e-6);
        assert_eq!(food.opacity(expiry + 5_000, 2_000), 0.0);
        assert!(!food.is_faded(expiry + 1_999, 2_000));
        assert!(food.is_faded(expiry + 2_000, 2_000));
    }

    #[test]
    fn test_exhaust_not_edible_by_owner() {
        let config = FoodConfig::default();
        let mut food = Food::exhaust(1, 7, Vec2::ZERO, 0, 0, &config);
        assert!(!food.edible_by(7));
        assert!(food.edible_by(8));
        food.consumed = true;
        assert!(!food.edible_by(8));
    }
}
