use tracing::debug;

use crate::config::{AntiCheatConfig, TrustMode};
use crate::game::collision::point_segment_distance_sq;
use crate::game::state::{DeathCause, Entity, Trust};
use crate::net::protocol::PlayerInput;
use crate::util::vec2::Vec2;

/// Violations detected by the anti-cheat system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheatViolation {
    #[error("Moved {distance:.1} units, allowed {allowed:.1}")]
    Teleport { distance: f32, allowed: f32 },
    #[error("Head overlapped own body for {overlap_ms}ms")]
    SelfCollision { overlap_ms: u64 },
    #[error("No input for {idle_ms}ms")]
    Inactivity { idle_ms: u64 },
    #[error("NaN or Infinity in input values")]
    InvalidFloats,
}

impl CheatViolation {
    /// Death cause for violations that kill
    pub fn death_cause(&self) -> Option<DeathCause> {
        match self {
            CheatViolation::Teleport { .. } => Some(DeathCause::Teleport),
            CheatViolation::SelfCollision { .. } => Some(DeathCause::SelfCollision),
            CheatViolation::Inactivity { .. } => Some(DeathCause::Inactivity),
            CheatViolation::InvalidFloats => None,
        }
    }
}

/// Server-side movement and input validation
#[derive(Debug, Clone)]
pub struct AntiCheatValidator {
    config: AntiCheatConfig,
}

impl AntiCheatValidator {
    pub fn new(config: AntiCheatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AntiCheatConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AntiCheatConfig) {
        self.config = config;
    }

    /// Reject inputs carrying NaN or Infinity
    pub fn validate_input(&self, input: &PlayerInput) -> Result<(), CheatViolation> {
        if !input.heading.is_finite() {
            return Err(CheatViolation::InvalidFloats);
        }
        Ok(())
    }

    /// Teleport tolerance, widened in low trust mode and for privileged
    /// accounts in medium trust mode
    pub fn tolerance_for(&self, mode: TrustMode, trust: Trust) -> f32 {
        let relaxed = match mode {
            TrustMode::High => false,
            TrustMode::Medium => trust.is_privileged(),
            TrustMode::Low => true,
        };
        if relaxed {
            self.config.teleport_tolerance * self.config.relaxed_tolerance_multiplier
        } else {
            self.config.teleport_tolerance
        }
    }

    /// `distance > max_speed_per_ms * elapsed_ms * tolerance`
    #[inline]
    pub fn exceeds_teleport(&self, distance: f32, max_speed_per_ms: f32, elapsed_ms: u64, tolerance: f32) -> bool {
        distance > max_speed_per_ms * elapsed_ms as f32 * tolerance
    }

    /// Compare against the last known position and update the counter.
    ///
    /// Elapsed time is floored at one frame so back-to-back ticks on a
    /// stalled clock are not flagged. A legal move resets the counter to 0.
    pub fn check_teleport(
        &self,
        entity: &mut Entity,
        max_speed_per_ms: f32,
        frame_interval_ms: u64,
        tolerance: f32,
        now_ms: u64,
    ) -> Result<(), CheatViolation> {
        let elapsed_ms = now_ms
            .saturating_sub(entity.last_known_at_ms)
            .max(frame_interval_ms);
        let distance = entity.position.distance_to(entity.last_known_position);

        entity.last_known_position = entity.position;
        entity.last_known_at_ms = now_ms;

        if !self.exceeds_teleport(distance, max_speed_per_ms, elapsed_ms, tolerance) {
            entity.teleport_violations = 0;
            return Ok(());
        }

        entity.teleport_violations += 1;
        debug!(
            "Entity {} teleport violation {}/{}",
            entity.id, entity.teleport_violations, self.config.teleport_violation_limit
        );

        if entity.teleport_violations >= self.config.teleport_violation_limit {
            return Err(CheatViolation::Teleport {
                distance,
                allowed: max_speed_per_ms * elapsed_ms as f32 * tolerance,
            });
        }
        Ok(())
    }

    /// Whether `head` touches any own-trail segment past the safe count
    pub fn self_overlap<'a, I>(&self, head: Vec2, trail: I, radius: f32) -> bool
    where
        I: Iterator<Item = &'a Vec2>,
    {
        let radius_sq = radius * radius;
        let mut older = trail.skip(self.config.self_collision_safe_count);
        let Some(mut prev) = older.next().copied() else {
            return false;
        };
        for point in older {
            if point_segment_distance_sq(head, prev, *point) < radius_sq {
                return true;
            }
            prev = *point;
        }
        false
    }

    /// Sustained self-overlap past the grace period
    pub fn check_self_collision(&self, entity: &mut Entity, radius: f32, now_ms: u64) -> Result<(), CheatViolation> {
        if !self.self_overlap(entity.position, entity.trail.iter(), radius) {
            entity.self_collision_since_ms = None;
            return Ok(());
        }

        let since = *entity.self_collision_since_ms.get_or_insert(now_ms);
        let overlap_ms = now_ms.saturating_sub(since);
        if overlap_ms > self.config.self_collision_grace_ms {
            return Err(CheatViolation::SelfCollision { overlap_ms });
        }
        Ok(())
    }

    pub fn check_inactivity(&self, entity: &Entity, now_ms: u64) -> Result<(), CheatViolation> {
        let idle_ms = now_ms.saturating_sub(entity.last_input_at_ms);
        if idle_ms >= self.config.inactivity_timeout_ms {
            return Err(CheatViolation::Inactivity { idle_ms });
        }
        Ok(())
    }
}

impl Default for AntiCheatValidator {
    fn default() -> Self {
        Self::new(AntiCheatConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::game::state::{EntityKind, EntityState};

    fn entity_at(x: f32, y: f32, now_ms: u64) -> Entity {
        Entity::new(
            1,
            EntityKind::Human { account: None },
            EntityState::Active,
            Vec2::new(x, y),
            0.0,
            &MovementConfig::default(),
            now_ms,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_floats() {
        let validator = AntiCheatValidator::default();
        let bad = PlayerInput {
            heading: f32::NAN,
            boost: false,
        };
        assert_eq!(validator.validate_input(&bad), Err(CheatViolation::InvalidFloats));
        let good = PlayerInput {
            heading: 1.0,
            boost: true,
        };
        assert!(validator.validate_input(&good).is_ok());
    }

    #[test]
    fn test_tolerance_by_trust_mode() {
        let validator = AntiCheatValidator::default();
        let base = validator.config().teleport_tolerance;
        let relaxed = base * validator.config().relaxed_tolerance_multiplier;
        let normal = Trust::default();
        let elevated = Trust {
            elevated: true,
            admin: false,
        };

        assert_eq!(validator.tolerance_for(TrustMode::High, elevated), base);
        assert_eq!(validator.tolerance_for(TrustMode::Medium, normal), base);
        assert_eq!(validator.tolerance_for(TrustMode::Medium, elevated), relaxed);
        assert_eq!(validator.tolerance_for(TrustMode::Low, normal), relaxed);
    }

    #[test]
    fn test_legal_moves_never_count() {
        let validator = AntiCheatValidator::default();
        let speed = 0.375;
        for elapsed in [1u64, 16, 100, 1_000] {
            let limit = speed * elapsed as f32 * 1.5;
            assert!(!validator.exceeds_teleport(limit, speed, elapsed, 1.5));
            assert!(!validator.exceeds_teleport(limit * 0.5, speed, elapsed, 1.5));
        }
    }

    #[test]
    fn test_teleport_counter_and_reset() {
        let validator = AntiCheatValidator::default();
        let mut entity = entity_at(0.0, 0.0, 0);
        let speed = 0.375;

        // Each jump is far beyond 0.375 * 16 * 1.5 = 9 units
        let mut now = 0;
        for expected in 1..validator.config().teleport_violation_limit {
            now += 16;
            entity.position.x += 500.0;
            validator.check_teleport(&mut entity, speed, 16, 1.5, now).unwrap();
            assert_eq!(entity.teleport_violations, expected);
        }

        // A legal move resets to zero
        now += 16;
        entity.position.x += 1.0;
        validator.check_teleport(&mut entity, speed, 16, 1.5, now).unwrap();
        assert_eq!(entity.teleport_violations, 0);

        for _ in 0..validator.config().teleport_violation_limit - 1 {
            now += 16;
            entity.position.x += 500.0;
            validator.check_teleport(&mut entity, speed, 16, 1.5, now).unwrap();
        }
        now += 16;
        entity.position.x += 500.0;
        let result = validator.check_teleport(&mut entity, speed, 16, 1.5, now);
        assert!(matches!(result, Err(CheatViolation::Teleport { .. })));
    }

    #[test]
    fn test_elapsed_floored_at_frame() {
        let validator = AntiCheatValidator::default();
        let mut entity = entity_at(0.0, 0.0, 0);
        // Clock did not move, but one frame's worth of distance is legal
        entity.position.x = 6.0;
        validator.check_teleport(&mut entity, 0.375, 16, 1.5, 0).unwrap();
        assert_eq!(entity.teleport_violations, 0);
    }

    #[test]
    fn test_self_overlap_skips_recent_points() {
        let validator = AntiCheatValidator::default();
        let safe = validator.config().self_collision_safe_count;

        // Recent points right under the head are ignored
        let trail: Vec<Vec2> = (0..safe).map(|_| Vec2::ZERO).collect();
        assert!(!validator.self_overlap(Vec2::ZERO, trail.iter(), 10.0));

        // Older segment crossing the head counts
        let mut looped = trail.clone();
        looped.push(Vec2::new(-20.0, 0.0));
        looped.push(Vec2::new(20.0, 0.0));
        assert!(validator.self_overlap(Vec2::ZERO, looped.iter(), 10.0));
    }

    #[test]
    fn test_self_collision_grace_and_reset() {
        let validator = AntiCheatValidator::default();
        let grace = validator.config().self_collision_grace_ms;
        let safe = validator.config().self_collision_safe_count;

        let mut entity = entity_at(0.0, 0.0, 0);
        for _ in 0..safe {
            entity.trail.push_back(Vec2::new(0.0, 50.0));
        }
        entity.trail.push_back(Vec2::new(-20.0, 0.0));
        entity.trail.push_back(Vec2::new(20.0, 0.0));

        assert!(validator.check_self_collision(&mut entity, 10.0, 1_000).is_ok());
        assert!(validator.check_self_collision(&mut entity, 10.0, 1_000 + grace).is_ok());

        // Overlap cleared: timer restarts
        entity.position = Vec2::new(0.0, 100.0);
        assert!(validator.check_self_collision(&mut entity, 10.0, 1_000 + grace + 1).is_ok());
        assert_eq!(entity.self_collision_since_ms, None);

        entity.position = Vec2::ZERO;
        let start = 5_000;
        assert!(validator.check_self_collision(&mut entity, 10.0, start).is_ok());
        let result = validator.check_self_collision(&mut entity, 10.0, start + grace + 1);
        assert!(matches!(result, Err(CheatViolation::SelfCollision { .. })));
    }

    #[test]
    fn test_inactivity() {
        let validator = AntiCheatValidator::default();
        let timeout = validator.config().inactivity_timeout_ms;
        let entity = entity_at(0.0, 0.0, 0);
        assert!(validator.check_inactivity(&entity, timeout - 1).is_ok());
        let result = validator.check_inactivity(&entity, timeout);
        assert_eq!(result.unwrap_err().death_cause(), Some(DeathCause::Inactivity));
    }
}
