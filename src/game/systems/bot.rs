//! AI bot steering and expiry
//!
//! Bots wander: a random target heading re-rolled at random intervals,
//! overridden by a heading toward the map center near the border. Movement,
//! food and collision dispatch then run exactly as for humans.

use rand::Rng;
use std::f32::consts::TAU;

use crate::config::{BotConfig, MapConfig};
use crate::game::state::{BotState, DeathCause, Entity};
use crate::game::systems::arena;
use crate::util::vec2::turn_toward;

#[derive(Debug, Clone)]
pub struct BotController {
    config: BotConfig,
}

impl BotController {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: BotConfig) {
        self.config = config;
    }

    fn retarget_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let min = self.config.retarget_min_ms;
        let max = self.config.retarget_max_ms.max(min);
        rng.gen_range(min..=max)
    }

    /// Fresh steering state for a bot spawned now
    pub fn new_state<R: Rng + ?Sized>(&self, heading: f32, now_ms: u64, rng: &mut R) -> BotState {
        BotState {
            expires_at_ms: now_ms + self.config.lifetime_ms,
            target_heading: heading,
            next_retarget_ms: now_ms + self.retarget_delay(rng),
        }
    }

    /// Bot speed per tick
    pub fn speed(&self, base_speed: f32) -> f32 {
        base_speed * self.config.speed_fraction
    }

    /// Steer one bot. Returns the death cause when its lifetime ran out.
    pub fn update<R: Rng + ?Sized>(
        &self,
        entity: &mut Entity,
        map: &MapConfig,
        now_ms: u64,
        rng: &mut R,
    ) -> Option<DeathCause> {
        let position = entity.position;
        let near_border = arena::border_distance(map, position) < self.config.border_avoid_distance;
        let retarget_delay = self.retarget_delay(rng);
        let random_heading = rng.gen_range(0.0..TAU);

        let Some(bot) = entity.bot_state_mut() else {
            return None;
        };

        if now_ms >= bot.expires_at_ms {
            return Some(DeathCause::Expired);
        }

        if near_border {
            bot.target_heading = (arena::center(map) - position).angle();
        } else if now_ms >= bot.next_retarget_ms {
            bot.target_heading = random_heading;
            bot.next_retarget_ms = now_ms + retarget_delay;
        }

        let target = bot.target_heading;
        entity.heading = turn_toward(entity.heading, target, self.config.turn_rate);
        None
    }
}

impl Default for BotController {
    fn default() -> Self {
        Self::new(BotConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapShape, MovementConfig};
    use crate::game::state::{EntityKind, EntityState};
    use crate::util::vec2::{angle_delta, Vec2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn map() -> MapConfig {
        MapConfig {
            shape: MapShape::Rectangle,
            width: 2000.0,
            height: 2000.0,
            cell_size: 200.0,
        }
    }

    fn bot_at(controller: &BotController, position: Vec2, heading: f32, rng: &mut StdRng) -> Entity {
        let state = controller.new_state(heading, 0, rng);
        Entity::new(
            5,
            EntityKind::Bot(state),
            EntityState::Active,
            position,
            heading,
            &MovementConfig::default(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_bot_expires() {
        let controller = BotController::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut bot = bot_at(&controller, Vec2::new(1000.0, 1000.0), 0.0, &mut rng);
        let lifetime = controller.config().lifetime_ms;

        assert_eq!(controller.update(&mut bot, &map(), lifetime - 1, &mut rng), None);
        assert_eq!(
            controller.update(&mut bot, &map(), lifetime, &mut rng),
            Some(DeathCause::Expired)
        );
    }

    #[test]
    fn test_turn_rate_capped() {
        let controller = BotController::default();
        let mut rng = StdRng::seed_from_u64(2);
        let mut bot = bot_at(&controller, Vec2::new(1000.0, 1000.0), 0.0, &mut rng);
        for _ in 0..50 {
            let before = bot.heading;
            controller.update(&mut bot, &map(), 10_000, &mut rng);
            assert!(angle_delta(before, bot.heading).abs() <= controller.config().turn_rate + 1e-5);
        }
    }

    #[test]
    fn test_border_steers_to_center() {
        let controller = BotController::default();
        let mut rng = StdRng::seed_from_u64(3);
        // Near the left wall heading further left
        let mut bot = bot_at(&controller, Vec2::new(50.0, 1000.0), std::f32::consts::PI, &mut rng);

        controller.update(&mut bot, &map(), 1, &mut rng);
        let target = bot.bot_state().unwrap().target_heading;
        assert!(angle_delta(target, 0.0).abs() < 1e-3);

        for t in 2..100 {
            controller.update(&mut bot, &map(), t, &mut rng);
        }
        assert!(angle_delta(bot.heading, 0.0).abs() < 1e-3);
    }

    #[test]
    fn test_humans_ignored() {
        let controller = BotController::default();
        let mut rng = StdRng::seed_from_u64(4);
        let mut human = Entity::new(
            1,
            EntityKind::Human { account: None },
            EntityState::Active,
            Vec2::new(1000.0, 1000.0),
            1.0,
            &MovementConfig::default(),
            0,
        )
        .unwrap();
        assert_eq!(controller.update(&mut human, &map(), u64::MAX, &mut rng), None);
        assert_eq!(human.heading, 1.0);
    }
}
