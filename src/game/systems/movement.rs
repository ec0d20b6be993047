//! Per-tick movement: steering, trail bookkeeping and boost cost.

use crate::config::MovementConfig;
use crate::game::state::Entity;
use crate::util::vec2::{turn_toward, Vec2};

/// Turn toward the last input heading.
///
/// Only after the post-spawn control delay and while the input is recent;
/// otherwise the heading holds.
pub fn steer_from_input(entity: &mut Entity, config: &MovementConfig, now_ms: u64) {
    if !entity.has_control(now_ms) {
        return;
    }
    if now_ms.saturating_sub(entity.last_input_at_ms) > config.input_recency_ms {
        return;
    }
    if let Some(target) = entity.input_heading {
        entity.heading = turn_toward(entity.heading, target, config.turn_rate);
    }
}

/// Advance one tick at `speed`.
///
/// Pushes the current head onto the trail, charges boost cost and moves
/// the head. Positions of exhaust particles (one per capacity unit spent)
/// are appended to `exhaust`. Boosting at or below the capacity floor
/// switches itself off.
pub fn advance(entity: &mut Entity, config: &MovementConfig, speed: f32, exhaust: &mut Vec<Vec2>) {
    entity.push_trail();

    if entity.boosting && entity.capacity <= config.min_boost_capacity {
        entity.boosting = false;
        entity.boost_ticks = 0;
    }

    if entity.boosting {
        entity.boost_ticks += 1;
        if entity.boost_ticks >= config.boost_cost_interval_ticks.max(1) {
            entity.boost_ticks = 0;
            let spent = entity.capacity - (entity.capacity - 1.0).max(config.min_boost_capacity);
            if spent > 0.0 {
                entity.capacity -= spent;
                let tail = entity.trail.back().copied().unwrap_or(entity.position);
                exhaust.push(tail);
            }
        }
    }

    let multiplier = if entity.boosting { config.boost_multiplier } else { 1.0 };
    entity.position += Vec2::from_angle(entity.heading) * (speed * multiplier);

    entity.trim_trail(config.trail_hard_cap);
}
