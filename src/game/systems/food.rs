//! Food spawning, aging, attraction and consumption.

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::config::{FoodConfig, MapConfig};
use crate::game::constants::food::PALETTE_SIZE;
use crate::game::spatial::SpatialIndex;
use crate::game::state::{Entity, Food, FoodId};
use crate::game::systems::arena;
use crate::util::vec2::Vec2;

/// Food registry keyed by id
pub type FoodMap = FxHashMap<FoodId, Food>;

/// Monotonic food id source
#[derive(Debug, Default)]
pub struct FoodIds {
    next: FoodId,
}

impl FoodIds {
    pub fn next_id(&mut self) -> FoodId {
        self.next += 1;
        self.next
    }
}

fn random_color<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(0..PALETTE_SIZE)
}

fn random_size<R: Rng + ?Sized>(config: &FoodConfig, rng: &mut R) -> f32 {
    if config.max_size > config.min_size {
        rng.gen_range(config.min_size..=config.max_size)
    } else {
        config.min_size
    }
}

/// Top up ordinary food by one batch, never past `max_count`.
/// Returns how many items were added.
pub fn spawn_batch<R: Rng + ?Sized>(
    food: &mut FoodMap,
    ids: &mut FoodIds,
    map: &MapConfig,
    config: &FoodConfig,
    now_ms: u64,
    rng: &mut R,
) -> usize {
    let room = config.max_count.saturating_sub(food.len());
    let count = room.min(config.spawn_batch);
    let mut added = 0;

    for _ in 0..count {
        let Some(position) = arena::random_point(map, 0.0, rng) else {
            break;
        };
        let id = ids.next_id();
        let size = random_size(config, rng);
        food.insert(id, Food::ordinary(id, position, size, random_color(rng), now_ms, config));
        added += 1;
    }
    added
}

/// Remove fully faded food. Returns how many were removed.
pub fn age(food: &mut FoodMap, config: &FoodConfig, now_ms: u64) -> usize {
    let before = food.len();
    food.retain(|_, item| !item.is_faded(now_ms, config.fade_ms));
    before - food.len()
}

/// Drop consumed food at the end of the tick
pub fn sweep_consumed(food: &mut FoodMap) -> usize {
    let before = food.len();
    food.retain(|_, item| !item.consumed);
    before - food.len()
}

/// Exhaust particles left behind by a boosting entity
pub fn spawn_exhaust<R: Rng + ?Sized>(
    food: &mut FoodMap,
    ids: &mut FoodIds,
    owner: &Entity,
    positions: &[Vec2],
    config: &FoodConfig,
    now_ms: u64,
    rng: &mut R,
) {
    for position in positions {
        let id = ids.next_id();
        food.insert(
            id,
            Food::exhaust(id, owner.id, *position, random_color(rng), now_ms, config),
        );
    }
}

/// Convert part of a dead entity's trail into food at jittered positions.
/// Points outside the map are dropped.
pub fn death_drops<R: Rng + ?Sized>(
    food: &mut FoodMap,
    ids: &mut FoodIds,
    trail: &[Vec2],
    map: &MapConfig,
    config: &FoodConfig,
    now_ms: u64,
    rng: &mut R,
) -> usize {
    let count = (trail.len() as f32 * config.death_fraction.clamp(0.0, 1.0)).floor() as usize;
    if count == 0 {
        return 0;
    }
    let step = trail.len() as f32 / count as f32;
    let jitter = config.death_jitter.max(0.0);
    let mut added = 0;

    for i in 0..count {
        let Some(base) = trail.get((i as f32 * step) as usize) else {
            break;
        };
        let offset = if jitter > 0.0 {
            Vec2::new(rng.gen_range(-jitter..=jitter), rng.gen_range(-jitter..=jitter))
        } else {
            Vec2::ZERO
        };
        let position = *base + offset;
        if !arena::contains(map, position) {
            continue;
        }
        let id = ids.next_id();
        let size = random_size(config, rng);
        food.insert(id, Food::ordinary(id, position, size, random_color(rng), now_ms, config));
        added += 1;
    }
    added
}

/// Pull nearby food toward the head and eat what it reaches.
///
/// Food within `collision_radius` is eaten outright; food within the
/// attraction radius and in front of the head drifts toward it and is
/// eaten once it is within the snap distance. Returns capacity gained.
pub fn interact(
    entity: &mut Entity,
    index: &SpatialIndex,
    food: &mut FoodMap,
    config: &FoodConfig,
    collision_radius: f32,
) -> f32 {
    let head = entity.position;
    let facing = Vec2::from_angle(entity.heading);
    let reach = config.attraction_radius.max(collision_radius);
    let mut gained = 0.0;

    for id in index.query_food(head, reach) {
        let Some(item) = food.get_mut(&id) else {
            continue;
        };
        if !item.edible_by(entity.id) {
            continue;
        }

        let to_head = head - item.position;
        let mut distance = to_head.length();

        if distance > collision_radius {
            if facing.dot(-to_head) <= 0.0 {
                continue;
            }
            let step = config.drift_speed.min(distance);
            item.position += to_head.normalize() * step;
            distance -= step;
            if distance > config.snap_distance {
                continue;
            }
        }

        item.consumed = true;
        gained += item.size * config.growth_per_size;
    }

    entity.capacity += gained;
    gained
}
