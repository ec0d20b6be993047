//! Area of Interest (AOI) snapshots
//!
//! Builds one snapshot per connected human viewer from the spatial index:
//! the viewer itself, every live entity whose head is within the AOI radius
//! and the uneaten food around it. Volatile fields are always sent; cosmetic
//! fields (name, colors, skin) only when the viewer has not seen them yet or
//! they changed, tracked by a per-viewer cache.

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::game::spatial::SpatialIndex;
use crate::game::state::{Cosmetic, Entity, EntityId, FoodKind};
use crate::game::systems::food::FoodMap;
use crate::net::protocol::{AoiSnapshot, EntityView, FoodView};

/// Cosmetics a viewer has already received, by entity id
#[derive(Debug, Default)]
struct ViewerCache {
    seen: HashMap<EntityId, Cosmetic>,
}

/// Inputs shared by every viewer's snapshot
pub struct SnapshotContext<'a> {
    pub entities: &'a FxHashMap<EntityId, Entity>,
    pub food: &'a FoodMap,
    pub index: &'a SpatialIndex,
    pub radius: f32,
    pub tick: u64,
    pub now_ms: u64,
    pub fade_ms: u64,
}

/// Per-viewer snapshot builder
#[derive(Debug, Default)]
pub struct NetworkSync {
    viewers: HashMap<EntityId, ViewerCache>,
}

impl NetworkSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Viewers with a live cache
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Cosmetic entries cached for `viewer`
    pub fn cached_ids(&self, viewer: EntityId) -> usize {
        self.viewers.get(&viewer).map_or(0, |c| c.seen.len())
    }

    pub fn forget_viewer(&mut self, viewer: EntityId) {
        self.viewers.remove(&viewer);
    }

    /// Build snapshots for `viewers`, in parallel. Caches of viewers not in
    /// the list are dropped, and cached ids no longer registered are pruned.
    pub fn build_snapshots(&mut self, viewers: &[EntityId], ctx: &SnapshotContext<'_>) -> Vec<(EntityId, AoiSnapshot)> {
        let connected: HashSet<EntityId> = viewers.iter().copied().collect();
        self.viewers.retain(|id, _| connected.contains(id));
        for id in viewers {
            self.viewers.entry(*id).or_default();
        }

        self.viewers
            .par_iter_mut()
            .filter_map(|(viewer_id, cache)| {
                let viewer = ctx.entities.get(viewer_id)?;
                Some((*viewer_id, build_one(viewer, cache, ctx)))
            })
            .collect()
    }
}

fn build_one(viewer: &Entity, cache: &mut ViewerCache, ctx: &SnapshotContext<'_>) -> AoiSnapshot {
    cache.seen.retain(|id, _| ctx.entities.contains_key(id));

    let center = viewer.position;
    let mut entities = Vec::new();
    entities.push(view_of(viewer, cache, ctx.now_ms));

    for id in ctx.index.query_entities(center, ctx.radius) {
        if id == viewer.id {
            continue;
        }
        let Some(entity) = ctx.entities.get(&id) else {
            continue;
        };
        if !entity.is_live() {
            continue;
        }
        entities.push(view_of(entity, cache, ctx.now_ms));
    }

    let food = ctx
        .index
        .query_food(center, ctx.radius)
        .into_iter()
        .filter_map(|id| ctx.food.get(&id))
        .filter(|item| !item.consumed)
        .map(|item| FoodView {
            id: item.id,
            position: item.position,
            size: item.size,
            color: item.color,
            opacity: item.opacity(ctx.now_ms, ctx.fade_ms),
            exhaust: matches!(item.kind, FoodKind::Exhaust { .. }),
        })
        .collect();

    AoiSnapshot {
        tick: ctx.tick,
        server_time_ms: ctx.now_ms,
        viewer_id: viewer.id,
        entities,
        food,
    }
}

fn view_of(entity: &Entity, cache: &mut ViewerCache, now_ms: u64) -> EntityView {
    let cosmetic = match cache.seen.get(&entity.id) {
        Some(cached) if *cached == entity.cosmetic => None,
        _ => {
            cache.seen.insert(entity.id, entity.cosmetic.clone());
            Some(entity.cosmetic.clone())
        }
    };

    EntityView {
        id: entity.id,
        position: entity.position,
        heading: entity.heading,
        trail: entity.trail.iter().copied().collect(),
        capacity: entity.capacity,
        boosting: entity.boosting,
        god_mode: entity.has_god_mode(now_ms),
        frozen: entity.is_frozen(),
        is_bot: entity.is_bot(),
        cosmetic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FoodConfig, MovementConfig};
    use crate::game::state::{EntityKind, EntityState, Food};
    use crate::util::vec2::Vec2;

    struct World {
        entities: FxHashMap<EntityId, Entity>,
        food: FoodMap,
        index: SpatialIndex,
    }

    impl World {
        fn new() -> Self {
            Self {
                entities: FxHashMap::default(),
                food: FoodMap::default(),
                index: SpatialIndex::new(200.0),
            }
        }

        fn add(&mut self, id: EntityId, position: Vec2, state: EntityState, name: &str) {
            let entity = Entity::new(
                id,
                EntityKind::Human { account: None },
                state,
                position,
                0.0,
                &MovementConfig::default(),
                0,
            )
            .unwrap()
            .with_cosmetic(Cosmetic {
                name: name.to_string(),
                ..Cosmetic::default()
            });
            self.entities.insert(id, entity);
        }

        fn add_food(&mut self, id: u64, position: Vec2) {
            self.food
                .insert(id, Food::ordinary(id, position, 3.0, 0, 0, &FoodConfig::default()));
        }

        fn rebuild(&mut self) {
            self.index.clear();
            for e in self.entities.values().filter(|e| !e.is_ghost()) {
                self.index.insert_entity(e.id, e.position, e.trail.iter(), 4);
            }
            for f in self.food.values() {
                self.index.insert_food(f.id, f.position);
            }
        }

        fn ctx(&self, radius: f32) -> SnapshotContext<'_> {
            SnapshotContext {
                entities: &self.entities,
                food: &self.food,
                index: &self.index,
                radius,
                tick: 1,
                now_ms: 0,
                fade_ms: 2_000,
            }
        }
    }

    #[test]
    fn test_snapshot_contents() {
        let mut world = World::new();
        world.add(1, Vec2::new(1000.0, 1000.0), EntityState::Active, "viewer");
        world.add(2, Vec2::new(1300.0, 1000.0), EntityState::Active, "near");
        world.add(3, Vec2::new(3000.0, 1000.0), EntityState::Active, "far");
        world.add(4, Vec2::new(1100.0, 1000.0), EntityState::Ghost, "ghost");
        world.add_food(10, Vec2::new(1010.0, 1000.0));
        world.add_food(11, Vec2::new(1020.0, 1000.0));
        world.food.get_mut(&11).unwrap().consumed = true;
        world.rebuild();

        let mut sync = NetworkSync::new();
        let snapshots = sync.build_snapshots(&[1], &world.ctx(500.0));
        assert_eq!(snapshots.len(), 1);
        let (viewer, snapshot) = &snapshots[0];
        assert_eq!(*viewer, 1);

        assert_eq!(snapshot.entities[0].id, 1);
        assert!(snapshot.entity(2).is_some());
        assert!(snapshot.entity(3).is_none());
        assert!(snapshot.entity(4).is_none());
        assert_eq!(snapshot.food.len(), 1);
        assert_eq!(snapshot.food[0].id, 10);
    }

    #[test]
    fn test_membership_follows_head_position() {
        let mut world = World::new();
        world.add(1, Vec2::new(1000.0, 1000.0), EntityState::Active, "viewer");
        world.add(2, Vec2::new(1800.0, 1000.0), EntityState::Active, "long");
        {
            // Body reaches the viewer, head stays out of range
            let long = world.entities.get_mut(&2).unwrap();
            for i in 1..=300 {
                long.trail.push_back(Vec2::new(1800.0 - 3.0 * i as f32, 1000.0));
            }
        }
        world.rebuild();

        let mut sync = NetworkSync::new();
        let snapshots = sync.build_snapshots(&[1], &world.ctx(500.0));
        assert!(snapshots[0].1.entity(2).is_none());
    }

    #[test]
    fn test_cosmetics_only_on_first_sight_or_change() {
        let mut world = World::new();
        world.add(1, Vec2::new(1000.0, 1000.0), EntityState::Active, "viewer");
        world.add(2, Vec2::new(1100.0, 1000.0), EntityState::Active, "other");
        world.rebuild();
        let mut sync = NetworkSync::new();

        let first = sync.build_snapshots(&[1], &world.ctx(500.0));
        assert!(first[0].1.entity(2).unwrap().cosmetic.is_some());

        let second = sync.build_snapshots(&[1], &world.ctx(500.0));
        let view = second[0].1.entity(2).unwrap();
        assert!(view.cosmetic.is_none());
        // Volatile fields still present
        assert_eq!(view.position, Vec2::new(1100.0, 1000.0));

        world.entities.get_mut(&2).unwrap().cosmetic.name = "renamed".into();
        let third = sync.build_snapshots(&[1], &world.ctx(500.0));
        assert_eq!(third[0].1.entity(2).unwrap().cosmetic.as_ref().unwrap().name, "renamed");
    }

    #[test]
    fn test_ghost_viewer_gets_snapshot() {
        let mut world = World::new();
        world.add(1, Vec2::new(1000.0, 1000.0), EntityState::Ghost, "spectator");
        world.add(2, Vec2::new(1100.0, 1000.0), EntityState::Frozen, "frozen");
        world.rebuild();
        let mut sync = NetworkSync::new();

        let snapshots = sync.build_snapshots(&[1], &world.ctx(500.0));
        let snapshot = &snapshots[0].1;
        assert_eq!(snapshot.entities[0].id, 1);
        assert!(snapshot.entity(2).unwrap().frozen);
    }

    #[test]
    fn test_caches_pruned() {
        let mut world = World::new();
        world.add(1, Vec2::new(1000.0, 1000.0), EntityState::Active, "a");
        world.add(2, Vec2::new(1100.0, 1000.0), EntityState::Active, "b");
        world.rebuild();
        let mut sync = NetworkSync::new();

        sync.build_snapshots(&[1, 2], &world.ctx(500.0));
        assert_eq!(sync.viewer_count(), 2);
        assert_eq!(sync.cached_ids(1), 2);

        world.entities.remove(&2);
        world.rebuild();
        sync.build_snapshots(&[1], &world.ctx(500.0));
        assert_eq!(sync.viewer_count(), 1);
        assert_eq!(sync.cached_ids(1), 1);
    }
}
