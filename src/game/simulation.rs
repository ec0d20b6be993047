//! Authoritative simulation tick
//!
//! Owns the entity and food registries, the spatial index and the collision
//! worker pool. Everything here runs on the tick thread; workers only ever
//! see owned task copies and their results are applied at the start of the
//! next tick.
//!
//! Per tick:
//! 1. apply collision results that arrived since the last tick
//! 2. age food, run the food and bot spawners
//! 3. rebuild the spatial index
//! 4. update every entity in id order (movement, anti-cheat, food,
//!    collision dispatch) and finalize deaths
//! 5. sweep eaten food, then emit snapshots and the leaderboard on their
//!    own cadences
//!
//! Messages for the outside world are queued in an outbox and collected
//! with [`Simulation::drain_outbox`].

use std::f32::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::anticheat::{AntiCheatValidator, CheatViolation};
use crate::config::{ConfigError, ConfigUpdateReport, SimConfig, TrustMode};
use crate::game::clock::Clock;
use crate::game::collision::{
    CollisionOutcome, CollisionTask, CollisionWorkerPool, OpponentTrail, PoolError, TrailPoint,
};
use crate::game::performance::{BroadcastThrottle, PerformanceMonitor};
use crate::game::scheduler::Cadence;
use crate::game::spatial::SpatialIndex;
use crate::game::state::{AccountId, DeathCause, Entity, EntityId, EntityKind, EntityState, Food, StateError};
use crate::game::stats::StatsStore;
use crate::game::systems::food::{self, FoodIds, FoodMap};
use crate::game::systems::spawn::{SpawnError, SpawnPlanner};
use crate::game::systems::{arena, bot::BotController, movement};
use crate::metrics::Metrics;
use crate::net::aoi::{NetworkSync, SnapshotContext};
use crate::net::protocol::{
    ClientMessage, DeathNotification, JoinAccepted, JoinMode, JoinRequest, Leaderboard, LeaderboardEntry,
    PlayerInput, ServerMessage, WorldInfo,
};
use crate::util::vec2::{wrap_angle, Vec2};

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Entity(EntityId),
    All,
}

/// Message queued for the session layer
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub message: ServerMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("Entity {0} does not accept input")]
    NotControllable(EntityId),
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] CheatViolation),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Collision pool: {0}")]
    Pool(#[from] PoolError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("No spawn position available: {0}")]
    Unspawnable(SpawnError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Mark `entity` dying unless god mode protects it.
/// Returns whether the mark took.
fn kill(entity: &mut Entity, cause: DeathCause, killer: Option<EntityId>, now_ms: u64) -> bool {
    if cause.blocked_by_god_mode() && entity.has_god_mode(now_ms) {
        return false;
    }
    match entity.mark_dying(cause, killer) {
        Ok(()) => true,
        Err(e) => {
            debug!("Entity {} not killed ({}): {}", entity.id, cause.as_str(), e);
            false
        }
    }
}

pub struct Simulation {
    config: SimConfig,
    clock: Arc<dyn Clock>,

    entities: FxHashMap<EntityId, Entity>,
    food: FoodMap,
    food_ids: FoodIds,
    next_entity_id: EntityId,
    index: SpatialIndex,

    pool: CollisionWorkerPool,
    validator: AntiCheatValidator,
    planner: SpawnPlanner,
    bots: BotController,
    sync: NetworkSync,

    monitor: PerformanceMonitor,
    throttle: BroadcastThrottle,
    stats: Arc<dyn StatsStore>,
    metrics: Arc<Metrics>,
    outbox: Vec<Outbound>,
    /// Accounts of entities finalized this tick, for crediting trades
    departed: FxHashMap<EntityId, Option<AccountId>>,

    food_cadence: Cadence,
    bot_cadence: Cadence,
    broadcast_cadence: Cadence,
    leaderboard_cadence: Cadence,
    spawners_active: bool,

    tick_count: u64,
    rng: StdRng,
    exhaust_buf: Vec<Vec2>,
}

impl Simulation {
    pub fn new(
        config: SimConfig,
        clock: Arc<dyn Clock>,
        stats: Arc<dyn StatsStore>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let pool = CollisionWorkerPool::new(config.collision_workers)?;
        let throttle = BroadcastThrottle::new(&config.net);

        info!(
            "Simulation ready: {}x{} {:?} map, {} fps, trust {}, {} collision workers",
            config.map.width,
            config.map.height,
            config.map.shape,
            config.target_fps,
            config.trust_mode,
            pool.size()
        );

        Ok(Self {
            entities: FxHashMap::default(),
            food: FoodMap::default(),
            food_ids: FoodIds::default(),
            next_entity_id: 0,
            index: SpatialIndex::new(config.map.cell_size),
            pool,
            validator: AntiCheatValidator::new(config.anticheat.clone()),
            planner: SpawnPlanner::new(config.spawn.clone()),
            bots: BotController::new(config.bots.clone()),
            sync: NetworkSync::new(),
            monitor: PerformanceMonitor::new(config.frame_interval_ms()),
            food_cadence: Cadence::new(config.food.spawn_interval_ms),
            bot_cadence: Cadence::new(config.bots.spawn_interval_ms),
            broadcast_cadence: Cadence::new(throttle.interval_ms()),
            leaderboard_cadence: Cadence::new(config.net.leaderboard_interval_ms),
            throttle,
            spawners_active: config.spawn_without_humans,
            stats,
            metrics,
            outbox: Vec::new(),
            departed: FxHashMap::default(),
            tick_count: 0,
            rng: StdRng::from_entropy(),
            exhaust_buf: Vec::new(),
            clock,
            config,
        })
    }

    /// Replace the random source with a seeded one
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Run one simulation step
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        self.monitor.tick_start();
        self.tick_count += 1;
        self.departed.clear();

        self.apply_collision_results(now);

        let faded = food::age(&mut self.food, &self.config.food, now);
        if faded > 0 {
            debug!("Removed {} faded food", faded);
        }
        self.run_spawners(now);
        self.rebuild_index();

        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            match self.entities.get(&id) {
                None => continue,
                Some(e) if !e.is_dying() && self.pool.is_pending(id) => continue,
                Some(_) => {}
            }
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };

            if !entity.is_dying() {
                self.update_entity(&mut entity, now);
            }

            if entity.is_dying() {
                self.finalize_death(entity);
            } else {
                self.entities.insert(id, entity);
            }
        }

        food::sweep_consumed(&mut self.food);
        self.update_gauges();

        let humans = self
            .entities
            .values()
            .filter(|e| e.is_human() && e.is_live())
            .count();
        if let Some(interval) = self
            .throttle
            .maybe_update(&self.config.net, &self.monitor, humans, now)
        {
            self.broadcast_cadence.set_interval(interval);
            self.metrics
                .broadcast_interval_ms
                .store(interval, std::sync::atomic::Ordering::Relaxed);
        }

        if self.broadcast_cadence.due(now) {
            self.broadcast(now);
        }
        if self.leaderboard_cadence.due(now) {
            self.publish_leaderboard();
        }

        if let Some(duration) = self.monitor.tick_end() {
            self.metrics.record_tick_time(duration);
            self.metrics.set_performance_status(self.monitor.status());
        }
    }

    fn apply_collision_results(&mut self, now: u64) {
        for response in self.pool.drain_results() {
            Metrics::incr(&self.metrics.collision_results);
            let Some(entity) = self.entities.get_mut(&response.entity_id) else {
                debug!("Discarding collision result for removed entity {}", response.entity_id);
                continue;
            };

            match response.outcome {
                CollisionOutcome::Collision(Some(hit)) => {
                    Metrics::incr(&self.metrics.collision_hits);
                    if kill(entity, DeathCause::Collision, Some(hit.killer_id), now) {
                        debug!("Entity {} hit the body of {}", entity.id, hit.killer_id);
                    }
                }
                CollisionOutcome::Collision(None) => {}
                CollisionOutcome::Error(e) => {
                    Metrics::incr(&self.metrics.collision_errors);
                    warn!("Collision worker error for entity {}: {}", response.entity_id, e);
                }
            }
        }
        self.metrics
            .collision_pending
            .store(self.pool.pending_count() as u64, std::sync::atomic::Ordering::Relaxed);
    }

    fn run_spawners(&mut self, now: u64) {
        if !self.spawners_active {
            return;
        }

        if self.food_cadence.due(now) {
            food::spawn_batch(
                &mut self.food,
                &mut self.food_ids,
                &self.config.map,
                &self.config.food,
                now,
                &mut self.rng,
            );
        }

        if self.bot_cadence.due(now) {
            let bots = self.entities.values().filter(|e| e.is_bot()).count();
            if bots < self.config.bots.count && self.monitor.can_add_bots() {
                self.spawn_bot(now);
            }
        }
    }

    fn spawn_bot(&mut self, now: u64) {
        let position = match self.planner.place(&self.config.map, &self.index, &mut self.rng) {
            Ok(position) => position,
            Err(e) => {
                debug!("Bot spawn skipped: {}", e);
                return;
            }
        };
        let heading = self.rng.gen_range(0.0..TAU);
        let brain = self.bots.new_state(heading, now, &mut self.rng);

        self.next_entity_id += 1;
        let id = self.next_entity_id;
        match Entity::new(
            id,
            EntityKind::Bot(brain),
            EntityState::Active,
            position,
            heading,
            &self.config.movement,
            now,
        ) {
            Ok(mut entity) => {
                entity.cosmetic.name = format!("Bot {}", id);
                debug!("Spawned bot {} at ({:.0}, {:.0})", id, position.x, position.y);
                self.entities.insert(id, entity);
            }
            Err(e) => warn!("Bot spawn failed: {}", e),
        }
    }

    fn rebuild_index(&mut self) {
        let stride = self.config.movement.body_sample_stride;
        self.index.clear();
        for entity in self.entities.values().filter(|e| e.is_live()) {
            self.index
                .insert_entity(entity.id, entity.position, entity.trail.iter(), stride);
        }
        for item in self.food.values().filter(|f| !f.consumed) {
            self.index.insert_food(item.id, item.position);
        }
    }

    fn update_entity(&mut self, entity: &mut Entity, now: u64) {
        if entity.is_ghost() {
            return;
        }

        if entity.is_bot() {
            if let Some(cause) = self.bots.update(entity, &self.config.map, now, &mut self.rng) {
                kill(entity, cause, None, now);
                return;
            }
        }

        if entity.is_frozen() {
            entity.trim_trail(self.config.movement.trail_hard_cap);
            return;
        }

        if entity.is_human() {
            movement::steer_from_input(entity, &self.config.movement, now);
        }

        let speed = if entity.is_bot() {
            self.bots.speed(self.config.movement.base_speed)
        } else {
            self.config.movement.base_speed
        };
        let mut exhaust = std::mem::take(&mut self.exhaust_buf);
        exhaust.clear();
        movement::advance(entity, &self.config.movement, speed, &mut exhaust);
        if !exhaust.is_empty() {
            food::spawn_exhaust(
                &mut self.food,
                &mut self.food_ids,
                entity,
                &exhaust,
                &self.config.food,
                now,
                &mut self.rng,
            );
        }
        self.exhaust_buf = exhaust;

        if entity.is_human() {
            let tolerance = self.validator.tolerance_for(self.config.trust_mode, entity.trust);
            if let Err(violation) = self.validator.check_teleport(
                entity,
                self.config.max_speed_per_ms(),
                self.config.frame_interval_ms(),
                tolerance,
                now,
            ) {
                if let Some(cause) = violation.death_cause() {
                    if kill(entity, cause, None, now) {
                        warn!("Entity {} removed: {}", entity.id, violation);
                        return;
                    }
                }
            }
        }

        let radius = self.config.movement.collision_radius;
        if !arena::contains(&self.config.map, entity.position) {
            if entity.has_god_mode(now) {
                entity.position = arena::clamp_inside(&self.config.map, entity.position, radius);
                entity.last_known_position = entity.position;
            } else {
                kill(entity, DeathCause::Boundary, None, now);
                return;
            }
        }

        food::interact(entity, &self.index, &mut self.food, &self.config.food, radius);

        if entity.is_human() {
            if let Err(violation) = self.validator.check_self_collision(entity, radius, now) {
                if kill(entity, DeathCause::SelfCollision, None, now) {
                    debug!("Entity {}: {}", entity.id, violation);
                    return;
                }
            }
            if let Err(violation) = self.validator.check_inactivity(entity, now) {
                if kill(entity, DeathCause::Inactivity, None, now) {
                    info!("Entity {} removed: {}", entity.id, violation);
                    return;
                }
            }
        }

        if self.should_dispatch(entity, now) {
            self.dispatch(entity);
        }
    }

    fn should_dispatch(&self, entity: &Entity, now: u64) -> bool {
        if !entity.is_active() || entity.has_god_mode(now) {
            return false;
        }
        match self.config.trust_mode {
            TrustMode::High => true,
            TrustMode::Medium => entity.is_bot() || !entity.trust.is_privileged(),
            TrustMode::Low => entity.is_bot(),
        }
    }

    fn dispatch(&mut self, entity: &Entity) {
        let movement = &self.config.movement;
        let reach = movement.collision_radius
            + movement.body_sample_stride as f32 * movement.base_speed * movement.boost_multiplier;

        let opponents: Vec<OpponentTrail> = self
            .index
            .query_bodies(entity.position, reach)
            .into_iter()
            .filter(|id| *id != entity.id)
            .filter_map(|id| self.entities.get(&id))
            .filter(|other| other.is_live())
            .map(|other| OpponentTrail {
                id: other.id,
                trail: std::iter::once(other.position)
                    .chain(other.trail.iter().copied())
                    .map(TrailPoint::from)
                    .collect(),
            })
            .collect();

        if opponents.is_empty() {
            return;
        }

        let task = CollisionTask {
            entity_id: entity.id,
            head_x: entity.position.x,
            head_y: entity.position.y,
            opponents,
            collision_radius: movement.collision_radius,
        };
        match self.pool.dispatch(task) {
            Ok(()) => Metrics::incr(&self.metrics.collision_dispatched),
            Err(e) => warn!("Collision dispatch for entity {} failed: {}", entity.id, e),
        }
    }

    fn finalize_death(&mut self, entity: Entity) {
        let Some((cause, killer)) = entity.death() else {
            return;
        };
        let now = self.clock.now_ms();
        let killer = killer.filter(|k| *k != entity.id);

        if entity.is_human() {
            self.outbox.push(Outbound {
                recipient: Recipient::Entity(entity.id),
                message: ServerMessage::Death(DeathNotification {
                    cause,
                    is_kill: killer.is_some(),
                    killer_id: killer,
                    final_size: entity.capacity,
                }),
            });
        }

        let trail: Vec<Vec2> = entity.trail.iter().copied().collect();
        food::death_drops(
            &mut self.food,
            &mut self.food_ids,
            &trail,
            &self.config.map,
            &self.config.food,
            now,
            &mut self.rng,
        );

        if let Some(account) = entity.account() {
            self.stats.record_death(account, entity.capacity, cause);
        }
        if let Some(killer_id) = killer {
            let killer_account = match self.entities.get_mut(&killer_id) {
                Some(credited) => {
                    credited.kills += 1;
                    credited.account()
                }
                // Killer already finalized this tick (head-to-head trade)
                None => self.departed.get(&killer_id).copied().flatten(),
            };
            if let Some(account) = killer_account {
                self.stats.record_kill(account);
            }
            Metrics::incr(&self.metrics.kills);
        }
        self.departed.insert(entity.id, entity.account());
        Metrics::incr(&self.metrics.deaths);
        self.sync.forget_viewer(entity.id);

        match killer {
            Some(k) => info!(
                "Entity {} died ({}, killed by {}) at size {:.1}",
                entity.id,
                cause.as_str(),
                k,
                entity.capacity
            ),
            None => info!("Entity {} died ({}) at size {:.1}", entity.id, cause.as_str(), entity.capacity),
        }

        self.refresh_spawners();
    }

    /// Spawners run only while a human is playing, unless configured otherwise
    fn refresh_spawners(&mut self) {
        let active = self.config.spawn_without_humans
            || self
                .entities
                .values()
                .any(|e| e.is_human() && !e.is_ghost() && !e.is_dying());
        if active == self.spawners_active {
            return;
        }
        self.spawners_active = active;
        if active {
            self.food_cadence.reset();
            self.bot_cadence.reset();
            info!("Spawners started");
        } else {
            info!("Spawners paused: no humans playing");
        }
    }

    fn update_gauges(&self) {
        use std::sync::atomic::Ordering;

        let (mut humans, mut bots, mut ghosts) = (0u64, 0u64, 0u64);
        for entity in self.entities.values() {
            if entity.is_bot() {
                bots += 1;
            } else {
                humans += 1;
                if entity.is_ghost() {
                    ghosts += 1;
                }
            }
        }
        self.metrics.human_entities.store(humans, Ordering::Relaxed);
        self.metrics.bot_entities.store(bots, Ordering::Relaxed);
        self.metrics.ghost_entities.store(ghosts, Ordering::Relaxed);
        self.metrics.food_count.store(self.food.len() as u64, Ordering::Relaxed);
    }

    fn broadcast(&mut self, now: u64) {
        let viewers: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_human() && !e.is_dying())
            .map(|e| e.id)
            .collect();
        if viewers.is_empty() {
            return;
        }

        let ctx = SnapshotContext {
            entities: &self.entities,
            food: &self.food,
            index: &self.index,
            radius: self.config.net.aoi_radius,
            tick: self.tick_count,
            now_ms: now,
            fade_ms: self.config.food.fade_ms,
        };
        let snapshots = self.sync.build_snapshots(&viewers, &ctx);
        self.metrics
            .snapshots_built
            .fetch_add(snapshots.len() as u64, std::sync::atomic::Ordering::Relaxed);

        self.outbox.extend(snapshots.into_iter().map(|(viewer, snapshot)| Outbound {
            recipient: Recipient::Entity(viewer),
            message: ServerMessage::Snapshot(snapshot),
        }));
    }

    fn publish_leaderboard(&mut self) {
        let mut ranked: Vec<&Entity> = self.entities.values().filter(|e| e.is_live()).collect();
        if ranked.is_empty() {
            return;
        }
        ranked.sort_by(|a, b| b.capacity.total_cmp(&a.capacity).then(a.id.cmp(&b.id)));

        let entries = ranked
            .into_iter()
            .take(self.config.net.leaderboard_size)
            .map(|e| LeaderboardEntry {
                entity_id: e.id,
                name: e.cosmetic.name.clone(),
                size: e.capacity,
                kills: e.account().map_or(e.kills, |account| self.stats.kills(account)),
                is_bot: e.is_bot(),
            })
            .collect();

        self.outbox.push(Outbound {
            recipient: Recipient::All,
            message: ServerMessage::Leaderboard(Leaderboard { entries }),
        });
    }

    /// Admit a human as a player or a spectator
    pub fn join(&mut self, request: JoinRequest) -> Result<JoinAccepted, JoinError> {
        let now = self.clock.now_ms();
        let ghost = request.mode == JoinMode::Ghost;

        let (state, position, heading) = if ghost {
            (EntityState::Ghost, arena::center(&self.config.map), 0.0)
        } else {
            let position = self
                .planner
                .place(&self.config.map, &self.index, &mut self.rng)
                .map_err(JoinError::Unspawnable)?;
            (EntityState::Active, position, self.rng.gen_range(0.0..TAU))
        };

        self.next_entity_id += 1;
        let id = self.next_entity_id;
        let entity = Entity::new(
            id,
            EntityKind::Human {
                account: request.account,
            },
            state,
            position,
            heading,
            &self.config.movement,
            now,
        )?
        .with_trust(request.trust)
        .with_cosmetic(request.cosmetic);

        // Visible to spawn searches later in the same tick
        if !ghost {
            self.index.insert_entity(
                id,
                position,
                entity.trail.iter(),
                self.config.movement.body_sample_stride,
            );
        }
        info!(
            "Entity {} joined as {} '{}' at ({:.0}, {:.0})",
            id,
            if ghost { "ghost" } else { "player" },
            entity.cosmetic.name,
            position.x,
            position.y
        );
        self.entities.insert(id, entity);
        Metrics::incr(&self.metrics.joins);
        self.refresh_spawners();

        let accepted = JoinAccepted {
            entity_id: id,
            position,
            ghost,
            world: WorldInfo {
                width: self.config.map.width,
                height: self.config.map.height,
                shape: self.config.map.shape,
                collision_radius: self.config.movement.collision_radius,
                trust_mode: self.config.trust_mode,
            },
        };
        self.outbox.push(Outbound {
            recipient: Recipient::Entity(id),
            message: ServerMessage::JoinAccepted(accepted.clone()),
        });
        Ok(accepted)
    }

    /// Disconnect: remove at once, drop trail food, no death notification
    pub fn leave(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.remove(&id) else {
            return false;
        };

        if !entity.is_ghost() {
            let trail: Vec<Vec2> = entity.trail.iter().copied().collect();
            food::death_drops(
                &mut self.food,
                &mut self.food_ids,
                &trail,
                &self.config.map,
                &self.config.food,
                self.clock.now_ms(),
                &mut self.rng,
            );
        }
        self.sync.forget_viewer(id);
        info!("Entity {} left", id);
        self.refresh_spawners();
        true
    }

    /// Record steering input for a human player
    pub fn submit_input(&mut self, id: EntityId, input: PlayerInput) -> Result<(), SimError> {
        self.validator.validate_input(&input)?;
        let now = self.clock.now_ms();
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;

        if entity.is_bot() || entity.is_ghost() {
            return Err(SimError::NotControllable(id));
        }
        if entity.is_frozen() {
            // Heading is ignored while frozen but the client is still present
            entity.last_input_at_ms = now;
            return Ok(());
        }
        if !entity.is_active() {
            debug!("Ignoring input for entity {} ({:?})", id, entity.state);
            return Ok(());
        }

        entity.input_heading = Some(wrap_angle(input.heading));
        entity.last_input_at_ms = now;
        entity.boosting = input.boost;
        Ok(())
    }

    /// Client-detected collision. Honored only where the trust mode lets
    /// this entity self-report; returns whether it was accepted.
    pub fn report_client_collision(&mut self, id: EntityId, alleged_killer: Option<EntityId>) -> bool {
        let now = self.clock.now_ms();
        let killer = alleged_killer.filter(|k| *k != id && self.entities.contains_key(k));
        let trust_mode = self.config.trust_mode;

        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        let trusted = match trust_mode {
            TrustMode::High => false,
            TrustMode::Medium => entity.trust.is_privileged(),
            TrustMode::Low => true,
        };
        if !trusted || !entity.is_human() {
            debug!("Rejected collision report from entity {}", id);
            return false;
        }

        kill(entity, DeathCause::Collision, killer, now)
    }

    /// Remove an entity immediately with cause "admin"
    pub fn admin_kill(&mut self, id: EntityId, actor: &str) -> Result<(), SimError> {
        let mut entity = self.entities.remove(&id).ok_or(SimError::UnknownEntity(id))?;
        if let Err(e) = entity.mark_dying(DeathCause::Admin, None) {
            self.entities.insert(id, entity);
            return Err(e.into());
        }
        info!("Entity {} killed by admin '{}'", id, actor);
        self.finalize_death(entity);
        Ok(())
    }

    pub fn admin_freeze(&mut self, id: EntityId) -> Result<(), SimError> {
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;
        entity.freeze()?;
        info!("Entity {} frozen", id);
        Ok(())
    }

    pub fn admin_unfreeze(&mut self, id: EntityId) -> Result<(), SimError> {
        let now = self.clock.now_ms();
        let entity = self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))?;
        entity.unfreeze()?;
        entity.last_input_at_ms = entity.last_input_at_ms.max(now);
        entity.last_known_at_ms = now;
        info!("Entity {} unfrozen", id);
        Ok(())
    }

    /// Transient message to everyone
    pub fn announce(&mut self, text: impl Into<String>, duration_ms: u64) {
        self.outbox.push(Outbound {
            recipient: Recipient::All,
            message: ServerMessage::SystemMessage {
                text: text.into(),
                started_at_ms: self.clock.now_ms(),
                duration_ms,
            },
        });
    }

    /// Apply an admin config update and push the result into the running
    /// components. Bad fields are skipped and reported.
    pub fn update_config(&mut self, update: &Value) -> ConfigUpdateReport {
        let previous = self.config.clone();
        let mut report = self.config.apply_update(update);

        if let Err(e) = self.config.validate() {
            warn!("Config update rejected as a whole: {}", e);
            self.config = previous;
            report.skipped.extend(report.applied.drain(..).map(|field| (field, e.clone())));
            return report;
        }
        if report.applied.is_empty() {
            return report;
        }

        self.validator.set_config(self.config.anticheat.clone());
        self.bots.set_config(self.config.bots.clone());
        self.planner = SpawnPlanner::new(self.config.spawn.clone());
        self.monitor.set_frame_interval(self.config.frame_interval_ms());
        self.food_cadence.set_interval(self.config.food.spawn_interval_ms);
        self.bot_cadence.set_interval(self.config.bots.spawn_interval_ms);
        self.leaderboard_cadence
            .set_interval(self.config.net.leaderboard_interval_ms);
        if report.changed("broadcastMinHz") || report.changed("broadcastMaxHz") {
            self.throttle = BroadcastThrottle::new(&self.config.net);
            self.broadcast_cadence.set_interval(self.throttle.interval_ms());
        }
        self.refresh_spawners();

        info!("Config updated: {}", report.applied.join(", "));
        report
    }

    /// Route one decoded client message
    pub fn handle_message(&mut self, id: EntityId, message: ClientMessage) -> Result<(), SimError> {
        match message {
            ClientMessage::Input(input) => self.submit_input(id, input),
            ClientMessage::ReportCollision { alleged_killer } => {
                self.report_client_collision(id, alleged_killer);
                Ok(())
            }
            ClientMessage::Leave => {
                if self.leave(id) {
                    Ok(())
                } else {
                    Err(SimError::UnknownEntity(id))
                }
            }
        }
    }

    /// Take every queued outbound message
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn food(&self) -> impl Iterator<Item = &Food> {
        self.food.values()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn collision_pool(&self) -> &CollisionWorkerPool {
        &self.pool
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn broadcast_interval_ms(&self) -> u64 {
        self.throttle.interval_ms()
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn stats(&self) -> &Arc<dyn StatsStore> {
        &self.stats
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
