//! Prometheus-compatible simulation metrics
//!
//! Atomic gauges and counters updated by the tick thread. Serving them over
//! HTTP is left to the embedding server; `to_prometheus` renders the text
//! exposition format and `to_json` a compact JSON document.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::game::performance::PerformanceStatus;

/// Tick samples kept for percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the simulation
#[derive(Debug)]
pub struct Metrics {
    // Entity counts
    pub human_entities: AtomicU64,
    pub bot_entities: AtomicU64,
    pub ghost_entities: AtomicU64,
    pub food_count: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Performance status (0=Excellent, 1=Good, 2=Warning, 3=Critical)
    pub performance_status: AtomicU64,

    // Collision pool
    pub collision_dispatched: AtomicU64,
    pub collision_results: AtomicU64,
    pub collision_hits: AtomicU64,
    pub collision_errors: AtomicU64,
    pub collision_pending: AtomicU64,

    // Lifecycle
    pub deaths: AtomicU64,
    pub kills: AtomicU64,
    pub joins: AtomicU64,

    // Network
    pub snapshots_built: AtomicU64,
    pub broadcast_interval_ms: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            human_entities: AtomicU64::new(0),
            bot_entities: AtomicU64::new(0),
            ghost_entities: AtomicU64::new(0),
            food_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            performance_status: AtomicU64::new(0),
            collision_dispatched: AtomicU64::new(0),
            collision_results: AtomicU64::new(0),
            collision_hits: AtomicU64::new(0),
            collision_errors: AtomicU64::new(0),
            collision_pending: AtomicU64::new(0),
            deaths: AtomicU64::new(0),
            kills: AtomicU64::new(0),
            joins: AtomicU64::new(0),
            snapshots_built: AtomicU64::new(0),
            broadcast_interval_ms: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn set_performance_status(&self, status: PerformanceStatus) {
        let code = match status {
            PerformanceStatus::Excellent => 0,
            PerformanceStatus::Good => 1,
            PerformanceStatus::Warning => 2,
            PerformanceStatus::Critical => 3,
        };
        self.performance_status.store(code, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn status_name(&self) -> &'static str {
        match self.performance_status.load(Ordering::Relaxed) {
            0 => "excellent",
            1 => "good",
            2 => "warning",
            _ => "critical",
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("serpent_arena_entities_human", "Human entities (players and ghosts)", "gauge",
            self.human_entities.load(Ordering::Relaxed));
        metric!("serpent_arena_entities_bot", "Bot entities", "gauge",
            self.bot_entities.load(Ordering::Relaxed));
        metric!("serpent_arena_entities_ghost", "Spectating entities", "gauge",
            self.ghost_entities.load(Ordering::Relaxed));
        metric!("serpent_arena_food", "Food items in the world", "gauge",
            self.food_count.load(Ordering::Relaxed));

        metric!("serpent_arena_tick_time_microseconds", "Last tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("serpent_arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("serpent_arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("serpent_arena_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("serpent_arena_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("serpent_arena_performance_status", "Performance status (0=Excellent, 3=Critical)", "gauge",
            self.performance_status.load(Ordering::Relaxed));
        output.push_str(&format!(
            "# HELP serpent_arena_performance_state Human-readable performance state\n# TYPE serpent_arena_performance_state gauge\nserpent_arena_performance_state{{state=\"{}\"}} 1\n",
            self.status_name()
        ));

        metric!("serpent_arena_collision_dispatched_total", "Collision tasks sent to workers", "counter",
            self.collision_dispatched.load(Ordering::Relaxed));
        metric!("serpent_arena_collision_results_total", "Collision responses applied", "counter",
            self.collision_results.load(Ordering::Relaxed));
        metric!("serpent_arena_collision_hits_total", "Collision responses reporting a hit", "counter",
            self.collision_hits.load(Ordering::Relaxed));
        metric!("serpent_arena_collision_errors_total", "Worker error responses (treated as no collision)", "counter",
            self.collision_errors.load(Ordering::Relaxed));
        metric!("serpent_arena_collision_pending", "Collision tasks in flight", "gauge",
            self.collision_pending.load(Ordering::Relaxed));

        metric!("serpent_arena_deaths_total", "Entity deaths", "counter",
            self.deaths.load(Ordering::Relaxed));
        metric!("serpent_arena_kills_total", "Deaths credited to another entity", "counter",
            self.kills.load(Ordering::Relaxed));
        metric!("serpent_arena_joins_total", "Accepted joins", "counter",
            self.joins.load(Ordering::Relaxed));

        metric!("serpent_arena_snapshots_total", "AOI snapshots built", "counter",
            self.snapshots_built.load(Ordering::Relaxed));
        metric!("serpent_arena_broadcast_interval_ms", "Current snapshot interval", "gauge",
            self.broadcast_interval_ms.load(Ordering::Relaxed));
        metric!("serpent_arena_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON metrics document
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "entities": {
                "human": self.human_entities.load(Ordering::Relaxed),
                "bot": self.bot_entities.load(Ordering::Relaxed),
                "ghost": self.ghost_entities.load(Ordering::Relaxed),
                "food": self.food_count.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
                "status": self.status_name(),
            },
            "collision": {
                "dispatched": self.collision_dispatched.load(Ordering::Relaxed),
                "results": self.collision_results.load(Ordering::Relaxed),
                "hits": self.collision_hits.load(Ordering::Relaxed),
                "errors": self.collision_errors.load(Ordering::Relaxed),
                "pending": self.collision_pending.load(Ordering::Relaxed),
            },
            "deaths": self.deaths.load(Ordering::Relaxed),
            "broadcast_interval_ms": self.broadcast_interval_ms.load(Ordering::Relaxed),
            "uptime_seconds": self.uptime_seconds(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
