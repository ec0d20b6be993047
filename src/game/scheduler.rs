//! Tick scheduling
//!
//! [`TickScheduler`] drives `Simulation::tick()` from a tokio interval and
//! forwards the outbox to the session layer. [`Cadence`] handles the slower
//! periodic jobs inside the tick (food, bots, snapshots, leaderboard).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::ConfigUpdateReport;
use crate::game::simulation::{Outbound, Simulation};

/// Seconds between periodic status lines
const STATUS_LOG_SECS: u64 = 30;

/// Fixed-interval job driven by the tick clock.
///
/// Fires on the first check, then every `interval_ms`.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

impl Cadence {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due_ms: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Whether the job should run now; schedules the next run if so
    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.next_due_ms {
            Some(next) if now_ms < next => false,
            _ => {
                self.next_due_ms = Some(now_ms + self.interval_ms);
                true
            }
        }
    }

    /// Change the interval, rescheduling relative to the last run
    pub fn set_interval(&mut self, interval_ms: u64) {
        if let Some(next) = self.next_due_ms {
            let last = next.saturating_sub(self.interval_ms);
            self.next_due_ms = Some(last + interval_ms);
        }
        self.interval_ms = interval_ms;
    }

    /// Fire on the next check
    pub fn reset(&mut self) {
        self.next_due_ms = None;
    }
}

/// Runs the simulation loop on the tokio runtime
pub struct TickScheduler {
    sim: Arc<Mutex<Simulation>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    handle: Option<JoinHandle<()>>,
    interval_ms: u64,
}

impl TickScheduler {
    /// Wrap a simulation. The receiver gets every outbound message.
    pub fn new(sim: Arc<Mutex<Simulation>>) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let interval_ms = sim.lock().config().frame_interval_ms();
        (
            Self {
                sim,
                outbound: tx,
                handle: None,
                interval_ms,
            },
            rx,
        )
    }

    pub fn simulation(&self) -> &Arc<Mutex<Simulation>> {
        &self.sim
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking at the configured frame interval. No-op when running.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (interval_ms, fps) = {
            let sim = self.sim.lock();
            (sim.config().frame_interval_ms(), sim.config().target_fps)
        };
        self.interval_ms = interval_ms;

        let sim = self.sim.clone();
        let tx = self.outbound.clone();
        self.handle = Some(tokio::spawn(run_loop(sim, tx, interval_ms)));
        info!("Tick loop started at {} fps ({}ms)", fps, interval_ms);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Tick loop stopped");
        }
    }

    /// Restart with the current frame interval. The old loop is aborted
    /// before the new one starts.
    pub fn reconfigure(&mut self) {
        let was_running = self.is_running();
        self.stop();
        self.interval_ms = self.sim.lock().config().frame_interval_ms();
        if was_running {
            self.start();
        }
    }

    /// Apply an admin config update, restarting the loop if the tick rate
    /// changed
    pub fn apply_config_update(&mut self, update: &Value) -> ConfigUpdateReport {
        let (report, interval_ms) = {
            let mut sim = self.sim.lock();
            let report = sim.update_config(update);
            (report, sim.config().frame_interval_ms())
        };
        if interval_ms != self.interval_ms {
            self.reconfigure();
        }
        report
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(sim: Arc<Mutex<Simulation>>, tx: mpsc::UnboundedSender<Outbound>, interval_ms: u64) {
    let mut ticker = interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let status_every = (STATUS_LOG_SECS * 1000 / interval_ms.max(1)).max(1);
    let mut loop_ticks: u64 = 0;
    let mut receiver_gone = false;

    loop {
        ticker.tick().await;
        loop_ticks += 1;

        let messages = {
            let mut guard = sim.lock();
            guard.tick();
            if loop_ticks % status_every == 0 {
                log_status(&guard);
            }
            guard.drain_outbox()
        };

        if receiver_gone {
            continue;
        }
        for message in messages {
            if tx.send(message).is_err() {
                warn!("Outbound receiver dropped, discarding simulation output");
                receiver_gone = true;
                break;
            }
        }
    }
}

fn log_status(sim: &Simulation) {
    let (mut humans, mut bots) = (0, 0);
    for entity in sim.entities() {
        if entity.is_bot() {
            bots += 1;
        } else {
            humans += 1;
        }
    }
    let perf = sim.performance();
    info!(
        "Tick {}: {} humans + {} bots, {} food | Perf: {:?} ({:.1}%), snapshots every {}ms",
        sim.tick_count(),
        humans,
        bots,
        sim.food().count(),
        perf.status(),
        perf.budget_ratio() * 100.0,
        sim.broadcast_interval_ms()
    );
}
