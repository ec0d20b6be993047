//! Fixed-size pool of narrow-phase collision workers.
//!
//! Each worker is an OS thread with its own task channel; all replies come
//! back on one shared channel. Only the tick thread talks to the pool, and
//! results are drained at the start of the next tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use super::narrow_phase::{run_task, CollisionResponse, CollisionTask};
use crate::game::state::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Entity {0} already has a collision task in flight")]
    AlreadyPending(EntityId),
    #[error("All collision workers have shut down")]
    Disconnected,
    #[error("Failed to spawn collision worker: {0}")]
    Spawn(String),
}

/// Pool-wide in-flight count, signalled when it drops to zero
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

struct Worker {
    tasks: Option<Sender<CollisionTask>>,
    /// Tasks sent but not yet answered
    outstanding: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

/// Collision worker pool with least-loaded dispatch
pub struct CollisionWorkerPool {
    workers: Vec<Worker>,
    responses: Receiver<CollisionResponse>,
    /// Entity ids with a task in flight
    pending: FxHashSet<EntityId>,
    in_flight: Arc<InFlight>,
}

impl CollisionWorkerPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let size = size.max(1);
        let (response_tx, responses) = unbounded();
        let in_flight = Arc::new(InFlight::default());
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let (task_tx, task_rx) = unbounded::<CollisionTask>();
            let outstanding = Arc::new(AtomicUsize::new(0));
            let handle = spawn_worker(
                index,
                task_rx,
                response_tx.clone(),
                Arc::clone(&outstanding),
                Arc::clone(&in_flight),
            )?;
            workers.push(Worker {
                tasks: Some(task_tx),
                outstanding,
                handle: Some(handle),
            });
        }

        info!("Collision worker pool started with {} workers", size);

        Ok(Self {
            workers,
            responses,
            pending: FxHashSet::default(),
            in_flight,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_pending(&self, id: EntityId) -> bool {
        self.pending.contains(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Outstanding task count per worker
    pub fn worker_loads(&self) -> Vec<usize> {
        self.workers
            .iter()
            .map(|w| w.outstanding.load(Ordering::Acquire))
            .collect()
    }

    /// Send a task to the least-loaded worker
    pub fn dispatch(&mut self, task: CollisionTask) -> Result<(), PoolError> {
        let id = task.entity_id;
        if self.pending.contains(&id) {
            return Err(PoolError::AlreadyPending(id));
        }

        let worker = self
            .workers
            .iter()
            .filter(|w| w.tasks.is_some())
            .min_by_key(|w| w.outstanding.load(Ordering::Acquire))
            .ok_or(PoolError::Disconnected)?;

        let Some(sender) = &worker.tasks else {
            return Err(PoolError::Disconnected);
        };

        worker.outstanding.fetch_add(1, Ordering::AcqRel);
        self.in_flight.add();
        if sender.send(task).is_err() {
            worker.outstanding.fetch_sub(1, Ordering::AcqRel);
            self.in_flight.done();
            return Err(PoolError::Disconnected);
        }

        self.pending.insert(id);
        Ok(())
    }

    /// Take every response that has arrived, clearing their pending ids
    pub fn drain_results(&mut self) -> Vec<CollisionResponse> {
        let results: Vec<CollisionResponse> = self.responses.try_iter().collect();
        for response in &results {
            self.pending.remove(&response.entity_id);
        }
        results
    }

    /// Block until no worker has outstanding tasks, or the timeout passes.
    /// Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            if self.in_flight.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for CollisionWorkerPool {
    fn drop(&mut self) {
        // Closing the task channels ends each worker loop
        for worker in &mut self.workers {
            worker.tasks.take();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!("Collision worker exited abnormally");
                }
            }
        }
        debug!("Collision worker pool stopped");
    }
}

fn spawn_worker(
    index: usize,
    tasks: Receiver<CollisionTask>,
    responses: Sender<CollisionResponse>,
    outstanding: Arc<AtomicUsize>,
    in_flight: Arc<InFlight>,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name(format!("collision-worker-{}", index))
        .spawn(move || {
            for task in tasks.iter() {
                let response = run_task(&task);
                // Reply before decrementing so wait_idle implies results are queued
                let _ = responses.send(response);
                outstanding.fetch_sub(1, Ordering::AcqRel);
                in_flight.done();
            }
        })
        .map_err(|e| PoolError::Spawn(e.to_string()))
}
