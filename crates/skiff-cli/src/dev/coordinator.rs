//! Rebuild coordination.
//!
//! A three-state machine serializes rebuild cycles: at most one cycle runs
//! at a time, and any number of requests arriving while one runs collapse
//! into exactly one follow-up cycle. An in-flight cycle is never terminated
//! by a new change; it finishes and the trailing state is rebuilt right
//! after.
//!
//! The serve command owns two independent instances: one for wasm rebuilds
//! and one for entrypoint recooks. They write to disjoint parts of the
//! output tree, so the two may run concurrently.

use parking_lot::Mutex;
use std::sync::Arc;

/// Coordinator state, mutated only under the coordinator's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildState {
    /// No cycle in flight
    Idle,
    /// One cycle in flight, nothing queued
    Running,
    /// One cycle in flight and exactly one follow-up queued
    RunningWithPending,
}

/// Serializes rebuild cycles around a blocking job.
///
/// The job performs one full cycle, reports its own failures, and returns;
/// cycle outcomes never propagate out of the coordinator.
pub struct RebuildCoordinator {
    label: &'static str,
    state: Mutex<RebuildState>,
    job: Box<dyn Fn() + Send + Sync>,
}

impl RebuildCoordinator {
    /// Create a coordinator around a cycle job.
    pub fn new(label: &'static str, job: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            label,
            state: Mutex::new(RebuildState::Idle),
            job: Box::new(job),
        })
    }

    /// Request a rebuild.
    ///
    /// Idempotent and callable concurrently from any number of watcher
    /// callbacks. Must be called from within a tokio runtime.
    pub fn request(self: &Arc<Self>) {
        let mut state = self.state.lock();
        match *state {
            RebuildState::Idle => {
                *state = RebuildState::Running;
                drop(state);
                self.spawn_cycle();
            }
            RebuildState::Running => {
                *state = RebuildState::RunningWithPending;
            }
            // Already pending; further requests are no-ops.
            RebuildState::RunningWithPending => {}
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> RebuildState {
        *self.state.lock()
    }

    fn spawn_cycle(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let worker = Arc::clone(&coordinator);
                // The cycle runs on a blocking worker so event delivery is
                // never blocked by a long compile.
                let finished = tokio::task::spawn_blocking(move || (worker.job)()).await;
                if finished.is_err() {
                    tracing::error!("{} cycle panicked", coordinator.label);
                }

                let mut state = coordinator.state.lock();
                match *state {
                    RebuildState::RunningWithPending => {
                        *state = RebuildState::Running;
                        // Loop again: the queued follow-up starts now.
                    }
                    _ => {
                        *state = RebuildState::Idle;
                        return;
                    }
                }
            }
        });
    }
}
