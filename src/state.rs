use crate::queues::QueueStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Simulation parameters. `p` and `simulation_time` come from the
/// command line, everything else is fixed by the model.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Probability that a tick's train arrives on the A/E/F side.
    pub p: f64,
    /// Run length in time units.
    pub simulation_time: u64,
    pub tunnel_length: u32,
    pub train_speed: u32,
    /// Queued-train count above which the system enters overload.
    pub overload_threshold: usize,
    pub breakdown_probability: f64,
    /// Extra time units a breakdown adds to a passage.
    pub breakdown_delay: u64,
    /// Probability of the short (100-unit) train length.
    pub short_train_probability: f64,
    /// Wall-clock length of one simulated time unit. One second in a
    /// real run; tests shrink it.
    pub tick: Duration,
}

impl SimConfig {
    pub fn new(p: f64, simulation_time: u64) -> SimConfig {
        SimConfig {
            p,
            simulation_time,
            tunnel_length: 100,
            train_speed: 100,
            overload_threshold: 10,
            breakdown_probability: 0.1,
            breakdown_delay: 4,
            short_train_probability: 0.7,
            tick: Duration::from_secs(1),
        }
    }
}

/// Backpressure state. Entered when the aggregate queue depth exceeds
/// the threshold, left only once every queue has drained.
#[derive(Debug, Clone, Copy)]
pub enum OverloadState {
    Normal,
    Overloaded { since: Instant },
}

impl OverloadState {
    pub fn is_overloaded(&self) -> bool {
        matches!(self, OverloadState::Overloaded { .. })
    }
}

/// Everything the generator and scheduler mutate, guarded by the one
/// lock in [`Shared`].
#[derive(Debug)]
pub struct CoreState {
    pub queues: QueueStore,
    pub tunnel_occupied: bool,
    pub overload: OverloadState,
    pub next_train_id: u64,
}

/// The shared monitor: one mutex over all mutable simulation state,
/// a condvar for "tunnel free / work available" wakeups, and the
/// cooperative shutdown token. Handed to every thread as an `Arc`.
pub struct Shared {
    pub config: SimConfig,
    state: Mutex<CoreState>,
    tunnel_cond: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    pub fn new(config: SimConfig) -> Arc<Shared> {
        Arc::new(Shared {
            config,
            state: Mutex::new(CoreState {
                queues: QueueStore::new(),
                tunnel_occupied: false,
                overload: OverloadState::Normal,
                next_train_id: 0,
            }),
            tunnel_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Take the lock. A poisoned mutex still yields its guard so the
    /// remaining threads can observe shutdown and drain.
    pub fn lock(&self) -> MutexGuard<CoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Atomically release the lock and block until signalled.
    pub fn wait<'a>(&self, guard: MutexGuard<'a, CoreState>) -> MutexGuard<'a, CoreState> {
        match self.tunnel_cond.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn notify_one(&self) {
        self.tunnel_cond.notify_one();
    }

    pub fn notify_all(&self) {
        self.tunnel_cond.notify_all();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Trip the shutdown token and wake every waiter. Safe to call any
    /// number of times from any thread, including the signal handler.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.tunnel_cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_model_constants() {
        let config = SimConfig::new(0.5, 60);
        assert_eq!(config.tunnel_length, 100);
        assert_eq!(config.train_speed, 100);
        assert_eq!(config.overload_threshold, 10);
        assert_eq!(config.breakdown_delay, 4);
        assert!((config.breakdown_probability - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let shared = Shared::new(SimConfig::new(0.5, 60));
        assert!(!shared.shutdown_requested());
        shared.request_shutdown();
        shared.request_shutdown();
        assert!(shared.shutdown_requested());
    }
}
