use std::fmt::Display;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::state::LoopState;

/// Default re-check period while a loop is suspended.
pub const DEFAULT_IDLE_TICK: Duration = Duration::from_millis(100);

/// Work performed on each iteration of a [`SuspendableLoop`].
///
/// The returned state is a request: `Suspended` parks the loop, `Finished`
/// ends it, `Active` asks to be called again.
pub trait LoopAction {
    fn step(&mut self) -> LoopState;
}

impl<F> LoopAction for F
where
    F: FnMut() -> LoopState,
{
    fn step(&mut self) -> LoopState {
        self()
    }
}

/// Wrap a fallible loop body so that a failed iteration is logged and the
/// loop continues with the next one.
pub fn resilient<F, E>(mut body: F) -> impl FnMut() -> LoopState
where
    F: FnMut() -> Result<LoopState, E>,
    E: Display,
{
    move || match body() {
        Ok(state) => state,
        Err(err) => {
            warn!(error = %err, "loop iteration failed");
            LoopState::Active
        }
    }
}

/// Configuration for a [`SuspendableLoop`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// State the loop enters when it starts running. Default: `Active`.
    pub start_state: LoopState,
    /// Upper bound on a single wait while suspended. Default: 100 ms.
    pub idle_tick: Duration,
    /// Target duration of one iteration, including the body's own work.
    /// `Duration::ZERO` disables pacing.
    pub interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            start_state: LoopState::Active,
            idle_tick: DEFAULT_IDLE_TICK,
            interval: Duration::ZERO,
        }
    }
}

struct Shared {
    state: Mutex<LoopState>,
    changed: Condvar,
}

impl Shared {
    fn transition(&self, next: impl FnOnce(LoopState) -> LoopState) -> LoopState {
        let mut state = self.state.lock();
        let updated = next(*state);
        if updated != *state {
            trace!(from = %*state, to = %updated, "loop state change");
            *state = updated;
            self.changed.notify_all();
        }
        updated
    }
}

/// Cloneable control handle for a [`SuspendableLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Current loop state.
    pub fn state(&self) -> LoopState {
        *self.shared.state.lock()
    }

    /// Force the loop into `Finished`. Idempotent; wins over any other request.
    pub fn stop(&self) {
        self.shared.transition(|_| LoopState::Finished);
    }

    /// Park the loop. No effect unless the loop is active.
    pub fn suspend(&self) {
        self.shared.transition(|state| match state {
            LoopState::Active => LoopState::Suspended,
            other => other,
        });
    }

    /// Wake a suspended loop. No effect unless the loop is suspended.
    pub fn resume(&self) {
        self.shared.transition(|state| match state {
            LoopState::Suspended => LoopState::Active,
            other => other,
        });
    }

    /// Flip between active and suspended. No effect once finished.
    pub fn toggle(&self) {
        self.shared.transition(|state| match state {
            LoopState::Active => LoopState::Suspended,
            LoopState::Suspended => LoopState::Active,
            LoopState::Finished => LoopState::Finished,
        });
    }

    /// Returns true once the loop has terminated or been stopped.
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// A repeating action with external suspend/resume/stop control.
///
/// While suspended the loop thread waits on a condition variable in bounded
/// increments, so resuming is prompt and an idle loop costs no CPU. When an
/// interval is configured, each iteration is padded to that interval: the
/// remaining time (interval minus the body's elapsed time, floored at zero)
/// is spent waiting, and a `stop()` during that wait ends the loop at once.
pub struct SuspendableLoop {
    shared: Arc<Shared>,
    config: LoopConfig,
}

impl SuspendableLoop {
    /// Create a loop with default configuration.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Create a loop with explicit configuration.
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(config.start_state),
                changed: Condvar::new(),
            }),
            config,
        }
    }

    /// Handle for controlling this loop from other threads.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current loop configuration.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run the loop on the current thread until it finishes.
    ///
    /// Returns the number of iterations the body executed.
    pub fn run<A: LoopAction>(&self, mut action: A) -> u64 {
        let mut iterations = 0u64;

        while self.wait_until_active() {
            let started = Instant::now();
            let requested = action.step();
            iterations = iterations.saturating_add(1);

            let next = self
                .shared
                .transition(|current| current.apply_request(requested));
            if next.is_finished() {
                break;
            }

            self.pace(started);
        }

        debug!(iterations, "loop finished");
        iterations
    }

    /// Run the loop on a new named thread.
    pub fn spawn<A>(self, name: &str, action: A) -> std::io::Result<JoinHandle<u64>>
    where
        A: LoopAction + Send + 'static,
    {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run(action))
    }

    /// Block while suspended. Returns false once the loop is finished.
    fn wait_until_active(&self) -> bool {
        let mut state = self.shared.state.lock();
        loop {
            match *state {
                LoopState::Active => return true,
                LoopState::Finished => return false,
                LoopState::Suspended => {
                    let _ = self
                        .shared
                        .changed
                        .wait_for(&mut state, self.config.idle_tick);
                }
            }
        }
    }

    fn pace(&self, started: Instant) {
        if self.config.interval.is_zero() {
            return;
        }

        let deadline = started + self.config.interval;
        let mut state = self.shared.state.lock();
        while !state.is_finished() {
            if self
                .shared
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
    }
}

impl Default for SuspendableLoop {
    fn default() -> Self {
        Self::new()
    }
}
