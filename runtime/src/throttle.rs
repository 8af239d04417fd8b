//! Trailing-edge throttle.
//!
//! ```text
//! calls:   x  x x   x          x
//! runs:              ▲ (interval after first x)   ▲
//!          |-- interval --|    |-- interval --|
//! ```
//!
//! The first call in a quiet period arms a timer; calls while the timer is
//! armed are coalesced. When the timer fires the action runs once, reading
//! whatever state is current at that moment, so the last call's effect is
//! what lands.
//!
//! Without an async runtime there is no timer. The first call in a quiet
//! period then runs inline, later calls inside the same interval are only
//! recorded, and the recorded run happens on the first call after the
//! interval or on [`Throttle::flush`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type ThrottledAction = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct ThrottleState {
    /// A run is owed and has not happened yet.
    pending: bool,
    /// A timer task will fire the pending run.
    timer_armed: bool,
    /// When the action last ran; only consulted without a runtime.
    last_run: Option<Instant>,
    /// Bumped on every arm so stale timers can tell they were superseded.
    generation: u64,
    /// Calls absorbed by the current pending run.
    coalesced: u64,
}

/// Rate limiter for a zero-argument side effect.
///
/// Cloning yields a handle to the same throttle.
///
/// # Example
///
/// ```ignore
/// let throttle = Throttle::new(Duration::from_secs(1), move || persist());
///
/// for _ in 0..100 {
///     throttle.call(); // one persist() one second later
/// }
/// ```
#[derive(Clone)]
pub struct Throttle {
    interval: Duration,
    action: ThrottledAction,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttle {
    /// Wrap `action` so it runs at most once per `interval`.
    #[must_use]
    pub fn new<F>(interval: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            interval,
            action: Arc::new(action),
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Request a run.
    ///
    /// Cheap and non-blocking. Needs a tokio runtime for the timer; without
    /// one the action runs inline at most once per interval.
    pub fn call(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.call_inline();
            return;
        };

        let generation = {
            let mut state = self.lock();
            if state.pending && state.timer_armed {
                Self::coalesce(&mut state);
                return;
            }
            state.pending = true;
            state.timer_armed = true;
            state.coalesced = 0;
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };

        let throttle = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(throttle.interval).await;
            throttle.fire(generation);
        });
    }

    fn call_inline(&self) {
        {
            let mut state = self.lock();
            let window_elapsed = state
                .last_run
                .is_none_or(|at| at.elapsed() >= self.interval);
            if !window_elapsed {
                state.pending = true;
                Self::coalesce(&mut state);
                return;
            }
            tracing::trace!("No async runtime available, running throttled action inline");
            state.pending = false;
            state.coalesced = 0;
            state.last_run = Some(Instant::now());
        }
        (self.action)();
    }

    fn coalesce(state: &mut ThrottleState) {
        state.coalesced += 1;
        metrics::counter!("session.throttle.coalesced").increment(1);
        tracing::trace!(coalesced = state.coalesced, "Throttled call coalesced");
    }

    /// Run a pending action now instead of waiting for the timer.
    ///
    /// Returns `true` if something was pending.
    pub fn flush(&self) -> bool {
        let was_pending = {
            let mut state = self.lock();
            state.timer_armed = false;
            let was_pending = std::mem::replace(&mut state.pending, false);
            if was_pending {
                state.last_run = Some(Instant::now());
            }
            was_pending
        };

        if was_pending {
            tracing::trace!("Flushing pending throttled action");
            (self.action)();
        }
        was_pending
    }

    /// Whether a run is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    /// The configured minimum interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn fire(&self, generation: u64) {
        {
            let mut state = self.lock();
            // Flushed, or superseded by a newer arm after a flush.
            if !state.pending || state.generation != generation {
                return;
            }
            state.pending = false;
            state.timer_armed = false;
            state.last_run = Some(Instant::now());
        }
        (self.action)();
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}
