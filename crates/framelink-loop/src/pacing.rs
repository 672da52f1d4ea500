//! Frame-rate helpers shared by the encode and decode loops.

use std::time::{Duration, Instant};

/// Default period between two statistics refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Resolve a configured frame rate, treating zero or negative values as
/// "use the default".
pub fn effective_frame_rate(configured: i32, default_fps: u32) -> u32 {
    if configured <= 0 {
        default_fps.max(1)
    } else {
        configured as u32
    }
}

/// Interval between two frames at the given rate.
pub fn frame_interval(configured: i32, default_fps: u32) -> Duration {
    let fps = effective_frame_rate(configured, default_fps);
    Duration::from_nanos(1_000_000_000 / u64::from(fps))
}

/// Gate for presentational refreshes: opens at most once per interval.
///
/// The throttle only decides when to render; state updates must never
/// depend on it.
#[derive(Debug, Clone)]
pub struct RefreshThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RefreshThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true (and restarts the interval) if a refresh is due now.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// Returns true (and restarts the interval) if a refresh is due at `now`.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last refresh so the next check opens immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RefreshThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

/// Measures the actual interval between consecutive frames.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_tick: Option<Instant>,
    last_interval: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame at the current time.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Record a frame at `now`.
    pub fn tick_at(&mut self, now: Instant) {
        if let Some(last) = self.last_tick {
            self.last_interval = now.saturating_duration_since(last);
        }
        self.last_tick = Some(now);
    }

    /// Interval between the last two recorded frames.
    pub fn last_interval(&self) -> Duration {
        self.last_interval
    }

    /// Frame rate implied by the last interval, or 0.0 before two frames.
    pub fn actual_fps(&self) -> f64 {
        let secs = self.last_interval.as_secs_f64();
        if secs > 0.0 {
            1.0 / secs
        } else {
            0.0
        }
    }
}
