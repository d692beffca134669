//! Frame pacing primitives: refresh requests, refresh signals and the clock
//! used to turn refresh timestamps into playback time.

use std::{
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crate::{Result, VisualiserError};

/// Timing information delivered with every display refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Monotonic time since the refresh source started.
    pub timestamp: Duration,
    /// Wall-clock milliseconds since the Unix epoch, used by animated themes.
    pub wall_clock_ms: f64,
}

impl FrameTick {
    pub fn new(timestamp: Duration, wall_clock_ms: f64) -> Self {
        Self {
            timestamp,
            wall_clock_ms,
        }
    }
}

/// Handle for a pending refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequest(u64);

/// Queue of callbacks waiting for the next display refresh.
///
/// Each request fires at most once: [`FrameScheduler::take_due`] drains every
/// request made before the refresh, so a loop has to request again to keep
/// running.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Vec<FrameRequest>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending.push(request);
        request
    }

    /// Cancels a request. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, request: FrameRequest) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != request);
        before != self.pending.len()
    }

    pub fn is_pending(&self, request: FrameRequest) -> bool {
        self.pending.contains(&request)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns every request due on this refresh.
    pub fn take_due(&mut self) -> Vec<FrameRequest> {
        std::mem::take(&mut self.pending)
    }
}

/// Converts refresh timestamps into elapsed playback time.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    last: Option<Duration>,
    position: Duration,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.last = None;
        self.position = Duration::ZERO;
    }

    /// Forgets the previous timestamp without touching the position, so the
    /// time spent paused is not counted as playback.
    pub fn pause(&mut self) {
        self.last = None;
    }

    /// Returns the time elapsed since the previous tick. The first tick after
    /// a reset or pause yields zero.
    pub fn advance(&mut self, timestamp: Duration) -> Duration {
        let delta = self
            .last
            .map(|last| timestamp.saturating_sub(last))
            .unwrap_or(Duration::ZERO);
        self.last = Some(timestamp);
        self.position += delta;
        delta
    }

    pub fn position(&self) -> Duration {
        self.position
    }
}

/// Source of display refresh events.
pub trait RefreshSignal {
    /// Blocks until the next refresh and returns its timing.
    fn wait_for_refresh(&mut self) -> FrameTick;
}

/// Refresh signal ticking at a fixed rate, for hosts without vsync.
#[derive(Debug)]
pub struct FixedRateRefresh {
    origin: Instant,
    interval: Duration,
    next: Instant,
}

impl FixedRateRefresh {
    pub fn new(fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(VisualiserError::invalid_config(
                "refresh rate must be at least 1 fps",
            ));
        }
        let origin = Instant::now();
        Ok(Self {
            origin,
            interval: Duration::from_secs(1) / fps,
            next: origin,
        })
    }
}

impl RefreshSignal for FixedRateRefresh {
    fn wait_for_refresh(&mut self) -> FrameTick {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        }
        let now = Instant::now();
        // A late frame starts a fresh cadence rather than bursting to catch up.
        self.next = if now > self.next + self.interval {
            now + self.interval
        } else {
            self.next + self.interval
        };
        FrameTick::new(now - self.origin, wall_clock_ms())
    }
}

pub fn wall_clock_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
