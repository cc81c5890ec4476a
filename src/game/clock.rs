//! Time sources for the game engine.
//!
//! The engine never reads the wall clock directly: elapsed play time comes from a
//! [`Clock`], and the once-per-second countdown is driven by a [`TickSource`] owned
//! by whoever runs the session.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source used to measure how long a game took
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

/// Periodic event source that drives `GameSession::tick`
#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick
    async fn next_tick(&mut self);

    /// Start counting a fresh period from now (called when a game starts)
    fn restart(&mut self);
}

/// Tokio interval ticking once per period
pub struct IntervalTicker {
    period: Duration,
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: Self::fresh_interval(period),
        }
    }

    fn fresh_interval(period: Duration) -> tokio::time::Interval {
        // First tick fires one full period after start, not immediately
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn next_tick(&mut self) {
        self.interval.tick().await;
    }

    fn restart(&mut self) {
        self.interval = Self::fresh_interval(self.period);
    }
}

/// Format whole seconds as `m:ss`
pub fn format_clock(total_secs: u32) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Parse an `m:ss` duration back into seconds
pub fn parse_clock(text: &str) -> Option<u32> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if seconds.len() != 2 || !all_digits(minutes) || !all_digits(seconds) {
        return None;
    }
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    minutes.checked_mul(60)?.checked_add(seconds)
}
