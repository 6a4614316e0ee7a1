//! Sliding-window request limiter.
//!
//! Keeps the timestamps of accepted calls inside the trailing window. When the
//! window is full, `acquire` sleeps exactly until the oldest timestamp leaves it.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

/// Time source used by the limiter and by retry backoff.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(1),
        }
    }
}

/// Not thread-safe; owned by a single client.
#[derive(Debug)]
pub struct RateLimiter<C: Clock = SystemClock> {
    settings: RateLimitSettings,
    accepted: VecDeque<Instant>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(settings: RateLimitSettings, clock: C) -> Self {
        Self {
            settings,
            accepted: VecDeque::with_capacity(settings.max_requests),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Blocks until one more call fits in the window, then records it.
    pub fn acquire(&mut self) {
        let now = self.clock.now();
        self.evict_expired(now);

        let mut accepted_at = now;
        if self.accepted.len() >= self.settings.max_requests.max(1) {
            if let Some(&oldest) = self.accepted.front() {
                let leaves_window = oldest + self.settings.window;
                let wait = leaves_window.saturating_duration_since(now);
                if !wait.is_zero() {
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached");
                    self.clock.sleep(wait);
                }
                accepted_at = self.clock.now().max(leaves_window);
            }
            self.evict_expired(accepted_at);
        }

        self.accepted.push_back(accepted_at);
    }

    /// Number of calls currently counted against the window.
    pub fn in_window(&self) -> usize {
        self.accepted.len()
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&oldest) = self.accepted.front() {
            if now.saturating_duration_since(oldest) >= self.settings.window {
                self.accepted.pop_front();
            } else {
                break;
            }
        }
    }
}
