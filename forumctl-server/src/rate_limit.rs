//! Fixed-window request limiter keyed by client
//!
//! Each key (actor id, or client address when anonymous) gets `limit`
//! requests per window. Windows are created lazily and pruned once the
//! table grows past [`PRUNE_THRESHOLD`].

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Table size that triggers removal of expired windows
pub const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    /// Count one request for `key`; `Err` carries whole seconds to wait.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let mut entry = self.windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        let window = entry.value_mut();

        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit {
            let remaining = self.window.saturating_sub(now.duration_since(window.started));
            // round up so clients never retry early
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(secs.max(1));
        }

        window.count += 1;
        Ok(())
    }

    fn prune(&self, now: Instant) {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        tracing::debug!(removed = before.saturating_sub(self.windows.len()), "pruned rate limit windows");
    }
}
