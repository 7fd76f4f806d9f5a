//! services/api/src/web/rate_limit.rs
//!
//! Fixed-window request budgets keyed by client address.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max: u32,
    window: Duration,
    hits: DashMap<String, Window>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Counts one request for `key`; false once the window's budget is spent.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Drops finished windows, at most once per window length.
    fn sweep(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.lock() else {
            return;
        };
        if now.saturating_duration_since(*last) < self.window {
            return;
        }
        *last = now;
        drop(last);
        self.hits
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.hits.len()
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        self.sweep(now);
        let mut entry = self.hits.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max {
            return false;
        }
        entry.count += 1;
        true
    }
}
