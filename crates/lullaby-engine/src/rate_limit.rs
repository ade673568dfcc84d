//! Fixed-window per-client rate limiting.
//!
//! One counter per client key. A window starts at the client's first
//! request after the previous window lapsed and runs for a fixed
//! duration; requests past the allowance inside one window are limited.
//! The clock is passed into [`RateLimiter::check`] so window behavior is
//! testable without sleeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request is within the client's allowance.
    Allowed,
    /// The client has exhausted its allowance for the current window.
    Limited,
}

#[derive(Debug)]
struct WindowCounter {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, WindowCounter>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` per client.
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `key` at time `now` and returns the decision.
    ///
    /// A limited request still counts against the window; the window does
    /// not slide.
    pub fn check(&self, key: &str, now: Instant) -> RateDecision {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let counter = clients
            .entry(key.to_string())
            .or_insert_with(|| WindowCounter {
                window_start: now,
                count: 0,
            });

        if now.duration_since(counter.window_start) > self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        counter.count = counter.count.saturating_add(1);
        if counter.count > self.max_requests {
            RateDecision::Limited
        } else {
            RateDecision::Allowed
        }
    }
}
