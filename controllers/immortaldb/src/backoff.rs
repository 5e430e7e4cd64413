//! # Fibonacci Backoff
//!
//! Requeue delays for failed reconciliation passes. Delays grow along the
//! Fibonacci sequence, more slowly than exponential backoff, and are capped.
//!
//! With the default bounds the sequence is 5s, 5s, 10s, 15s, 25s, 40s, ...,
//! 300s (max). Each ImmortalDB has its own sequence; a successful pass resets it.

use cluster_client::ObjectKey;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min` twice.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min: Duration,
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff bounded by `min` and `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

/// Per-object backoff sequences
#[derive(Debug)]
pub struct BackoffTracker {
    min: Duration,
    max: Duration,
    states: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
}

impl BackoffTracker {
    /// Create a tracker whose sequences run from `min` to `max`
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before the next attempt for `key`, advancing its sequence
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(self.min, self.max))
            .next_backoff()
    }

    /// Forget the sequence for `key` after a successful pass
    pub fn reset(&self, key: &ObjectKey) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if states.remove(key).is_some() {
            debug!("Reset backoff for {}", key);
        }
    }

    /// Upper bound on any delay handed out
    pub fn max_delay(&self) -> Duration {
        self.max
    }
}
