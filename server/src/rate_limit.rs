//! In-memory throttling of failed sign-in attempts.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by normalized email. Only failures are recorded; a successful login
//! resets the key. Once the window holds `max_failures` entries, further
//! attempts for that email are refused before the password is checked.
//! Every recorded failure also drops emails whose window has emptied, so
//! unknown addresses do not accumulate.
//!
//! TRADE-OFFS
//! ==========
//! The check and the record are separate steps, so concurrent bad attempts
//! can overshoot the limit by the number in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("too many failed attempts (max {limit} per {window_secs}s)")]
pub struct Throttled {
    pub limit: usize,
    pub window_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoginThrottle {
    failures: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_failures: usize,
    window: Duration,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self { failures: Arc::default(), max_failures, window }
    }

    /// Refuse the attempt if `email` has used up its failures.
    ///
    /// # Errors
    ///
    /// Returns [`Throttled`] while the window is full.
    pub fn check(&self, email: &str) -> Result<(), Throttled> {
        self.check_at(email, Instant::now())
    }

    fn check_at(&self, email: &str, now: Instant) -> Result<(), Throttled> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(deque) = failures.get_mut(email) else {
            return Ok(());
        };
        prune_window(deque, now, self.window);
        if deque.is_empty() {
            failures.remove(email);
            return Ok(());
        }
        if deque.len() >= self.max_failures {
            return Err(Throttled { limit: self.max_failures, window_secs: self.window.as_secs() });
        }
        Ok(())
    }

    /// Count a failed attempt for `email`.
    pub fn record_failure(&self, email: &str) {
        self.record_failure_at(email, Instant::now());
    }

    fn record_failure_at(&self, email: &str, now: Instant) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.retain(|_, deque| {
            prune_window(deque, now, self.window);
            !deque.is_empty()
        });
        failures.entry(email.to_owned()).or_default().push_back(now);
    }

    /// Forget recorded failures for `email`.
    pub fn reset(&self, email: &str) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).remove(email);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
