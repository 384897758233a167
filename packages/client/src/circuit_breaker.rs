//! Per-resource circuit breaker.
//!
//! Counts consecutive failed calls against a logical resource. Once the
//! count reaches the threshold the breaker opens and every call is
//! rejected without touching the network. After the cooldown the
//! breaker closes again but keeps its failure count, so the next call
//! has to prove the backend is healthy: one more failure reopens it
//! immediately, one success resets it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BreakerSettings;

/// Whether calls are currently allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are short-circuited.
    Open,
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakerSnapshot {
    /// Failures since the last success.
    pub failure_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure_at: Option<Instant>,
    /// Whether the breaker is open.
    pub is_open: bool,
}

/// Circuit breaker for a single logical resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    resource: String,
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerSnapshot>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(resource: &str, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            resource: resource.to_string(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerSnapshot::default()),
        }
    }

    /// Returns the logical resource this breaker guards.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns `true` if a call may proceed.
    ///
    /// An open breaker whose cooldown has elapsed is closed here.
    #[must_use]
    pub fn allow_request(&self) -> bool {
        let mut state = self.lock();
        if !state.is_open {
            return true;
        }

        let cooled_down = state
            .last_failure_at
            .is_none_or(|at| at.elapsed() >= self.cooldown);
        if cooled_down {
            log::info!(
                "Circuit breaker for '{}' cooled down after {:?}; allowing a trial request",
                self.resource,
                self.cooldown
            );
            state.is_open = false;
        }
        cooled_down
    }

    /// Records a successful call, closing the breaker.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.is_open || state.failure_count > 0 {
            log::info!(
                "Circuit breaker for '{}' reset after success ({} prior failures)",
                self.resource,
                state.failure_count
            );
        }
        *state = BreakerSnapshot::default();
    }

    /// Records a failed call, opening the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Instant::now());

        if !state.is_open && state.failure_count >= self.failure_threshold {
            state.is_open = true;
            log::warn!(
                "Circuit breaker for '{}' opened after {} consecutive failures; \
                 rejecting calls for {:?}",
                self.resource,
                state.failure_count,
                self.cooldown
            );
        }
    }

    /// Returns the current state without applying the cooldown.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        if self.lock().is_open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Returns a copy of the breaker's counters.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, BreakerSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands out one shared [`CircuitBreaker`] per logical resource.
///
/// Owned by a single client instance; every caller sharing the client
/// shares its breakers.
#[derive(Debug)]
pub struct BreakerRegistry {
    settings: BreakerSettings,
    breakers: Mutex<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the breaker for `resource`, creating it on first use.
    #[must_use]
    pub fn get(&self, resource: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(breakers.entry(resource.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                resource,
                self.settings.failure_threshold,
                self.settings.cooldown(),
            ))
        }))
    }
}
