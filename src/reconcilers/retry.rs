// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exponential backoff for requeuing failed reconciliations.
//!
//! The work queue counts consecutive failures per key and asks the
//! [`ExponentialBackoff`] policy how long to wait before the next attempt. A
//! successful reconcile resets the count.

use crate::constants::{
    BACKOFF_MULTIPLIER, BACKOFF_RANDOMIZATION_FACTOR, DEFAULT_BACKOFF_BASE_MILLIS,
    DEFAULT_BACKOFF_MAX_SECS,
};
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Upper bound of the delay before jitter
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Create a backoff policy with the default multiplier and jitter.
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: BACKOFF_RANDOMIZATION_FACTOR,
        }
    }

    /// Same policy with a different randomization factor; `0.0` disables jitter.
    #[must_use]
    pub fn with_randomization_factor(mut self, randomization_factor: f64) -> Self {
        self.randomization_factor = randomization_factor;
        self
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// `initial * multiplier^(failures - 1)`, capped at `max_interval`, then jittered.
    /// Zero failures means no delay.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = if secs.is_finite() {
            Duration::from_secs_f64(secs).min(self.max_interval)
        } else {
            self.max_interval
        };

        self.apply_jitter(capped)
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::rng().random_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl Default for ExponentialBackoff {
    /// # Retry Schedule
    ///
    /// With the defaults, retries occur at approximately 1s, 2s, 4s, 8s, ... capped
    /// at 5 minutes, each ±10%.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_BACKOFF_BASE_MILLIS),
            Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
        )
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
