// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::common::ObjectKey;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Exponential backoff: the n-th consecutive failure waits base * 2^(n-1),
/// never longer than max. With a non-zero jitter, up to that fraction of
/// the delay is added at random, still capped at max.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
    pub jitter: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> ExponentialBackoff {
        ExponentialBackoff {
            base: Duration::from_millis(500),
            max: Duration::from_secs(300),
            max_attempts: 10,
            jitter: 0.1,
        }
    }
}

impl ExponentialBackoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max));
        if self.jitter > 0.0 {
            let factor = 1.0 + rand::thread_rng().gen_range(0.0..=self.jitter);
            Duration::try_from_secs_f64(delay.as_secs_f64() * factor).map_or(self.max, |delay| delay.min(self.max))
        } else {
            delay
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    // 1 for the first failure in a row.
    pub attempt: u32,
    pub delay: Duration,
    // The failure count went past max_attempts; retries go on at the capped delay.
    pub exhausted: bool,
}

/// RetryTracker counts consecutive reconcile failures per key.
#[derive(Debug, Default)]
pub struct RetryTracker {
    backoff: ExponentialBackoff,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl RetryTracker {
    pub fn new(backoff: ExponentialBackoff) -> RetryTracker {
        RetryTracker {
            backoff,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_failure(&self, key: &ObjectKey) -> RetryDecision {
        let attempt = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let exhausted = attempt > self.backoff.max_attempts;
        let delay = if exhausted {
            self.backoff.max
        } else {
            self.backoff.delay(attempt)
        };
        RetryDecision {
            attempt,
            delay,
            exhausted,
        }
    }

    pub fn on_success(&self, key: &ObjectKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drops the failure count of a key that will not be reconciled again.
    pub fn forget(&self, key: &ObjectKey) {
        self.on_success(key);
    }

    pub fn attempts(&self, key: &ObjectKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}
