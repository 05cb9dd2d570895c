// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use rand::Rng;

use crate::error::TransportError;

/// Pluggable retry policy for connection establishment and explicit
/// follow-up sends.  Retries never happen once a session has delivered an
/// event to the caller — the transport enforces that by only consulting the
/// policy before a session exists.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts, including the first.
    fn max_attempts(&self) -> u32;

    /// Whether `error` on the given (1-based) attempt warrants another try.
    fn should_retry(&self, error: &TransportError, attempt: u32) -> bool;

    /// How long to wait before the attempt following `attempt`.
    fn delay(&self, attempt: u32) -> Duration;
}

/// Default policy: 3 attempts, exponential backoff with jitter, retry on
/// connect failures, timeouts and 5xx responses only.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempts: 3,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }

    fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        if attempt >= self.attempts {
            return false;
        }
        match error {
            TransportError::Connect(_) | TransportError::Timeout(_) => true,
            TransportError::Http { status, .. } => *status >= 500,
            TransportError::RetryExhausted { .. } | TransportError::SessionClosed => false,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        // Shift capped so pathological attempt counts cannot overflow.
        let exponent = attempt.saturating_sub(1).min(16);
        let exp = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        // Full jitter over the upper half of the window.
        let millis = exp.as_millis().max(1) as u64;
        let jittered = rand::thread_rng().gen_range(millis / 2..=millis);
        Duration::from_millis(jittered)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
