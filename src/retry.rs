// src/retry.rs

use crate::config::RetryConfig;
use crate::service::{FailureClass, ServiceErrorKind};
use rand::Rng;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: bool,
    retry_incomplete_payloads: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: config.jitter,
            retry_incomplete_payloads: config.retry_incomplete_payloads,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `base_delay * 2^(attempt - 1)`, attempts counted from 1.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Decides whether attempt number `attempt` (1-based), which failed with
    /// `kind`, gets another try.
    pub fn decide(&self, attempt: u32, kind: ServiceErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        match kind.class() {
            FailureClass::Transient => {
                RetryDecision::RetryAfter(self.with_jitter(self.backoff_delay(attempt)))
            }
            FailureClass::Unclassified => RetryDecision::RetryAfter(self.base_delay),
            FailureClass::Fatal => {
                if kind == ServiceErrorKind::IncompletePayload && self.retry_incomplete_payloads {
                    RetryDecision::RetryAfter(Duration::ZERO)
                } else {
                    RetryDecision::GiveUp
                }
            }
        }
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let max_extra = (delay.as_millis() / 4) as u64;
        if max_extra == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        delay + Duration::from_millis(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&RetryConfig::default())
    }
}
