//! Retry policy for provider calls: exponential backoff, retryable-only.
//!
//! Only errors the provider classifies as retryable (5xx/429-equivalent,
//! transient network faults) are retried; everything else propagates on the
//! first attempt.

use crate::error::{ClerkError, Result};
use std::time::Duration;

/// Backoff configuration. Defaults mirror the reference client: 1s base,
/// doubled per attempt, capped at 4s, 3 attempts total.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// No sleeping; used by tests that only care about attempt counts.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts,
        }
    }
}

/// Run `operation` under the policy. The final failure is returned verbatim
/// so callers still see the provider's message.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut delay = policy.base_delay;
    let mut last_error: Option<ClerkError> = None;

    for attempt in 0..policy.max_attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt + 1 == policy.max_attempts {
                    return Err(err);
                }
                tracing::warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "provider call failed, retrying"
                );
                last_error = Some(err);
                std::thread::sleep(delay);
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }

    // Unreachable for max_attempts >= 1; kept total for max_attempts == 0.
    Err(last_error
        .unwrap_or_else(|| ClerkError::provider_terminal(format!("{label}: no attempts made"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retryable_error_is_retried_until_success() {
        let calls = Cell::new(0u32);
        let result = with_retry(&RetryPolicy::immediate(3), "list", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(ClerkError::provider_retryable("503 backend flake"))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn terminal_error_propagates_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<()> = with_retry(&RetryPolicy::immediate(3), "copy", || {
            calls.set(calls.get() + 1);
            Err(ClerkError::provider_terminal("403 forbidden"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn validation_error_is_never_retried() {
        let calls = Cell::new(0u32);
        let result: Result<()> = with_retry(&RetryPolicy::immediate(3), "move", || {
            calls.set(calls.get() + 1);
            Err(ClerkError::validation("bad folder id"))
        });
        assert!(matches!(result, Err(ClerkError::Validation(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn attempts_are_bounded() {
        let calls = Cell::new(0u32);
        let result: Result<()> = with_retry(&RetryPolicy::immediate(3), "list", || {
            calls.set(calls.get() + 1);
            Err(ClerkError::provider_retryable("always down"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }
}
