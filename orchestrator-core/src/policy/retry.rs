use chrono::Duration;
use rand::Rng;

use crate::error::FailureHint;

/// `base = 2s`, `cap = 5 min`. Jitter is uniform over `[0, base)` and
/// is required: without it, a mass failure desynchronises into
/// lockstep retries that hammer the queue in unison.
pub const BASE_BACKOFF_SECS: i64 = 2;
pub const CAP_BACKOFF_SECS: i64 = 300;

/// `backoff(n) = min(base * 2^(n-1) + jitter, cap)`.
pub fn backoff(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF_SECS.saturating_mul(1i64 << attempt.saturating_sub(1).min(20));
    let jitter_secs = rand::thread_rng().gen_range(0..BASE_BACKOFF_SECS.max(1));
    let total = exp.saturating_add(jitter_secs).min(CAP_BACKOFF_SECS);
    Duration::seconds(total)
}

/// Outcome of applying the retry/DLQ policy to a failed or
/// lease-expired job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// `retry_count` is the new value to store.
    Retry { retry_count: u32, backoff: Duration },
    DeadLetter,
}

/// §4.4's decision: retry if attempts remain and the failure isn't
/// permanent, otherwise dead-letter.
pub fn decide(retry_count: u32, max_retries: u32, hint: FailureHint) -> RetryDecision {
    if retry_count < max_retries && !hint.is_permanent() {
        let new_count = retry_count + 1;
        RetryDecision::Retry {
            retry_count: new_count,
            backoff: backoff(new_count),
        }
    } else {
        RetryDecision::DeadLetter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let b1 = backoff(1).num_seconds();
        let b2 = backoff(2).num_seconds();
        assert!(b1 >= BASE_BACKOFF_SECS && b1 < BASE_BACKOFF_SECS * 2);
        assert!(b2 >= BASE_BACKOFF_SECS * 2 && b2 < BASE_BACKOFF_SECS * 3);
        assert_eq!(backoff(30).num_seconds(), CAP_BACKOFF_SECS);
    }

    #[test]
    fn decide_retries_while_attempts_remain() {
        let d = decide(0, 3, FailureHint::Retryable);
        assert!(matches!(d, RetryDecision::Retry { retry_count: 1, .. }));

        let d = decide(3, 3, FailureHint::Retryable);
        assert_eq!(d, RetryDecision::DeadLetter);

        let d = decide(0, 3, FailureHint::Permanent);
        assert_eq!(d, RetryDecision::DeadLetter);
    }
}
