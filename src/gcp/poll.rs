//! Bounded polling with exponential backoff
//!
//! Long-running operations, endpoint group visibility and backend health all
//! converge eventually; this module bounds how long we wait for them.

use crate::error::{Result, TdError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Default first wait between polls (1 second)
const INITIAL_INTERVAL_MILLIS: u64 = 1_000;

/// Default cap on a single wait (10 seconds)
const MAX_INTERVAL_MILLIS: u64 = 10_000;

/// Default total time budget per wait (10 minutes)
const MAX_ELAPSED_SECS: u64 = 600;

const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Polling policy, configurable per deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub max_elapsed_secs: u64,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: INITIAL_INTERVAL_MILLIS,
            max_interval_ms: MAX_INTERVAL_MILLIS,
            max_elapsed_secs: MAX_ELAPSED_SECS,
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
        }
    }
}

impl PollPolicy {
    /// Policy that never waits; the first pending result times out
    pub fn immediate() -> Self {
        Self {
            initial_interval_ms: 0,
            max_interval_ms: 0,
            max_elapsed_secs: 0,
            multiplier: 1.0,
            randomization_factor: 0.0,
        }
    }

    /// Reject values that cannot drive a backoff
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(TdError::InvalidArgument(format!(
                "polling multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(TdError::InvalidArgument(format!(
                "polling randomization_factor must be within [0.0, 1.0], got {}",
                self.randomization_factor
            )));
        }
        if self.initial_interval_ms > self.max_interval_ms {
            return Err(TdError::InvalidArgument(format!(
                "polling initial_interval_ms ({}) exceeds max_interval_ms ({})",
                self.initial_interval_ms, self.max_interval_ms
            )));
        }
        Ok(())
    }
}

/// Exponential backoff with jitter and a total elapsed-time budget.
pub struct ExponentialBackoff {
    current_interval: Duration,
    max_interval: Duration,
    max_elapsed_time: Duration,
    multiplier: f64,
    randomization_factor: f64,
    start_time: Instant,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: &PollPolicy) -> Self {
        Self {
            current_interval: Duration::from_millis(policy.initial_interval_ms),
            max_interval: Duration::from_millis(policy.max_interval_ms),
            max_elapsed_time: Duration::from_secs(policy.max_elapsed_secs),
            multiplier: if policy.multiplier.is_finite() {
                policy.multiplier.max(1.0)
            } else {
                1.0
            },
            randomization_factor: if policy.randomization_factor.is_finite() {
                policy.randomization_factor.clamp(0.0, 1.0)
            } else {
                0.0
            },
            start_time: Instant::now(),
            attempts: 0,
        }
    }

    /// Next wait, or `None` once the elapsed-time budget is spent
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.start_time.elapsed() >= self.max_elapsed_time {
            return None;
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::try_from_secs_f64(next)
            .map_or(self.max_interval, |d| d.min(self.max_interval));
        self.attempts += 1;

        Some(jittered)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range((secs - delta)..=(secs + delta));

        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(interval)
    }
}

/// Outcome of one poll
pub enum Attempt<T> {
    Ready(T),
    /// Not there yet; the string says what is still missing
    Pending(String),
}

/// Call `check` until it is ready, sleeping with backoff between calls.
///
/// Errors from `check` abort the wait. Running out of budget yields
/// `TdError::Timeout` naming `condition` and the last pending reason.
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, condition: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let mut backoff = ExponentialBackoff::new(policy);

    loop {
        match check().await? {
            Attempt::Ready(value) => return Ok(value),
            Attempt::Pending(reason) => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(TdError::Timeout {
                        condition: format!("{}: {}", condition, reason),
                        elapsed: backoff.elapsed(),
                    });
                };
                tracing::debug!(
                    "Waiting {:?} for {} (attempt {}): {}",
                    delay,
                    condition,
                    backoff.attempts(),
                    reason
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            initial_interval_ms: 1,
            max_interval_ms: 4,
            max_elapsed_secs: 5,
            multiplier: 2.0,
            randomization_factor: 0.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = ExponentialBackoff::new(&fast_policy());
        let waits: Vec<_> = (0..5).map(|_| backoff.next_backoff().unwrap()).collect();
        assert_eq!(waits[0], Duration::from_millis(1));
        assert_eq!(waits[1], Duration::from_millis(2));
        assert_eq!(waits[2], Duration::from_millis(4));
        assert_eq!(waits[4], Duration::from_millis(4));
    }

    #[test]
    fn test_default_and_immediate_policies_are_valid() {
        PollPolicy::default().validate().unwrap();
        PollPolicy::immediate().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_shrinking_multiplier() {
        for multiplier in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let policy = PollPolicy {
                multiplier,
                ..PollPolicy::default()
            };
            assert!(
                matches!(policy.validate(), Err(TdError::InvalidArgument(_))),
                "multiplier {} accepted",
                multiplier
            );
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_jitter() {
        for randomization_factor in [-0.5, 1.5, f64::NAN] {
            let policy = PollPolicy {
                randomization_factor,
                ..PollPolicy::default()
            };
            assert!(matches!(policy.validate(), Err(TdError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_validate_rejects_initial_above_cap() {
        let policy = PollPolicy {
            initial_interval_ms: 20_000,
            max_interval_ms: 10_000,
            ..PollPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(TdError::InvalidArgument(_))));
    }

    #[test]
    fn test_backoff_survives_unvalidated_values() {
        let policy = PollPolicy {
            multiplier: -2.0,
            randomization_factor: -0.5,
            ..fast_policy()
        };
        let mut backoff = ExponentialBackoff::new(&policy);
        for _ in 0..3 {
            assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
        }

        let huge = PollPolicy {
            multiplier: f64::MAX,
            ..fast_policy()
        };
        let mut backoff = ExponentialBackoff::new(&huge);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(4)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(4)));
    }

    #[test]
    fn test_immediate_policy_has_no_budget() {
        let mut backoff = ExponentialBackoff::new(&PollPolicy::immediate());
        assert!(backoff.next_backoff().is_none());
    }

    #[tokio::test]
    async fn test_poll_until_ready_after_retries() {
        let calls = AtomicU32::new(0);
        let value = poll_until(&fast_policy(), "counter", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Ok(Attempt::Pending(format!("at {}", n)))
                } else {
                    Ok(Attempt::Ready(n))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out_with_reason() {
        let err = poll_until(&PollPolicy::immediate(), "NEG td-neg", || async {
            Ok::<_, TdError>(Attempt::<()>::Pending("not visible in us-central1-a".into()))
        })
        .await
        .unwrap_err();

        match err {
            TdError::Timeout { condition, .. } => {
                assert!(condition.contains("NEG td-neg"));
                assert!(condition.contains("us-central1-a"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_poll_until_propagates_errors() {
        let err = poll_until(&fast_policy(), "op", || async {
            Err::<Attempt<()>, _>(TdError::Api {
                status: 500,
                message: "boom".into(),
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TdError::Api { status: 500, .. }));
    }
}
