//! Retry policies consulted by the retry middleware.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::error::SdkError;
use crate::exception::Fault;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

const THROTTLING_ERROR_CODES: [&str; 10] = [
    "BandwidthLimitExceeded",
    "EC2ThrottledException",
    "LimitExceededException",
    "PriorRequestNotComplete",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "RequestThrottledException",
    "SlowDown",
    "ThrottlingException",
];
const TRANSIENT_ERROR_CODES: [&str; 4] = [
    "TimeoutError",
    "RequestTimeout",
    "RequestTimeoutException",
    "Throttling",
];
const TRANSIENT_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Decides whether a failed attempt is retried and after what delay.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    /// `attempt` is the 1-based number of the attempt that just failed.
    /// `None` means give up and surface `error`.
    fn retry_delay(&self, error: &SdkError, attempt: u32) -> Option<Duration>;

    fn max_attempts(&self) -> u32;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryStrategy;

impl RetryStrategy for NoRetryStrategy {
    fn retry_delay(&self, _error: &SdkError, _attempt: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Bounded attempts with exponential backoff and full jitter.
///
/// Transport errors, server faults, throttling codes and transient HTTP statuses
/// are retried. Everything else is surfaced immediately.
#[derive(Debug, Clone)]
pub struct StandardRetryStrategy {
    max_attempts: u32,
    base_delay: Duration,
    max_backoff: Duration,
}

impl Default for StandardRetryStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl StandardRetryStrategy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: DEFAULT_BASE_DELAY,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn is_retryable(error: &SdkError) -> bool {
        match error {
            SdkError::Transport(_) => true,
            SdkError::Service(exception) => {
                let name = exception.name();
                exception.fault() == Fault::Server
                    || THROTTLING_ERROR_CODES
                        .iter()
                        .chain(TRANSIENT_ERROR_CODES.iter())
                        .any(|code| *code == name)
                    || exception
                        .metadata()
                        .http_status_code
                        .is_some_and(|code| TRANSIENT_STATUS_CODES.contains(&code))
            }
            _ => false,
        }
    }

    /// Upper bound of the jittered delay before attempt `attempt + 1`.
    fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl RetryStrategy for StandardRetryStrategy {
    fn retry_delay(&self, error: &SdkError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !Self::is_retryable(error) {
            return None;
        }
        let ceiling = self.backoff_ceiling(attempt);
        if ceiling.is_zero() {
            return Some(Duration::ZERO);
        }
        Some(rand::thread_rng().gen_range(Duration::ZERO..=ceiling))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{ExceptionShape, ResponseMetadata};
    use rstest::rstest;

    fn service_error(name: &'static str, fault: Fault, status: u16) -> SdkError {
        let metadata = ResponseMetadata {
            http_status_code: Some(status),
            ..ResponseMetadata::default()
        };
        SdkError::Service(ExceptionShape::new(name, fault).build(metadata, None))
    }

    #[rstest]
    #[case(service_error("InternalError", Fault::Server, 500), true)]
    #[case(service_error("ThrottlingException", Fault::Client, 400), true)]
    #[case(service_error("Whatever", Fault::Client, 429), true)]
    #[case(service_error("ValidationException", Fault::Client, 400), false)]
    #[case(SdkError::transport("connection reset"), true)]
    #[case(SdkError::Configuration("no serializer".into()), false)]
    fn test_retryable_classification(#[case] error: SdkError, #[case] expected: bool) {
        assert_eq!(StandardRetryStrategy::is_retryable(&error), expected);
    }

    #[test]
    fn test_delay_bounded_and_attempts_capped() {
        let strategy = StandardRetryStrategy::new(3)
            .with_base_delay(Duration::from_millis(10))
            .with_max_backoff(Duration::from_millis(15));
        let error = SdkError::transport("reset");

        for _ in 0..50 {
            assert!(strategy.retry_delay(&error, 1).unwrap() <= Duration::from_millis(10));
            assert!(strategy.retry_delay(&error, 2).unwrap() <= Duration::from_millis(15));
        }
        assert_eq!(strategy.retry_delay(&error, 3), None);
        assert_eq!(NoRetryStrategy.retry_delay(&error, 1), None);
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        assert_eq!(StandardRetryStrategy::new(0).max_attempts(), 1);
        assert_eq!(StandardRetryStrategy::default().max_attempts(), 3);
    }
}
