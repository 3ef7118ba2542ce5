//! Polling waiters.
//!
//! [`create_waiter`] repeatedly runs an acceptor check until it reports a terminal
//! state, the caller's deadline would be exceeded, or the abort token fires. Delays
//! grow exponentially with jitter between the operation's minimum and maximum.
//! [`WaiterDefinition`] builds the acceptor check for one operation from
//! declarative acceptors.

mod acceptor;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use acceptor::{Acceptor, Matcher, WaiterDefinition};

use crate::error::SdkError;
use crate::exception::ResponseMetadata;

/// Delay bounds used when the caller does not override them.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(120);

/// Outcome of one poll, or of a whole wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaiterState {
    Aborted,
    Failure,
    Success,
    Retry,
    Timeout,
}

impl fmt::Display for WaiterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaiterState::Aborted => "ABORTED",
            WaiterState::Failure => "FAILURE",
            WaiterState::Success => "SUCCESS",
            WaiterState::Retry => "RETRY",
            WaiterState::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// What the last poll observed.
#[derive(Debug)]
pub enum WaiterReason<O> {
    Output { output: O, metadata: ResponseMetadata },
    Error(SdkError),
}

impl<O> WaiterReason<O> {
    /// `"<status>: <message>"`, as counted in [`WaiterResult::observed_responses`].
    pub fn observed_message(&self) -> String {
        match self {
            WaiterReason::Output { metadata, .. } => {
                format!("{}: OK", status_text(metadata.http_status_code))
            }
            WaiterReason::Error(SdkError::Service(exception)) => format!(
                "{}: {}",
                status_text(exception.metadata().http_status_code),
                exception.message()
            ),
            WaiterReason::Error(other) => other.to_string(),
        }
    }

    pub fn output(&self) -> Option<&O> {
        match self {
            WaiterReason::Output { output, .. } => Some(output),
            WaiterReason::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SdkError> {
        match self {
            WaiterReason::Error(error) => Some(error),
            WaiterReason::Output { .. } => None,
        }
    }
}

fn status_text(status: Option<u16>) -> String {
    status.map_or_else(|| "Unknown".to_string(), |s| s.to_string())
}

/// Result of one acceptor check.
#[derive(Debug)]
pub struct AcceptorOutcome<O> {
    pub state: WaiterState,
    pub reason: Option<WaiterReason<O>>,
}

/// Result of a whole wait.
#[derive(Debug)]
pub struct WaiterResult<O> {
    pub state: WaiterState,
    pub reason: Option<WaiterReason<O>>,
    /// How often each distinct response was observed.
    pub observed_responses: BTreeMap<String, u32>,
}

impl<O> WaiterResult<O> {
    fn summary(&self) -> String {
        let observed = self
            .observed_responses
            .iter()
            .map(|(message, count)| format!("{message} (x{count})"))
            .collect::<Vec<_>>()
            .join(", ");
        let reason = self
            .reason
            .as_ref()
            .map(WaiterReason::observed_message)
            .unwrap_or_else(|| "none".to_string());
        format!(
            "state {}, last reason {reason}, observed responses [{observed}]",
            self.state
        )
    }
}

/// Raised by the throwing entry point, and by invalid timing options in both.
#[derive(Debug, Error)]
pub enum WaiterError<O: fmt::Debug> {
    #[error("Waiter was aborted: {}", .0.summary())]
    Aborted(WaiterResult<O>),

    #[error("Waiter has timed out: {}", .0.summary())]
    Timeout(WaiterResult<O>),

    #[error("Waiter entered a failure state: {}", .0.summary())]
    Failure(WaiterResult<O>),

    #[error("{0}")]
    InvalidConfiguration(String),
}

impl<O: fmt::Debug> WaiterError<O> {
    /// The result carried by a terminal error.
    pub fn result(&self) -> Option<&WaiterResult<O>> {
        match self {
            WaiterError::Aborted(result)
            | WaiterError::Timeout(result)
            | WaiterError::Failure(result) => Some(result),
            WaiterError::InvalidConfiguration(_) => None,
        }
    }
}

/// Per-operation delay bounds, deserialisable from waiter definitions
/// (`{"minDelay": 60, "maxDelay": 3600}`, in seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiterDelays {
    #[serde(default = "default_min_delay_secs")]
    pub min_delay: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay: u64,
}

fn default_min_delay_secs() -> u64 {
    DEFAULT_MIN_DELAY.as_secs()
}

fn default_max_delay_secs() -> u64 {
    DEFAULT_MAX_DELAY.as_secs()
}

impl Default for WaiterDelays {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay_secs(),
            max_delay: default_max_delay_secs(),
        }
    }
}

impl WaiterDelays {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay: min_delay.as_secs(),
            max_delay: max_delay.as_secs(),
        }
    }
}

/// Caller-supplied waiter parameters.
#[derive(Debug, Clone)]
pub struct WaiterOptions {
    /// Upper bound on the total time spent waiting.
    pub max_wait_time: Duration,
    pub min_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub abort_signal: Option<CancellationToken>,
}

impl WaiterOptions {
    pub fn new(max_wait_time: Duration) -> Self {
        Self {
            max_wait_time,
            min_delay: None,
            max_delay: None,
            abort_signal: None,
        }
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = Some(min_delay);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_abort_signal(mut self, token: CancellationToken) -> Self {
        self.abort_signal = Some(token);
        self
    }
}

/// Options after applying operation defaults.
#[derive(Debug, Clone)]
struct ResolvedOptions {
    max_wait_time: Duration,
    min_delay: Duration,
    max_delay: Duration,
    abort_signal: Option<CancellationToken>,
}

fn resolve_options(options: WaiterOptions, defaults: WaiterDelays) -> ResolvedOptions {
    ResolvedOptions {
        max_wait_time: options.max_wait_time,
        min_delay: options
            .min_delay
            .unwrap_or(Duration::from_secs(defaults.min_delay)),
        max_delay: options
            .max_delay
            .unwrap_or(Duration::from_secs(defaults.max_delay)),
        abort_signal: options.abort_signal,
    }
}

fn validate(options: &ResolvedOptions) -> Result<(), String> {
    let secs = |d: Duration| d.as_secs_f64();
    if options.max_wait_time.is_zero() {
        return Err("WaiterConfiguration.maxWaitTime must be greater than 0".into());
    }
    if options.min_delay.is_zero() {
        return Err("WaiterConfiguration.minDelay must be greater than 0".into());
    }
    if options.max_delay.is_zero() {
        return Err("WaiterConfiguration.maxDelay must be greater than 0".into());
    }
    if options.max_wait_time <= options.min_delay {
        return Err(format!(
            "WaiterConfiguration.maxWaitTime [{}] must be greater than WaiterConfiguration.minDelay [{}] for this waiter",
            secs(options.max_wait_time),
            secs(options.min_delay)
        ));
    }
    if options.max_delay < options.min_delay {
        return Err(format!(
            "WaiterConfiguration.maxDelay [{}] must be greater than WaiterConfiguration.minDelay [{}] for this waiter",
            secs(options.max_delay),
            secs(options.min_delay)
        ));
    }
    Ok(())
}

/// Delay before poll `attempt + 1`: uniform in `[min, min * 2^(attempt-1)]`, or
/// exactly `max` once the exponent passes `log2(max / min) + 1`.
fn exponential_backoff_with_jitter(min_delay: Duration, max_delay: Duration, attempt: u32) -> Duration {
    let min = min_delay.as_secs_f64();
    let max = max_delay.as_secs_f64();
    let attempt_ceiling = (max / min).log2() + 1.0;
    if f64::from(attempt) > attempt_ceiling {
        return max_delay;
    }
    let upper = (min * 2f64.powi(attempt.saturating_sub(1) as i32)).min(max);
    if upper <= min {
        return min_delay;
    }
    Duration::from_secs_f64(rand::thread_rng().gen_range(min..=upper))
}

/// Poll `check` until a terminal state.
///
/// Returns `Err` only for invalid options. `Aborted`, `Timeout`, `Failure` and
/// `Success` are all reported through the returned [`WaiterResult`].
pub async fn create_waiter<O, F, Fut>(
    options: WaiterOptions,
    defaults: WaiterDelays,
    check: F,
) -> Result<WaiterResult<O>, WaiterError<O>>
where
    O: fmt::Debug,
    F: Fn() -> Fut,
    Fut: Future<Output = AcceptorOutcome<O>>,
{
    let options = resolve_options(options, defaults);
    validate(&options).map_err(WaiterError::InvalidConfiguration)?;

    match options.abort_signal.clone() {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Ok(WaiterResult {
                    state: WaiterState::Aborted,
                    reason: None,
                    observed_responses: BTreeMap::new(),
                }),
                result = run_polling(&options, check) => Ok(result),
            }
        }
        None => Ok(run_polling(&options, check).await),
    }
}

async fn run_polling<O, F, Fut>(options: &ResolvedOptions, check: F) -> WaiterResult<O>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AcceptorOutcome<O>>,
{
    let mut observed_responses = BTreeMap::new();
    let wait_until = Instant::now() + options.max_wait_time;
    let mut outcome = check().await;
    record(&mut observed_responses, &outcome);
    let mut attempt = 1u32;

    loop {
        if outcome.state != WaiterState::Retry {
            return WaiterResult {
                state: outcome.state,
                reason: outcome.reason,
                observed_responses,
            };
        }
        if options
            .abort_signal
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return WaiterResult {
                state: WaiterState::Aborted,
                reason: outcome.reason,
                observed_responses,
            };
        }

        let delay = exponential_backoff_with_jitter(options.min_delay, options.max_delay, attempt);
        if Instant::now() + delay > wait_until {
            return WaiterResult {
                state: WaiterState::Timeout,
                reason: outcome.reason,
                observed_responses,
            };
        }
        debug!("Waiter attempt {attempt} not in a terminal state; polling again in {delay:?}");
        tokio::time::sleep(delay).await;

        outcome = check().await;
        record(&mut observed_responses, &outcome);
        attempt += 1;
    }
}

fn record<O>(observed_responses: &mut BTreeMap<String, u32>, outcome: &AcceptorOutcome<O>) {
    if let Some(reason) = &outcome.reason {
        *observed_responses
            .entry(reason.observed_message())
            .or_insert(0) += 1;
    }
}

/// Convert a non-success result into the matching [`WaiterError`].
pub fn check_exceptions<O: fmt::Debug>(
    result: WaiterResult<O>,
) -> Result<WaiterResult<O>, WaiterError<O>> {
    match result.state {
        WaiterState::Aborted => Err(WaiterError::Aborted(result)),
        WaiterState::Timeout => Err(WaiterError::Timeout(result)),
        WaiterState::Failure => Err(WaiterError::Failure(result)),
        WaiterState::Success | WaiterState::Retry => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn outcome(state: WaiterState) -> AcceptorOutcome<&'static str> {
        AcceptorOutcome {
            state,
            reason: Some(WaiterReason::Output {
                output: "polled",
                metadata: ResponseMetadata {
                    http_status_code: Some(200),
                    ..ResponseMetadata::default()
                },
            }),
        }
    }

    fn options(max_wait_secs: u64) -> WaiterOptions {
        WaiterOptions::new(Duration::from_secs(max_wait_secs))
    }

    #[test]
    fn test_validation_messages() {
        let defaults = WaiterDelays::default();
        let check = |opts: WaiterOptions| validate(&resolve_options(opts, defaults)).unwrap_err();

        assert_eq!(
            check(options(0)),
            "WaiterConfiguration.maxWaitTime must be greater than 0"
        );
        assert_eq!(
            check(options(10).with_min_delay(Duration::ZERO)),
            "WaiterConfiguration.minDelay must be greater than 0"
        );
        assert_eq!(
            check(options(10).with_max_delay(Duration::ZERO)),
            "WaiterConfiguration.maxDelay must be greater than 0"
        );
        assert!(check(options(2)).contains("maxWaitTime [2] must be greater than"));
        assert!(check(options(100).with_min_delay(Duration::from_secs(10)).with_max_delay(
            Duration::from_secs(5)
        ))
        .contains("maxDelay [5] must be greater than WaiterConfiguration.minDelay [10]"));
    }

    #[test]
    fn test_backoff_bounds() {
        let min = Duration::from_secs(2);
        let max = Duration::from_secs(120);
        assert_eq!(exponential_backoff_with_jitter(min, max, 1), min);
        for _ in 0..50 {
            let delay = exponential_backoff_with_jitter(min, max, 3);
            assert!(delay >= min && delay <= Duration::from_secs(8));
        }
        // log2(60) + 1 is just under 7
        assert_eq!(exponential_backoff_with_jitter(min, max, 7), max);
    }

    #[test]
    fn test_delays_deserialize_with_defaults() {
        let delays: WaiterDelays = serde_json::from_str(r#"{"minDelay": 60}"#).unwrap();
        assert_eq!(delays.min_delay, 60);
        assert_eq!(delays.max_delay, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_success() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let started = Instant::now();

        let result = create_waiter(options(60), WaiterDelays::default(), || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                outcome(if n < 3 {
                    WaiterState::Retry
                } else {
                    WaiterState::Success
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(result.state, WaiterState::Success);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(result.observed_responses.get("200: OK"), Some(&3));
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_before_exceeding_deadline() {
        let result = create_waiter(options(5), WaiterDelays::default(), || async {
            outcome(WaiterState::Retry)
        })
        .await
        .unwrap();
        assert_eq!(result.state, WaiterState::Timeout);
        assert!(result.reason.is_some());

        let err = check_exceptions(result).unwrap_err();
        assert!(err.to_string().starts_with("Waiter has timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_signal() {
        let token = CancellationToken::new();
        token.cancel();
        let result = create_waiter(
            options(60).with_abort_signal(token),
            WaiterDelays::default(),
            || async { outcome(WaiterState::Retry) },
        )
        .await
        .unwrap();
        assert_eq!(result.state, WaiterState::Aborted);
        assert!(matches!(
            check_exceptions(result),
            Err(WaiterError::Aborted(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let result = create_waiter(options(0), WaiterDelays::default(), || async {
            outcome(WaiterState::Success)
        })
        .await;
        assert!(matches!(result, Err(WaiterError::InvalidConfiguration(_))));
    }
}
