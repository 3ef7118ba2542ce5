use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{HandlerArgs, HandlerContext, HandlerOutput, Middleware, Next};
use crate::error::SdkResult;
use crate::retry::RetryStrategy;

pub const RETRY_MIDDLEWARE: &str = "retryMiddleware";

/// Re-runs the inner pipeline while the strategy asks for another attempt.
///
/// Attempts and accumulated delay are recorded on the output metadata, or on the
/// final service exception.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    strategy: Arc<dyn RetryStrategy>,
}

impl RetryMiddleware {
    pub fn new(strategy: Arc<dyn RetryStrategy>) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let mut attempts = 0u32;
        let mut total_delay = Duration::ZERO;
        loop {
            attempts += 1;
            match next.run(args.clone(), context).await {
                Ok(mut output) => {
                    output.metadata.attempts = Some(attempts);
                    output.metadata.total_retry_delay = Some(millis(total_delay));
                    return Ok(output);
                }
                Err(mut error) => match self.strategy.retry_delay(&error, attempts) {
                    Some(delay) => {
                        debug!(
                            "{} attempt {attempts} failed ({error}); retrying in {delay:?}",
                            context.command_name
                        );
                        tokio::time::sleep(delay).await;
                        total_delay += delay;
                    }
                    None => {
                        if let Some(exception) = error.service_exception_mut() {
                            exception.metadata_mut().attempts = Some(attempts);
                            exception.metadata_mut().total_retry_delay = Some(millis(total_delay));
                        }
                        return Err(error);
                    }
                },
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
