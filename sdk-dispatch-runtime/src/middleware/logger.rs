use std::any::Any;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{HandlerArgs, HandlerContext, HandlerOutput, Middleware, Next};
use crate::error::SdkResult;

pub const LOGGER_MIDDLEWARE: &str = "loggerMiddleware";

/// Logs each call through the client's configured logger.
///
/// Inputs and outputs pass through the command's sensitive-log filters first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMiddleware;

#[async_trait]
impl Middleware for LoggerMiddleware {
    async fn handle(
        &self,
        args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let erased_input: &dyn Any = &*args.input;
        let input = (context.input_filter_sensitive_log)(erased_input);

        match next.run(args, context).await {
            Ok(output) => {
                let logged_output = output
                    .output
                    .as_deref()
                    .map(|o| (context.output_filter_sensitive_log)(o as &dyn Any))
                    .unwrap_or(Value::Null);
                let entry = json!({
                    "clientName": context.client_name,
                    "commandName": context.command_name,
                    "input": input,
                    "output": logged_output,
                    "metadata": output.metadata,
                });
                context.logger.info(&entry.to_string());
                Ok(output)
            }
            Err(error) => {
                let entry = json!({
                    "clientName": context.client_name,
                    "commandName": context.command_name,
                    "input": input,
                    "error": error.to_string(),
                    "metadata": error.service_exception().map(|e| e.metadata()),
                });
                context.logger.error(&entry.to_string());
                Err(error)
            }
        }
    }
}
