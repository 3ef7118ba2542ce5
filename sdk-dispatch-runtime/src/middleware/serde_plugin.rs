use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    HandlerArgs, HandlerContext, HandlerOutput, Middleware, MiddlewareOptions, MiddlewareStack,
    Next, Pluggable, Step,
};
use crate::command::{Deserializer, SerdeContext, Serializer};
use crate::error::{SdkError, SdkResult};
use crate::exception::ResponseMetadata;

pub const SERIALIZER_MIDDLEWARE: &str = "serializerMiddleware";
pub const DESERIALIZER_MIDDLEWARE: &str = "deserializerMiddleware";

/// Turns the typed input into an [`HttpRequest`](crate::http::HttpRequest).
pub struct SerializerMiddleware<I> {
    command_name: String,
    serializer: Option<Serializer<I>>,
}

#[async_trait]
impl<I> Middleware for SerializerMiddleware<I>
where
    I: Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let serializer = self.serializer.as_ref().ok_or_else(|| {
            SdkError::Configuration(format!("{} has no serializer", self.command_name))
        })?;
        let request = {
            let input = (*args.input).downcast_ref::<I>().ok_or_else(|| {
                SdkError::Middleware(format!(
                    "{} received an input of the wrong type",
                    self.command_name
                ))
            })?;
            let serde_context = SerdeContext {
                endpoint: args.endpoint.as_ref(),
                logger: context.logger.as_ref(),
            };
            serializer(input, &serde_context)?
        };
        args.request = Some(request);
        next.run(args, context).await
    }
}

/// Turns the raw response into the typed output, or into the mapped error.
pub struct DeserializerMiddleware<O> {
    command_name: String,
    deserializer: Option<Deserializer<O>>,
}

#[async_trait]
impl<O> Middleware for DeserializerMiddleware<O>
where
    O: Send + Sync + 'static,
{
    async fn handle(
        &self,
        args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let deserializer = self.deserializer.as_ref().ok_or_else(|| {
            SdkError::Configuration(format!("{} has no deserializer", self.command_name))
        })?;
        let endpoint = args.endpoint.clone();
        let inner = next.run(args, context).await?;
        let response = inner.response.ok_or_else(|| {
            SdkError::Middleware("No response reached the deserializer".into())
        })?;

        let serde_context = SerdeContext {
            endpoint: endpoint.as_ref(),
            logger: context.logger.as_ref(),
        };
        let mut metadata = ResponseMetadata::from_response(&response);
        metadata.attempts = inner.metadata.attempts;
        metadata.total_retry_delay = inner.metadata.total_retry_delay;

        match deserializer(&response, &serde_context) {
            Ok(output) => {
                let output: Box<dyn Any + Send> = Box::new(output);
                Ok(HandlerOutput {
                    output: Some(output),
                    response: Some(response),
                    metadata,
                })
            }
            Err(mut error) => {
                if let Some(exception) = error.service_exception_mut() {
                    if exception.metadata().http_status_code.is_none() {
                        *exception.metadata_mut() = metadata;
                    }
                }
                Err(error)
            }
        }
    }
}

/// Registers the serializer and deserializer middleware of one command type.
pub struct SerdePlugin<I, O> {
    command_name: String,
    serializer: Option<Serializer<I>>,
    deserializer: Option<Deserializer<O>>,
}

impl<I, O> SerdePlugin<I, O> {
    pub fn new(
        command_name: impl Into<String>,
        serializer: Option<Serializer<I>>,
        deserializer: Option<Deserializer<O>>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            serializer,
            deserializer,
        }
    }
}

impl<I, O> Pluggable for SerdePlugin<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn apply_to_stack(&self, stack: &mut MiddlewareStack) -> SdkResult<()> {
        stack.add(
            Arc::new(DeserializerMiddleware {
                command_name: self.command_name.clone(),
                deserializer: self.deserializer.clone(),
            }),
            MiddlewareOptions::new(Step::Deserialize)
                .named(DESERIALIZER_MIDDLEWARE)
                .overriding(),
        )?;
        stack.add(
            Arc::new(SerializerMiddleware {
                command_name: self.command_name.clone(),
                serializer: self.serializer.clone(),
            }),
            MiddlewareOptions::new(Step::Serialize)
                .named(SERIALIZER_MIDDLEWARE)
                .overriding(),
        )
    }
}
