use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    HandlerArgs, HandlerContext, HandlerOutput, Middleware, MiddlewareOptions, MiddlewareStack,
    Next, Pluggable, Priority, Step,
};
use crate::config::ClientConfig;
use crate::endpoint::{resolve_params, EndpointParameterInstructions, EndpointResolver};
use crate::error::{SdkError, SdkResult};

pub const ENDPOINT_MIDDLEWARE: &str = "endpointV2Middleware";

/// Resolves the endpoint before serialization and records it on the arguments.
pub struct EndpointMiddleware<I> {
    instructions: EndpointParameterInstructions,
    resolver: Arc<dyn EndpointResolver>,
    built_in_params: Map<String, Value>,
    client_context_params: Map<String, Value>,
    _input: PhantomData<fn(&I)>,
}

#[async_trait]
impl<I> Middleware for EndpointMiddleware<I>
where
    I: Serialize + Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let input = if self.instructions.needs_input() {
            let typed = (*args.input).downcast_ref::<I>().ok_or_else(|| {
                SdkError::Middleware(format!(
                    "{} received an input of the wrong type",
                    context.command_name
                ))
            })?;
            serde_json::to_value(typed).map_err(|e| SdkError::Serialization(e.to_string()))?
        } else {
            Value::Null
        };

        let params = resolve_params(
            &self.instructions,
            &input,
            &self.built_in_params,
            &self.client_context_params,
        );
        let endpoint = self.resolver.resolve_endpoint(&params)?;
        debug!(
            "Resolved endpoint {} for {}",
            endpoint.url, context.command_name
        );
        args.endpoint = Some(endpoint);
        next.run(args, context).await
    }
}

/// Registers [`EndpointMiddleware`] from a command type's instructions and the
/// client configuration.
pub struct EndpointPlugin<I> {
    instructions: EndpointParameterInstructions,
    resolver: Arc<dyn EndpointResolver>,
    built_in_params: Map<String, Value>,
    client_context_params: Map<String, Value>,
    _input: PhantomData<fn(&I)>,
}

impl<I> EndpointPlugin<I> {
    pub fn new(config: &ClientConfig, instructions: EndpointParameterInstructions) -> Self {
        Self {
            instructions,
            resolver: config.endpoint_resolver.clone(),
            built_in_params: config.built_in_params.clone(),
            client_context_params: config.client_context_params.clone(),
            _input: PhantomData,
        }
    }
}

impl<I> Pluggable for EndpointPlugin<I>
where
    I: Serialize + Send + Sync + 'static,
{
    fn apply_to_stack(&self, stack: &mut MiddlewareStack) -> SdkResult<()> {
        stack.add(
            Arc::new(EndpointMiddleware::<I> {
                instructions: self.instructions.clone(),
                resolver: self.resolver.clone(),
                built_in_params: self.built_in_params.clone(),
                client_context_params: self.client_context_params.clone(),
                _input: PhantomData,
            }),
            MiddlewareOptions::new(Step::Serialize)
                .named(ENDPOINT_MIDDLEWARE)
                .with_priority(Priority::High)
                .overriding(),
        )
    }
}
