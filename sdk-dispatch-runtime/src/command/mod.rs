//! Commands: one invocable operation paired with its input.
//!
//! A [`CommandType`] is built once per operation by [`CommandBuilder`] and acts as
//! the operation's identity (it keys the client's handler cache). Each
//! [`Command`] is an instance of a type carrying a concrete input.

mod builder;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use sdk_dispatch_common::Logger;

pub use builder::{CommandBuilder, CommandConfig, InitFn, InputFilter, MiddlewareFn, OutputFilter};

use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, EndpointParameterInstructions};
use crate::error::SdkResult;
use crate::http::{HttpHandlerOptions, HttpRequest, HttpResponse};
use crate::middleware::{
    EndpointPlugin, HandlerContext, MiddlewareStack, Pluggable, ResolvedHandler, SensitiveFilter,
    SerdePlugin, SmithyContext,
};
use crate::transport::TransportHandler;

/// What serializers and deserializers get to see besides the payload.
#[derive(Clone, Copy)]
pub struct SerdeContext<'a> {
    /// The resolved endpoint, once the endpoint middleware has run.
    pub endpoint: Option<&'a Endpoint>,
    pub logger: &'a dyn Logger,
}

impl fmt::Debug for SerdeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeContext")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Typed input to wire request.
pub type Serializer<I> =
    Arc<dyn Fn(&I, &SerdeContext<'_>) -> SdkResult<HttpRequest> + Send + Sync>;

/// Wire response to typed output, or the mapped service error.
pub type Deserializer<O> =
    Arc<dyn Fn(&HttpResponse, &SerdeContext<'_>) -> SdkResult<O> + Send + Sync>;

/// Process-unique identity of a built command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandTypeId(u64);

impl CommandTypeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A built operation. Cheap to clone; clones share identity.
pub struct CommandType<I, O> {
    id: CommandTypeId,
    config: Arc<CommandConfig<I, O>>,
}

impl<I, O> Clone for CommandType<I, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            config: self.config.clone(),
        }
    }
}

impl<I, O> fmt::Debug for CommandType<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandType")
            .field("id", &self.id)
            .field("client_name", &self.config.client_name)
            .field("command_name", &self.config.command_name)
            .finish_non_exhaustive()
    }
}

/// Freeze `config` into a new command type with a fresh identity.
pub fn build_command_type<I, O>(config: CommandConfig<I, O>) -> CommandType<I, O> {
    CommandType {
        id: CommandTypeId::next(),
        config: Arc::new(config),
    }
}

impl<I, O> CommandType<I, O> {
    pub fn id(&self) -> CommandTypeId {
        self.id
    }

    pub fn config(&self) -> &CommandConfig<I, O> {
        &self.config
    }

    pub fn client_name(&self) -> &str {
        &self.config.client_name
    }

    pub fn command_name(&self) -> &str {
        &self.config.command_name
    }

    pub fn serializer(&self) -> Option<&Serializer<I>> {
        self.config.serializer.as_ref()
    }

    pub fn deserializer(&self) -> Option<&Deserializer<O>> {
        self.config.deserializer.as_ref()
    }

    /// Available without an instance, e.g. for documentation tooling.
    pub fn endpoint_parameter_instructions(&self) -> &EndpointParameterInstructions {
        &self.config.endpoint_parameter_instructions
    }

    /// Create a command for `input`, running the type's init hook.
    pub fn new_command(&self, input: I) -> Command<I, O> {
        let mut command = Command {
            input: Arc::new(input),
            command_type: self.clone(),
            middleware_stack: MiddlewareStack::new(),
        };
        if let Some(init) = &self.config.init {
            init(&mut command);
        }
        command
    }

    /// Create a command with an empty input.
    pub fn new_default_command(&self) -> Command<I, O>
    where
        I: Default,
    {
        self.new_command(I::default())
    }
}

/// Plugins every command contributes when its type has no middleware function:
/// endpoint resolution plus serialization.
pub fn default_plugins<I, O>(
    command_type: &CommandType<I, O>,
    config: &ClientConfig,
) -> Vec<Box<dyn Pluggable>>
where
    I: Serialize + Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    vec![
        Box::new(EndpointPlugin::<I>::new(
            config,
            command_type.endpoint_parameter_instructions().clone(),
        )),
        Box::new(SerdePlugin::new(
            command_type.command_name(),
            command_type.serializer().cloned(),
            command_type.deserializer().cloned(),
        )),
    ]
}

/// One operation invocation.
pub struct Command<I, O> {
    input: Arc<I>,
    command_type: CommandType<I, O>,
    middleware_stack: MiddlewareStack,
}

impl<I, O> Clone for Command<I, O> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            command_type: self.command_type.clone(),
            middleware_stack: self.middleware_stack.clone(),
        }
    }
}

impl<I: fmt::Debug, O> fmt::Debug for Command<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("command_type", &self.command_type)
            .field("input", &self.input)
            .field("middleware_stack", &self.middleware_stack)
            .finish()
    }
}

impl<I, O> Command<I, O> {
    pub fn input(&self) -> &I {
        &self.input
    }

    pub(crate) fn shared_input(&self) -> Arc<I> {
        self.input.clone()
    }

    pub fn command_type(&self) -> &CommandType<I, O> {
        &self.command_type
    }

    /// Per-instance middleware, applied after the client's and the type's own.
    pub fn middleware_stack(&self) -> &MiddlewareStack {
        &self.middleware_stack
    }

    pub fn middleware_stack_mut(&mut self) -> &mut MiddlewareStack {
        &mut self.middleware_stack
    }
}

impl<I, O> Command<I, O>
where
    I: Serialize + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    /// Assemble the executable pipeline for this command.
    ///
    /// The type's middleware contributions are registered on a copy of this
    /// command's stack, so resolving twice does not accumulate entries. The client
    /// stack runs first.
    pub fn resolve_middleware(
        &self,
        client_stack: &MiddlewareStack,
        config: &ClientConfig,
        options: Option<&HttpHandlerOptions>,
    ) -> SdkResult<ResolvedHandler> {
        let plugins = match &self.command_type.config.middleware {
            Some(contribute) => contribute(&self.command_type, client_stack, config, options),
            None => default_plugins(&self.command_type, config),
        };

        let mut command_stack = self.middleware_stack.clone();
        for plugin in &plugins {
            command_stack.use_plugin(plugin.as_ref())?;
        }
        let stack = client_stack.concat(&command_stack)?;

        let type_config = &self.command_type.config;
        let command_instance: Arc<dyn Any + Send + Sync> = Arc::new(self.clone());
        let context = HandlerContext {
            logger: config.logger.clone(),
            client_name: type_config.client_name.clone(),
            command_name: type_config.command_name.clone(),
            input_filter_sensitive_log: erase_filter(type_config.input_filter_sensitive_log.clone()),
            output_filter_sensitive_log: erase_filter(
                type_config.output_filter_sensitive_log.clone(),
            ),
            smithy_context: SmithyContext {
                service: type_config.service.clone(),
                operation: type_config.operation.clone(),
                command_instance: Some(command_instance),
                extra: type_config.smithy_context_extra.clone(),
            },
            extra: type_config.additional_context.clone(),
        };

        let terminal = TransportHandler::new(
            config.request_handler.clone(),
            options.cloned().unwrap_or_default(),
        );
        Ok(stack.resolve(Arc::new(terminal), context))
    }
}

/// Lift a typed redaction function to the erased form carried by the context.
/// Without one the value is logged as serialized.
fn erase_filter<T>(filter: Option<Arc<dyn Fn(&T) -> Value + Send + Sync>>) -> SensitiveFilter
where
    T: Serialize + 'static,
{
    Arc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
        Some(typed) => match &filter {
            Some(filter) => filter(typed),
            None => serde_json::to_value(typed).unwrap_or(Value::Null),
        },
        None => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{LoggerMiddleware, MiddlewareOptions, Step};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Input {
        name: String,
        secret: String,
    }

    #[test]
    fn test_command_types_have_distinct_ids() {
        let a = CommandBuilder::<Input, Value>::new().build();
        let b = CommandBuilder::<Input, Value>::new().build();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
        assert_eq!(a.new_default_command().command_type().id(), a.id());
    }

    #[test]
    fn test_init_hook_runs_per_instance() {
        let command_type = CommandBuilder::<Input, Value>::new()
            .init(|command: &mut Command<Input, Value>| {
                command
                    .middleware_stack_mut()
                    .add(
                        Arc::new(LoggerMiddleware),
                        MiddlewareOptions::new(Step::Initialize).named("instanceLogger"),
                    )
                    .expect("fresh stack accepts the entry");
            })
            .names("WidgetClient", "DescribeWidgetCommand")
            .build();
        let command = command_type.new_command(Input {
            name: "w".into(),
            secret: "s".into(),
        });
        assert_eq!(command.input().name, "w");
        assert!(command.middleware_stack().contains("instanceLogger"));
        assert_eq!(command.command_type().command_name(), "DescribeWidgetCommand");
    }

    #[test]
    fn test_erased_filter_uses_typed_filter_or_serializes() {
        let input = Input {
            name: "w".into(),
            secret: "hunter2".into(),
        };
        let unfiltered = erase_filter::<Input>(None);
        assert_eq!(unfiltered(&input as &dyn Any), json!({"name": "w", "secret": "hunter2"}));

        let redacting: Arc<dyn Fn(&Input) -> Value + Send + Sync> = Arc::new(|i: &Input| {
            json!({"name": i.name, "secret": sdk_dispatch_common::SENSITIVE_STRING})
        });
        let filtered = erase_filter(Some(redacting));
        assert_eq!(
            filtered(&input as &dyn Any),
            json!({"name": "w", "secret": "***SensitiveInformation***"})
        );
        assert_eq!(filtered(&42u8 as &dyn Any), Value::Null);
    }
}
