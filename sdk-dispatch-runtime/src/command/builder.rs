use std::sync::Arc;

use serde_json::{Map, Value};

use super::{build_command_type, Command, CommandType, Deserializer, SerdeContext, Serializer};
use crate::config::ClientConfig;
use crate::endpoint::EndpointParameterInstructions;
use crate::error::SdkResult;
use crate::http::{HttpHandlerOptions, HttpRequest, HttpResponse};
use crate::middleware::{MiddlewareStack, Pluggable};

/// Supplies the plugins a command type registers on every resolution.
pub type MiddlewareFn<I, O> = Arc<
    dyn Fn(
            &CommandType<I, O>,
            &MiddlewareStack,
            &ClientConfig,
            Option<&HttpHandlerOptions>,
        ) -> Vec<Box<dyn Pluggable>>
        + Send
        + Sync,
>;

pub type InputFilter<I> = Arc<dyn Fn(&I) -> Value + Send + Sync>;
pub type OutputFilter<O> = Arc<dyn Fn(&O) -> Value + Send + Sync>;
pub type InitFn<I, O> = Arc<dyn Fn(&mut Command<I, O>) + Send + Sync>;

/// Frozen description of one operation.
pub struct CommandConfig<I, O> {
    pub endpoint_parameter_instructions: EndpointParameterInstructions,
    /// Plugin contributions. `None` registers the endpoint and serde plugins.
    pub middleware: Option<MiddlewareFn<I, O>>,
    pub service: String,
    pub operation: String,
    pub smithy_context_extra: Map<String, Value>,
    pub client_name: String,
    pub command_name: String,
    pub input_filter_sensitive_log: Option<InputFilter<I>>,
    pub output_filter_sensitive_log: Option<OutputFilter<O>>,
    pub serializer: Option<Serializer<I>>,
    pub deserializer: Option<Deserializer<O>>,
    pub init: Option<InitFn<I, O>>,
    pub additional_context: Map<String, Value>,
}

impl<I, O> Default for CommandConfig<I, O> {
    fn default() -> Self {
        Self {
            endpoint_parameter_instructions: EndpointParameterInstructions::default(),
            middleware: None,
            service: String::new(),
            operation: String::new(),
            smithy_context_extra: Map::new(),
            client_name: String::new(),
            command_name: String::new(),
            input_filter_sensitive_log: None,
            output_filter_sensitive_log: None,
            serializer: None,
            deserializer: None,
            init: None,
            additional_context: Map::new(),
        }
    }
}

/// Accumulates a [`CommandConfig`] and freezes it with [`build`](Self::build).
///
/// ```ignore
/// let describe_widget = CommandBuilder::<DescribeWidgetInput, DescribeWidgetOutput>::new()
///     .endpoint_parameters(EndpointParameterInstructions::common())
///     .smithy_context("WidgetService", "DescribeWidget")
///     .names("WidgetClient", "DescribeWidgetCommand")
///     .serializer(se_describe_widget)
///     .deserializer(de_describe_widget)
///     .build();
/// let output = client.send(describe_widget.new_command(input)).await?;
/// ```
pub struct CommandBuilder<I, O> {
    config: CommandConfig<I, O>,
}

impl<I, O> Default for CommandBuilder<I, O> {
    fn default() -> Self {
        Self {
            config: CommandConfig::default(),
        }
    }
}

impl<I, O> CommandBuilder<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint_parameters(mut self, instructions: EndpointParameterInstructions) -> Self {
        self.config.endpoint_parameter_instructions = instructions;
        self
    }

    pub fn middleware<F>(mut self, contribute: F) -> Self
    where
        F: Fn(
                &CommandType<I, O>,
                &MiddlewareStack,
                &ClientConfig,
                Option<&HttpHandlerOptions>,
            ) -> Vec<Box<dyn Pluggable>>
            + Send
            + Sync
            + 'static,
    {
        self.config.middleware = Some(Arc::new(contribute));
        self
    }

    pub fn smithy_context(mut self, service: impl Into<String>, operation: impl Into<String>) -> Self {
        self.config.service = service.into();
        self.config.operation = operation.into();
        self
    }

    pub fn smithy_context_extra(mut self, extra: Map<String, Value>) -> Self {
        self.config.smithy_context_extra = extra;
        self
    }

    pub fn names(mut self, client_name: impl Into<String>, command_name: impl Into<String>) -> Self {
        self.config.client_name = client_name.into();
        self.config.command_name = command_name.into();
        self
    }

    pub fn sensitive_filters<FI, FO>(mut self, input: FI, output: FO) -> Self
    where
        FI: Fn(&I) -> Value + Send + Sync + 'static,
        FO: Fn(&O) -> Value + Send + Sync + 'static,
    {
        self.config.input_filter_sensitive_log = Some(Arc::new(input));
        self.config.output_filter_sensitive_log = Some(Arc::new(output));
        self
    }

    pub fn serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&I, &SerdeContext<'_>) -> SdkResult<HttpRequest> + Send + Sync + 'static,
    {
        self.config.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn deserializer<F>(mut self, deserializer: F) -> Self
    where
        F: Fn(&HttpResponse, &SerdeContext<'_>) -> SdkResult<O> + Send + Sync + 'static,
    {
        self.config.deserializer = Some(Arc::new(deserializer));
        self
    }

    /// Last-mile customisation of every new instance.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut Command<I, O>) + Send + Sync + 'static,
    {
        self.config.init = Some(Arc::new(init));
        self
    }

    pub fn additional_context(mut self, context: Map<String, Value>) -> Self {
        self.config.additional_context = context;
        self
    }

    /// Consume the builder. A missing serializer or deserializer is reported when
    /// a command of this type is first executed.
    pub fn build(self) -> CommandType<I, O> {
        build_command_type(self.config)
    }
}
