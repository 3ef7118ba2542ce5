//! The middleware pipeline.
//!
//! A request travels outward-in through an ordered chain of [`Middleware`] and ends
//! at a terminal [`Handler`] (normally the transport). Each layer receives the
//! arguments, the shared [`HandlerContext`] and a [`Next`] it may call zero or more
//! times. Inputs and outputs are type-erased so one stack can carry every
//! operation of a client.

mod content_length;
mod endpoint_plugin;
mod logger;
mod retry;
mod serde_plugin;
mod signing;
mod stack;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use sdk_dispatch_common::Logger;

pub use content_length::{ContentLengthMiddleware, CONTENT_LENGTH_MIDDLEWARE};
pub use endpoint_plugin::{EndpointMiddleware, EndpointPlugin, ENDPOINT_MIDDLEWARE};
pub use logger::{LoggerMiddleware, LOGGER_MIDDLEWARE};
pub use retry::{RetryMiddleware, RETRY_MIDDLEWARE};
pub use serde_plugin::{
    DeserializerMiddleware, SerdePlugin, SerializerMiddleware, DESERIALIZER_MIDDLEWARE,
    SERIALIZER_MIDDLEWARE,
};
pub use signing::{RequestSigner, SigningMiddleware, SIGNING_MIDDLEWARE};
pub use stack::{MiddlewareStack, ResolvedHandler};

use crate::endpoint::Endpoint;
use crate::error::SdkResult;
use crate::exception::ResponseMetadata;
use crate::http::{HttpRequest, HttpResponse};

/// Pipeline phase. Entries run in this order, first to last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Step {
    #[default]
    Initialize,
    Serialize,
    Build,
    FinalizeRequest,
    Deserialize,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Initialize => "initialize",
            Step::Serialize => "serialize",
            Step::Build => "build",
            Step::FinalizeRequest => "finalizeRequest",
            Step::Deserialize => "deserialize",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering within a step. `High` runs outermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// Where and under which name a middleware is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareOptions {
    pub step: Step,
    pub priority: Priority,
    pub name: Option<String>,
    pub tags: Vec<String>,
    /// Replace an existing entry of the same name instead of failing.
    pub override_existing: bool,
}

impl MiddlewareOptions {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

/// Redaction function applied to an erased input or output before logging.
pub type SensitiveFilter = Arc<dyn Fn(&dyn Any) -> Value + Send + Sync>;

/// Arguments flowing down the pipeline. Cloned for every retry attempt.
#[derive(Clone)]
pub struct HandlerArgs {
    pub input: Arc<dyn Any + Send + Sync>,
    pub request: Option<HttpRequest>,
    pub endpoint: Option<Endpoint>,
}

impl HandlerArgs {
    pub fn new(input: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            input,
            request: None,
            endpoint: None,
        }
    }
}

impl fmt::Debug for HandlerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerArgs")
            .field("request", &self.request)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Result flowing back up the pipeline.
#[derive(Default)]
pub struct HandlerOutput {
    /// Deserialized output, set by the deserializer middleware.
    pub output: Option<Box<dyn Any + Send>>,
    pub response: Option<HttpResponse>,
    pub metadata: ResponseMetadata,
}

impl HandlerOutput {
    pub fn from_response(response: HttpResponse) -> Self {
        Self {
            output: None,
            response: Some(response),
            metadata: ResponseMetadata::default(),
        }
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOutput")
            .field("has_output", &self.output.is_some())
            .field("response", &self.response)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Service and operation identity, plus the command instance being executed.
#[derive(Clone, Default)]
pub struct SmithyContext {
    pub service: String,
    pub operation: String,
    /// The executing `Command<I, O>`, for middleware that needs to introspect it.
    pub command_instance: Option<Arc<dyn Any + Send + Sync>>,
    pub extra: Map<String, Value>,
}

impl fmt::Debug for SmithyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmithyContext")
            .field("service", &self.service)
            .field("operation", &self.operation)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

/// Per-resolution context shared by every layer of one pipeline.
#[derive(Clone)]
pub struct HandlerContext {
    pub logger: Arc<dyn Logger>,
    pub client_name: String,
    pub command_name: String,
    pub input_filter_sensitive_log: SensitiveFilter,
    pub output_filter_sensitive_log: SensitiveFilter,
    pub smithy_context: SmithyContext,
    /// Builder-supplied additional context.
    pub extra: Map<String, Value>,
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("logger", &self.logger)
            .field("client_name", &self.client_name)
            .field("command_name", &self.command_name)
            .field("smithy_context", &self.smithy_context)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

/// Innermost layer of a pipeline.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, args: HandlerArgs, context: &HandlerContext) -> SdkResult<HandlerOutput>;
}

/// One interceptor in the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput>;
}

/// The remainder of the pipeline below the current middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], terminal: &'a dyn Handler) -> Self {
        Self { chain, terminal }
    }

    pub async fn run(self, args: HandlerArgs, context: &HandlerContext) -> SdkResult<HandlerOutput> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                head.handle(args, context, Next::new(rest, self.terminal))
                    .await
            }
            None => self.terminal.handle(args, context).await,
        }
    }
}

/// A bundle of middleware registrations.
pub trait Pluggable: Send + Sync {
    fn apply_to_stack(&self, stack: &mut MiddlewareStack) -> SdkResult<()>;
}
