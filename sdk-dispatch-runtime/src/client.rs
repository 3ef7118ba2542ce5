//! Client dispatch with per-operation handler caching.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::command::{Command, CommandTypeId};
use crate::config::ClientConfig;
use crate::error::{SdkError, SdkResult};
use crate::exception::ResponseMetadata;
use crate::http::HttpHandlerOptions;
use crate::middleware::{
    ContentLengthMiddleware, HandlerArgs, LoggerMiddleware, MiddlewareOptions, MiddlewareStack,
    Priority, ResolvedHandler, RetryMiddleware, SigningMiddleware, Step,
    CONTENT_LENGTH_MIDDLEWARE, LOGGER_MIDDLEWARE, RETRY_MIDDLEWARE, SIGNING_MIDDLEWARE,
};

/// A typed output together with the HTTP metadata of the response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput<O> {
    pub output: O,
    pub metadata: ResponseMetadata,
}

/// Sends commands through a shared middleware stack and transport.
///
/// With `cache_middleware` enabled, the pipeline resolved for an operation type is
/// reused by later option-less sends of the same type. Sends with explicit
/// [`HttpHandlerOptions`] always resolve fresh and never touch the cache.
pub struct Client {
    config: Arc<ClientConfig>,
    middleware_stack: MiddlewareStack,
    handlers: Mutex<HashMap<CommandTypeId, Arc<ResolvedHandler>>>,
    destroyed: AtomicBool,
}

impl Client {
    /// Create a client with the default client-level middleware: logging, retry,
    /// content length and, when a signer is configured, signing.
    pub fn new(config: ClientConfig) -> SdkResult<Self> {
        if let (Some(version), Some(warning)) = (&config.host_version, &config.version_warning) {
            warning.emit_if_unsupported(version);
        }

        let mut middleware_stack = MiddlewareStack::new();
        middleware_stack.add(
            Arc::new(LoggerMiddleware),
            MiddlewareOptions::new(Step::Initialize)
                .named(LOGGER_MIDDLEWARE)
                .with_tag("LOGGER"),
        )?;
        middleware_stack.add(
            Arc::new(ContentLengthMiddleware),
            MiddlewareOptions::new(Step::Build)
                .named(CONTENT_LENGTH_MIDDLEWARE)
                .with_priority(Priority::High)
                .with_tag("SET_CONTENT_LENGTH"),
        )?;
        middleware_stack.add(
            Arc::new(RetryMiddleware::new(config.retry_strategy.clone())),
            MiddlewareOptions::new(Step::FinalizeRequest)
                .named(RETRY_MIDDLEWARE)
                .with_priority(Priority::High)
                .with_tag("RETRY"),
        )?;
        if let Some(signer) = &config.signer {
            middleware_stack.add(
                Arc::new(SigningMiddleware::new(signer.clone())),
                MiddlewareOptions::new(Step::FinalizeRequest)
                    .named(SIGNING_MIDDLEWARE)
                    .with_priority(Priority::Low)
                    .with_tag("SIGNATURE"),
            )?;
        }

        Ok(Self::with_middleware_stack(config, middleware_stack))
    }

    /// Create a client around an explicit base stack.
    pub fn with_middleware_stack(config: ClientConfig, middleware_stack: MiddlewareStack) -> Self {
        Self {
            config: Arc::new(config),
            middleware_stack,
            handlers: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn middleware_stack(&self) -> &MiddlewareStack {
        &self.middleware_stack
    }

    /// Mutable access to the base stack. Cached pipelines are dropped.
    pub fn middleware_stack_mut(&mut self) -> &mut MiddlewareStack {
        self.handlers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        &mut self.middleware_stack
    }

    /// Number of cached pipelines.
    pub fn cached_handlers(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Send `command` and return its output.
    pub async fn send<I, O>(&self, command: Command<I, O>) -> SdkResult<O>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        Ok(self.dispatch(command, None).await?.output)
    }

    /// Send with per-call transport options. Always resolves a fresh pipeline.
    pub async fn send_with_options<I, O>(
        &self,
        command: Command<I, O>,
        options: HttpHandlerOptions,
    ) -> SdkResult<O>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        Ok(self.dispatch(command, Some(options)).await?.output)
    }

    /// Like [`send`](Self::send), keeping the response metadata.
    pub async fn send_with_metadata<I, O>(
        &self,
        command: Command<I, O>,
        options: Option<HttpHandlerOptions>,
    ) -> SdkResult<CommandOutput<O>>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        self.dispatch(command, options).await
    }

    /// Send on a spawned task and hand the result to `callback`.
    ///
    /// A panic inside the callback is caught and logged; the result has already
    /// been delivered by then.
    pub fn send_with_callback<I, O, F>(
        self: Arc<Self>,
        command: Command<I, O>,
        options: Option<HttpHandlerOptions>,
        callback: F,
    ) -> JoinHandle<()>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
        F: FnOnce(SdkResult<O>) + Send + 'static,
    {
        tokio::spawn(async move {
            let command_name = command.command_type().command_name().to_string();
            let result = self
                .dispatch(command, options)
                .await
                .map(|output| output.output);
            if catch_unwind(AssertUnwindSafe(move || callback(result))).is_err() {
                warn!("Callback for {command_name} panicked; the panic was discarded");
            }
        })
    }

    /// Release the transport and drop cached pipelines.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.config.request_handler.destroy();
        self.lock_handlers().clear();
    }

    async fn dispatch<I, O>(
        &self,
        command: Command<I, O>,
        options: Option<HttpHandlerOptions>,
    ) -> SdkResult<CommandOutput<O>>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        if self.destroyed.load(Ordering::SeqCst) {
            warn!(
                "Sending {} on a destroyed client",
                command.command_type().command_name()
            );
        }
        let handler = self.handler_for(&command, options.as_ref())?;
        let handled = handler
            .handle(HandlerArgs::new(command.shared_input()))
            .await?;

        let command_name = command.command_type().command_name();
        let output = handled.output.ok_or_else(|| {
            SdkError::Deserialization(format!("{command_name} produced no output"))
        })?;
        let output = output.downcast::<O>().map_err(|_| {
            SdkError::Deserialization(format!("{command_name} produced an output of the wrong type"))
        })?;
        Ok(CommandOutput {
            output: *output,
            metadata: handled.metadata,
        })
    }

    fn handler_for<I, O>(
        &self,
        command: &Command<I, O>,
        options: Option<&HttpHandlerOptions>,
    ) -> SdkResult<Arc<ResolvedHandler>>
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        if options.is_some() || !self.config.cache_middleware {
            return command
                .resolve_middleware(&self.middleware_stack, &self.config, options)
                .map(Arc::new);
        }

        let id = command.command_type().id();
        if let Some(handler) = self.lock_handlers().get(&id) {
            return Ok(handler.clone());
        }

        debug!(
            "Resolving middleware for {}",
            command.command_type().command_name()
        );
        let handler = Arc::new(command.resolve_middleware(&self.middleware_stack, &self.config, None)?);
        // Concurrent first sends may both resolve; the results are equivalent.
        self.lock_handlers().insert(id, handler.clone());
        Ok(handler)
    }

    fn lock_handlers(&self) -> MutexGuard<'_, HashMap<CommandTypeId, Arc<ResolvedHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("middleware_stack", &self.middleware_stack)
            .field("cached_handlers", &self.cached_handlers())
            .finish()
    }
}
