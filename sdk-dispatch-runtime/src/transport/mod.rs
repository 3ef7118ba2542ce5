//! The transport boundary: something that turns an [`HttpRequest`] into an
//! [`HttpResponse`].

mod http_client;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use http_client::ReqwestTransport;

use crate::error::{BoxError, SdkError, SdkResult};
use crate::http::{HttpHandlerOptions, HttpRequest, HttpResponse};
use crate::middleware::{Handler, HandlerArgs, HandlerContext, HandlerOutput};

/// Sends a serialized request. Errors are opaque and surface unchanged as
/// [`SdkError::Transport`](crate::SdkError::Transport).
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn handle(
        &self,
        request: HttpRequest,
        options: &HttpHandlerOptions,
    ) -> Result<HttpResponse, BoxError>;

    /// Release pooled resources. Called by `Client::destroy`.
    fn destroy(&self) {}
}

/// Terminal pipeline handler: sends the serialized request through the transport.
pub(crate) struct TransportHandler {
    transport: Arc<dyn Transport>,
    options: HttpHandlerOptions,
}

impl TransportHandler {
    pub(crate) fn new(transport: Arc<dyn Transport>, options: HttpHandlerOptions) -> Self {
        Self { transport, options }
    }
}

#[async_trait]
impl Handler for TransportHandler {
    async fn handle(&self, args: HandlerArgs, context: &HandlerContext) -> SdkResult<HandlerOutput> {
        let request = args.request.ok_or_else(|| {
            SdkError::Middleware(format!(
                "No request was serialized for {}",
                context.command_name
            ))
        })?;
        let response = self
            .transport
            .handle(request, &self.options)
            .await
            .map_err(SdkError::Transport)?;
        Ok(HandlerOutput::from_response(response))
    }
}
