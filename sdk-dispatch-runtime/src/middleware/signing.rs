use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{HandlerArgs, HandlerContext, HandlerOutput, Middleware, Next};
use crate::error::{SdkError, SdkResult};
use crate::http::HttpRequest;

pub const SIGNING_MIDDLEWARE: &str = "httpSigningMiddleware";

/// Signs an outgoing request. Credential lookup may suspend.
#[async_trait]
pub trait RequestSigner: Send + Sync + fmt::Debug {
    async fn sign(&self, request: HttpRequest, context: &HandlerContext) -> SdkResult<HttpRequest>;
}

/// Runs the configured [`RequestSigner`] on every attempt.
#[derive(Debug, Clone)]
pub struct SigningMiddleware {
    signer: Arc<dyn RequestSigner>,
}

impl SigningMiddleware {
    pub fn new(signer: Arc<dyn RequestSigner>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl Middleware for SigningMiddleware {
    async fn handle(
        &self,
        mut args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        let request = args
            .request
            .take()
            .ok_or_else(|| SdkError::Middleware("No request to sign".into()))?;
        args.request = Some(self.signer.sign(request, context).await?);
        next.run(args, context).await
    }
}
