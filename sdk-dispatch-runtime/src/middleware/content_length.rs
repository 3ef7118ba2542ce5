use async_trait::async_trait;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::HeaderValue;

use super::{HandlerArgs, HandlerContext, HandlerOutput, Middleware, Next};
use crate::error::SdkResult;

pub const CONTENT_LENGTH_MIDDLEWARE: &str = "contentLengthMiddleware";

/// Sets `content-length` on requests with a body, unless already present or the
/// request is chunked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLengthMiddleware;

#[async_trait]
impl Middleware for ContentLengthMiddleware {
    async fn handle(
        &self,
        mut args: HandlerArgs,
        context: &HandlerContext,
        next: Next<'_>,
    ) -> SdkResult<HandlerOutput> {
        if let Some(request) = args.request.as_mut() {
            let has_length = request.headers.contains_key(CONTENT_LENGTH)
                || request.headers.contains_key(TRANSFER_ENCODING);
            if !has_length && !request.body.is_empty() {
                request
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(request.body.len()));
            }
        }
        next.run(args, context).await
    }
}
