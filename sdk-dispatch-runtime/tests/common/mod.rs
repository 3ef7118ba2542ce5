#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sdk_dispatch_runtime::endpoint::EndpointParameterInstructions;
use sdk_dispatch_runtime::retry::NoRetryStrategy;
use sdk_dispatch_runtime::{
    load_json_error_code, throw_default_error, BoxError, ClientConfig, CommandBuilder, CommandType,
    DefaultErrorArgs, ExceptionShape, Fault, HttpHandlerOptions, HttpRequest, HttpResponse,
    SdkError, SdkResult, SerdeContext, Transport,
};

pub const WIDGET_SERVICE_EXCEPTION: ExceptionShape =
    ExceptionShape::new("WidgetServiceException", Fault::Client);

/// Replays canned responses in order and records every request.
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    options: Mutex<Vec<HttpHandlerOptions>>,
    destroyed: AtomicUsize,
}

impl FakeTransport {
    pub fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_options(&self) -> Option<HttpHandlerOptions> {
        self.options.lock().unwrap().last().cloned()
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn handle(
        &self,
        request: HttpRequest,
        options: &HttpHandlerOptions,
    ) -> Result<HttpResponse, BoxError> {
        self.requests.lock().unwrap().push(request);
        self.options.lock().unwrap().push(options.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BoxError::from("connection refused"))
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::from_u16(status).unwrap())
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/x-amz-json-1.1"))
        .with_header(
            HeaderName::from_static("x-amzn-requestid"),
            HeaderValue::from_static("req-123"),
        )
        .with_body(body.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeWidgetInput {
    pub widget_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
}

impl DescribeWidgetInput {
    pub fn named(name: &str) -> Self {
        Self {
            widget_name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeWidgetOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

pub fn se_describe_widget(
    input: &DescribeWidgetInput,
    context: &SerdeContext<'_>,
) -> SdkResult<HttpRequest> {
    let endpoint = context
        .endpoint
        .ok_or_else(|| SdkError::Serialization("no endpoint was resolved".into()))?;
    let body = serde_json::to_vec(input).map_err(|e| SdkError::Serialization(e.to_string()))?;
    Ok(HttpRequest::new(Method::POST, endpoint.url.clone())
        .with_header(
            HeaderName::from_static("x-amz-target"),
            HeaderValue::from_static("WidgetService.DescribeWidget"),
        )
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/x-amz-json-1.1"))
        .with_body(body))
}

pub fn de_describe_widget(
    response: &HttpResponse,
    _context: &SerdeContext<'_>,
) -> SdkResult<DescribeWidgetOutput> {
    let body: Value = response
        .json_body()
        .map_err(|e| SdkError::Deserialization(e.to_string()))?;
    if !response.is_success() {
        let code = load_json_error_code(response, &body);
        return throw_default_error(DefaultErrorArgs {
            output: response,
            parsed_body: &body,
            exception_shape: Some(&WIDGET_SERVICE_EXCEPTION),
            error_code: code.as_deref(),
        });
    }
    serde_json::from_value(body).map_err(|e| SdkError::Deserialization(e.to_string()))
}

pub fn describe_widget_builder() -> CommandBuilder<DescribeWidgetInput, DescribeWidgetOutput> {
    CommandBuilder::new()
        .endpoint_parameters(EndpointParameterInstructions::common())
        .smithy_context("WidgetService", "DescribeWidget")
        .names("WidgetClient", "DescribeWidgetCommand")
        .serializer(se_describe_widget)
        .deserializer(de_describe_widget)
}

pub fn describe_widget() -> CommandType<DescribeWidgetInput, DescribeWidgetOutput> {
    describe_widget_builder().build()
}

pub fn client_config(transport: &Arc<FakeTransport>) -> ClientConfig {
    ClientConfig::new(transport.clone())
        .with_endpoint("https://widgets.example.com")
        .with_region("us-east-1")
        .with_retry_strategy(Arc::new(NoRetryStrategy))
}
