//! Service exception model and the shared default error mapping.
//!
//! Generated per-error-code exceptions are not separate Rust types. They are
//! [`ExceptionShape`] constants that build a [`ServiceException`] and recognise one
//! by name or lineage, so matching works without a nominal type hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SdkError, SdkResult};
use crate::http::HttpResponse;

/// Message used when neither the exception nor the wire payload carried one.
pub const UNKNOWN_ERROR: &str = "UnknownError";

/// Request-id headers, in lookup priority order.
const REQUEST_ID_HEADERS: [&str; 3] = ["x-amzn-requestid", "x-amzn-request-id", "x-amz-request-id"];
const EXTENDED_REQUEST_ID_HEADER: &str = "x-amz-id-2";
const CF_ID_HEADER: &str = "x-amz-cf-id";
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Who caused a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fault {
    Client,
    Server,
}

impl Fault {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fault::Client => "client",
            Fault::Server => "server",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Fault::Client),
            "server" => Some(Fault::Server),
            _ => None,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP-level facts about a response, attached to outputs and exceptions alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Total time spent sleeping between retries, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_retry_delay: Option<u64>,
}

impl ResponseMetadata {
    /// Read status and correlation ids from a raw response.
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            http_status_code: Some(response.status.as_u16()),
            request_id: REQUEST_ID_HEADERS
                .iter()
                .find_map(|name| response.header(name))
                .map(str::to_string),
            extended_request_id: response.header(EXTENDED_REQUEST_ID_HEADER).map(str::to_string),
            cf_id: response.header(CF_ID_HEADER).map(str::to_string),
            attempts: None,
            total_retry_delay: None,
        }
    }
}

/// Constructor options for [`ServiceException`].
#[derive(Debug, Clone)]
pub struct ServiceExceptionOptions {
    pub name: String,
    pub fault: Fault,
    pub metadata: ResponseMetadata,
    pub message: Option<String>,
}

/// An error response from the remote service.
///
/// Members of the wire payload that are not part of the fixed fields land in
/// [`details`](ServiceException::details).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceException {
    name: String,
    fault: Fault,
    metadata: ResponseMetadata,
    message: String,
    details: Map<String, Value>,
    lineage: Vec<String>,
}

impl ServiceException {
    pub fn new(options: ServiceExceptionOptions) -> Self {
        Self {
            name: options.name,
            fault: options.fault,
            metadata: options.metadata,
            message: options.message.unwrap_or_default(),
            details: Map::new(),
            lineage: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ResponseMetadata {
        &mut self.metadata
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Shape names this exception was constructed through, innermost first.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Record construction through `shape_name`.
    pub fn with_lineage(mut self, shape_name: impl Into<String>) -> Self {
        let shape_name = shape_name.into();
        if !self.lineage.contains(&shape_name) {
            self.lineage.push(shape_name);
        }
        self
    }

    /// Capability check on an arbitrary JSON object: it is a service exception iff
    /// `$fault` is `"client"` or `"server"` and `$metadata` is present.
    pub fn is_instance(value: &Value) -> bool {
        let Some(object) = value.as_object() else {
            return false;
        };
        let fault_ok = object
            .get("$fault")
            .and_then(Value::as_str)
            .and_then(Fault::parse)
            .is_some();
        fault_ok && object.contains_key("$metadata")
    }

    /// Flatten into the wire-style object form (`name`, `$fault`, `$metadata`,
    /// `message` plus details).
    pub fn to_value(&self) -> Value {
        let mut object = self.details.clone();
        object.insert("name".into(), Value::String(self.name.clone()));
        object.insert("$fault".into(), Value::String(self.fault.as_str().into()));
        object.insert(
            "$metadata".into(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        object.insert("message".into(), Value::String(self.message.clone()));
        Value::Object(object)
    }

    /// Adopt any object that passes [`is_instance`](Self::is_instance).
    pub fn from_value(value: &Value) -> Option<Self> {
        if !Self::is_instance(value) {
            return None;
        }
        let object = value.as_object()?;
        let fault = object.get("$fault").and_then(Value::as_str).and_then(Fault::parse)?;
        let metadata = object
            .get("$metadata")
            .cloned()
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();
        let mut details = object.clone();
        for key in ["name", "$fault", "$metadata", "message"] {
            details.remove(key);
        }
        Some(Self {
            name,
            fault,
            metadata,
            message: object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            details,
            lineage: Vec::new(),
        })
    }
}

impl fmt::Display for ServiceException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for ServiceException {}

/// A modeled error: the name a service uses on the wire and its fault class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionShape {
    pub name: &'static str,
    pub fault: Fault,
}

impl ExceptionShape {
    pub const fn new(name: &'static str, fault: Fault) -> Self {
        Self { name, fault }
    }

    /// Construct an exception of this shape.
    pub fn build(&self, metadata: ResponseMetadata, message: Option<String>) -> ServiceException {
        ServiceException::new(ServiceExceptionOptions {
            name: self.name.to_string(),
            fault: self.fault,
            metadata,
            message,
        })
        .with_lineage(self.name)
    }

    /// True when the exception carries this shape's name or was built through it.
    pub fn matches(&self, exception: &ServiceException) -> bool {
        exception.name == self.name || exception.lineage.iter().any(|n| n == self.name)
    }

    pub fn matches_error(&self, error: &SdkError) -> bool {
        error.service_exception().is_some_and(|e| self.matches(e))
    }
}

/// Merge `additions` into the exception, keeping any value already present.
///
/// `Message` and `message` from the wire collapse into the single message field,
/// falling back to `"UnknownError"`.
pub fn decorate_service_exception(
    mut exception: ServiceException,
    additions: &Map<String, Value>,
) -> ServiceException {
    for (key, value) in additions {
        match key.as_str() {
            "message" | "Message" | "$fault" | "$metadata" => {}
            "name" => {
                if exception.name.is_empty() {
                    if let Some(name) = value.as_str() {
                        exception.name = name.to_string();
                    }
                }
            }
            _ => {
                let occupied = exception
                    .details
                    .get(key)
                    .is_some_and(|existing| !is_empty_value(existing));
                if !occupied {
                    exception.details.insert(key.clone(), value.clone());
                }
            }
        }
    }

    if exception.message.is_empty() {
        exception.message = ["message", "Message"]
            .iter()
            .filter_map(|key| additions.get(*key))
            .find_map(message_text)
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
    }
    exception.details.remove("Message");
    exception.details.remove("message");
    exception
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Inputs to [`throw_default_error`].
#[derive(Debug, Clone, Copy)]
pub struct DefaultErrorArgs<'a> {
    pub output: &'a HttpResponse,
    pub parsed_body: &'a Value,
    /// Base exception of the service; recorded in the lineage when given.
    pub exception_shape: Option<&'a ExceptionShape>,
    pub error_code: Option<&'a str>,
}

/// Map an unmodeled error response to a client-fault [`ServiceException`].
///
/// Always returns `Err`, so deserializers can `return throw_default_error(..)`.
pub fn throw_default_error<T>(args: DefaultErrorArgs<'_>) -> SdkResult<T> {
    let metadata = ResponseMetadata::from_response(args.output);
    let status_code = metadata.http_status_code.map(|code| code.to_string());
    let body = args.parsed_body.as_object();

    let name = body
        .and_then(|b| b.get("code").or_else(|| b.get("Code")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| args.error_code.map(str::to_string))
        .or(status_code)
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

    let mut exception = ServiceException::new(ServiceExceptionOptions {
        name,
        fault: Fault::Client,
        metadata,
        message: None,
    });
    if let Some(shape) = args.exception_shape {
        exception = exception.with_lineage(shape.name);
    }

    let empty = Map::new();
    let exception = decorate_service_exception(exception, body.unwrap_or(&empty));
    log::debug!(
        "Mapped error response to {} ({} fault)",
        exception.name(),
        exception.fault()
    );
    Err(SdkError::Service(exception))
}

/// Extract the error code of a JSON-protocol error response.
///
/// Looks at the `x-amzn-errortype` header, then the body's `code`, then `__type`,
/// and strips namespace (`ns#Name`) and URI (`Name:http://..`) decorations.
pub fn load_json_error_code(output: &HttpResponse, body: &Value) -> Option<String> {
    if let Some(header) = output.header(ERROR_TYPE_HEADER) {
        return Some(sanitize_error_code(header));
    }
    let object = body.as_object()?;
    ["code", "__type"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_str)
        .map(sanitize_error_code)
}

fn sanitize_error_code(raw: &str) -> String {
    let without_uri = raw.split(':').next().unwrap_or(raw);
    let name = without_uri.rsplit('#').next().unwrap_or(without_uri);
    name.trim().to_string()
}
