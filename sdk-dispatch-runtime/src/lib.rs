//! Typed command execution runtime:
//! - [`CommandBuilder`] builds a [`CommandType`] per operation; instances pair an input
//!   with the type's serializer, deserializer and middleware contributions
//! - [`Client`] resolves each command into a middleware pipeline over a
//!   [`Transport`], caching pipelines per operation type
//! - [`ServiceException`] and [`throw_default_error`] map error responses
//! - [`WaiterDefinition`] polls an operation until an acceptor reports a terminal state
//!

pub mod checksum;
mod client;
pub mod command;
pub mod config;
pub mod endpoint;
mod error;
pub mod exception;
pub mod http;
pub mod middleware;
pub mod paginator;
pub mod retry;
pub mod transport;
pub mod waiter;

pub use client::{Client, CommandOutput};
pub use command::{build_command_type, Command, CommandBuilder, CommandType, SerdeContext};
pub use config::ClientConfig;
pub use error::{BoxError, SdkError, SdkResult};
pub use exception::{
    decorate_service_exception, load_json_error_code, throw_default_error, DefaultErrorArgs,
    ExceptionShape, Fault, ResponseMetadata, ServiceException,
};
pub use http::{HttpHandlerOptions, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
pub use waiter::{
    WaiterDefinition, WaiterError, WaiterOptions, WaiterResult, WaiterState,
};

pub use sdk_dispatch_common as common;
