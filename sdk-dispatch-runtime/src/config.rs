//! Client configuration.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value};

use sdk_dispatch_common::scalar::parse_boolean;
use sdk_dispatch_common::{Logger, NoOpLogger, VersionWarning};

use crate::checksum::{ChecksumAlgorithms, ChecksumConstructor};
use crate::endpoint::{DefaultEndpointResolver, EndpointResolver};
use crate::error::{SdkError, SdkResult};
use crate::middleware::RequestSigner;
use crate::retry::{RetryStrategy, StandardRetryStrategy};
use crate::transport::Transport;

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";
pub const ENV_USE_FIPS_ENDPOINT: &str = "AWS_USE_FIPS_ENDPOINT";
pub const ENV_USE_DUALSTACK_ENDPOINT: &str = "AWS_USE_DUALSTACK_ENDPOINT";
pub const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

/// Built-in endpoint parameter keys.
pub const BUILT_IN_REGION: &str = "region";
pub const BUILT_IN_ENDPOINT: &str = "endpoint";
pub const BUILT_IN_USE_FIPS: &str = "useFipsEndpoint";
pub const BUILT_IN_USE_DUALSTACK: &str = "useDualstackEndpoint";

/// Everything a [`Client`](crate::Client) needs besides its middleware stack.
#[derive(Clone)]
pub struct ClientConfig {
    pub request_handler: Arc<dyn Transport>,
    pub logger: Arc<dyn Logger>,
    /// Reuse resolved pipelines per operation type for option-less sends.
    pub cache_middleware: bool,
    pub retry_strategy: Arc<dyn RetryStrategy>,
    pub checksum_algorithms: ChecksumAlgorithms,
    pub endpoint_resolver: Arc<dyn EndpointResolver>,
    pub signer: Option<Arc<dyn RequestSigner>>,
    pub built_in_params: Map<String, Value>,
    pub client_context_params: Map<String, Value>,
    /// Host runtime version checked against the version warning on client creation.
    pub host_version: Option<String>,
    pub version_warning: Option<Arc<VersionWarning>>,
}

impl ClientConfig {
    pub fn new(request_handler: Arc<dyn Transport>) -> Self {
        let mut built_in_params = Map::new();
        built_in_params.insert(BUILT_IN_USE_FIPS.into(), Value::Bool(false));
        built_in_params.insert(BUILT_IN_USE_DUALSTACK.into(), Value::Bool(false));
        Self {
            request_handler,
            logger: Arc::new(NoOpLogger),
            cache_middleware: false,
            retry_strategy: Arc::new(StandardRetryStrategy::default()),
            checksum_algorithms: ChecksumAlgorithms::with_defaults(),
            endpoint_resolver: Arc::new(DefaultEndpointResolver),
            signer: None,
            built_in_params,
            client_context_params: Map::new(),
            host_version: None,
            version_warning: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cache_middleware(mut self, enabled: bool) -> Self {
        self.cache_middleware = enabled;
        self
    }

    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = strategy;
        self
    }

    pub fn with_checksum_algorithm(
        mut self,
        id: impl Into<String>,
        constructor: ChecksumConstructor,
    ) -> Self {
        self.checksum_algorithms.add(id, constructor);
        self
    }

    pub fn with_endpoint_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.endpoint_resolver = resolver;
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_region(self, region: impl Into<String>) -> Self {
        self.with_built_in_param(BUILT_IN_REGION, Value::String(region.into()))
    }

    pub fn with_endpoint(self, url: impl Into<String>) -> Self {
        self.with_built_in_param(BUILT_IN_ENDPOINT, Value::String(url.into()))
    }

    pub fn with_use_fips_endpoint(self, enabled: bool) -> Self {
        self.with_built_in_param(BUILT_IN_USE_FIPS, Value::Bool(enabled))
    }

    pub fn with_use_dualstack_endpoint(self, enabled: bool) -> Self {
        self.with_built_in_param(BUILT_IN_USE_DUALSTACK, Value::Bool(enabled))
    }

    pub fn with_built_in_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.built_in_params.insert(name.into(), value);
        self
    }

    pub fn with_client_context_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.client_context_params.insert(name.into(), value);
        self
    }

    pub fn with_host_version(
        mut self,
        version: impl Into<String>,
        warning: Arc<VersionWarning>,
    ) -> Self {
        self.host_version = Some(version.into());
        self.version_warning = Some(warning);
        self
    }

    /// Overlay settings from the process environment.
    ///
    /// Unset or empty variables leave the current value alone; malformed values
    /// are a configuration error.
    pub fn with_env(self) -> SdkResult<Self> {
        self.with_env_source(|name| std::env::var(name).ok())
    }

    fn with_env_source(mut self, lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(region) = read(ENV_REGION) {
            debug!("Using region {region} from {ENV_REGION}");
            self = self.with_region(region.trim());
        }
        if let Some(attempts) = read(ENV_MAX_ATTEMPTS) {
            let attempts: u32 = attempts.trim().parse().map_err(|_| {
                SdkError::Configuration(format!(
                    "{ENV_MAX_ATTEMPTS} must be a positive integer, got '{attempts}'"
                ))
            })?;
            if attempts == 0 {
                return Err(SdkError::Configuration(format!(
                    "{ENV_MAX_ATTEMPTS} must be a positive integer, got '0'"
                )));
            }
            self.retry_strategy = Arc::new(StandardRetryStrategy::new(attempts));
        }
        if let Some(flag) = read(ENV_USE_FIPS_ENDPOINT) {
            self = self.with_use_fips_endpoint(env_flag(ENV_USE_FIPS_ENDPOINT, &flag)?);
        }
        if let Some(flag) = read(ENV_USE_DUALSTACK_ENDPOINT) {
            self = self.with_use_dualstack_endpoint(env_flag(ENV_USE_DUALSTACK_ENDPOINT, &flag)?);
        }
        if let Some(url) = read(ENV_ENDPOINT_URL) {
            url::Url::parse(url.trim()).map_err(|e| {
                SdkError::Configuration(format!("{ENV_ENDPOINT_URL} is not a valid URL: {e}"))
            })?;
            self = self.with_endpoint(url.trim());
        }
        Ok(self)
    }

    pub fn region(&self) -> Option<&str> {
        self.built_in_params
            .get(BUILT_IN_REGION)
            .and_then(Value::as_str)
    }
}

fn env_flag(name: &str, value: &str) -> SdkResult<bool> {
    parse_boolean(&value.trim().to_ascii_lowercase())
        .map_err(|_| SdkError::Configuration(format!("{name} must be 'true' or 'false', got '{value}'")))
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("request_handler", &self.request_handler)
            .field("logger", &self.logger)
            .field("cache_middleware", &self.cache_middleware)
            .field("retry_strategy", &self.retry_strategy)
            .field("checksum_algorithms", &self.checksum_algorithms)
            .field("endpoint_resolver", &self.endpoint_resolver)
            .field("signer", &self.signer)
            .field("built_in_params", &self.built_in_params)
            .field("client_context_params", &self.client_context_params)
            .field("host_version", &self.host_version)
            .finish_non_exhaustive()
    }
}
