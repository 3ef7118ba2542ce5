//! Endpoint parameters and resolution.
//!
//! A command type declares how each endpoint parameter is obtained
//! ([`EndpointParameterInstructions`]); the endpoint middleware evaluates those
//! instructions against the client configuration and the input, then hands the
//! result to the configured [`EndpointResolver`].

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use url::Url;

use crate::error::{SdkError, SdkResult};

/// Resolved endpoint parameters, keyed by parameter name (`Region`, `Endpoint`, ...).
pub type EndpointParams = Map<String, Value>;

/// Where the value of one endpoint parameter comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointParameter {
    /// A client built-in such as `region` or `endpoint`.
    BuiltIn(String),
    /// A service-specific client context parameter.
    ClientContext(String),
    /// A fixed value declared by the operation.
    Static(Value),
    /// A top-level member of the serialized operation input.
    Context(String),
}

/// Ordered parameter name to source mapping for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointParameterInstructions {
    entries: Vec<(String, EndpointParameter)>,
}

impl EndpointParameterInstructions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters every operation resolves from client built-ins.
    pub fn common() -> Self {
        Self::new()
            .with("UseFIPS", EndpointParameter::BuiltIn("useFipsEndpoint".into()))
            .with("Endpoint", EndpointParameter::BuiltIn("endpoint".into()))
            .with("Region", EndpointParameter::BuiltIn("region".into()))
            .with(
                "UseDualStack",
                EndpointParameter::BuiltIn("useDualstackEndpoint".into()),
            )
    }

    pub fn with(mut self, name: impl Into<String>, parameter: EndpointParameter) -> Self {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, parameter));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointParameter)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn needs_input(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, p)| matches!(p, EndpointParameter::Context(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluate `instructions`. Parameters whose source has no value are omitted.
pub fn resolve_params(
    instructions: &EndpointParameterInstructions,
    input: &Value,
    built_in_params: &Map<String, Value>,
    client_context_params: &Map<String, Value>,
) -> EndpointParams {
    let mut params = EndpointParams::new();
    for (name, parameter) in instructions.iter() {
        let value = match parameter {
            EndpointParameter::BuiltIn(key) => built_in_params.get(key).cloned(),
            EndpointParameter::ClientContext(key) => client_context_params.get(key).cloned(),
            EndpointParameter::Static(value) => Some(value.clone()),
            EndpointParameter::Context(member) => input.get(member).cloned(),
        };
        if let Some(value) = value.filter(|v| !v.is_null()) {
            params.insert(name.to_string(), value);
        }
    }
    params
}

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: Url,
    pub headers: BTreeMap<String, Vec<String>>,
    pub properties: Map<String, Value>,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
            properties: Map::new(),
        }
    }
}

/// Turns resolved parameters into an [`Endpoint`].
pub trait EndpointResolver: Send + Sync + fmt::Debug {
    fn resolve_endpoint(&self, params: &EndpointParams) -> SdkResult<Endpoint>;
}

/// Uses the `Endpoint` parameter (a custom endpoint URL) and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEndpointResolver;

impl EndpointResolver for DefaultEndpointResolver {
    fn resolve_endpoint(&self, params: &EndpointParams) -> SdkResult<Endpoint> {
        let url = params
            .get("Endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SdkError::Configuration(
                    "No endpoint configured; set an endpoint URL or an endpoint resolver".into(),
                )
            })?;
        let url = Url::parse(url)
            .map_err(|e| SdkError::Configuration(format!("Invalid endpoint URL '{url}': {e}")))?;
        Ok(Endpoint::new(url))
    }
}

/// Always resolves to the same URL.
#[derive(Debug, Clone)]
pub struct StaticEndpointResolver {
    url: Url,
}

impl StaticEndpointResolver {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl EndpointResolver for StaticEndpointResolver {
    fn resolve_endpoint(&self, _params: &EndpointParams) -> SdkResult<Endpoint> {
        Ok(Endpoint::new(self.url.clone()))
    }
}

/// Substitutes `{Param}` placeholders in a URL template, e.g.
/// `https://widgets.{Region}.example.com`.
#[derive(Debug, Clone)]
pub struct TemplateEndpointResolver {
    template: String,
}

impl TemplateEndpointResolver {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl EndpointResolver for TemplateEndpointResolver {
    fn resolve_endpoint(&self, params: &EndpointParams) -> SdkResult<Endpoint> {
        if params.contains_key("Endpoint") {
            return DefaultEndpointResolver.resolve_endpoint(params);
        }
        let mut url = self.template.clone();
        for (name, value) in params {
            let placeholder = format!("{{{name}}}");
            if !url.contains(&placeholder) {
                continue;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            url = url.replace(&placeholder, &text);
        }
        if url.contains('{') {
            return Err(SdkError::Configuration(format!(
                "Unresolved endpoint template parameters in '{url}'"
            )));
        }
        let parsed = Url::parse(&url)
            .map_err(|e| SdkError::Configuration(format!("Invalid endpoint URL '{url}': {e}")))?;
        Ok(Endpoint::new(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolve_params_by_source() {
        let instructions = EndpointParameterInstructions::common()
            .with("Bucket", EndpointParameter::Context("Name".into()))
            .with("Accelerate", EndpointParameter::ClientContext("accelerate".into()))
            .with("UseArnRegion", EndpointParameter::Static(json!(true)));
        assert!(instructions.needs_input());

        let params = resolve_params(
            &instructions,
            &json!({"Name": "my-widget"}),
            &object(json!({"region": "us-west-2", "useFipsEndpoint": false})),
            &object(json!({"accelerate": true})),
        );

        assert_eq!(
            Value::Object(params),
            json!({
                "UseFIPS": false,
                "Region": "us-west-2",
                "Bucket": "my-widget",
                "Accelerate": true,
                "UseArnRegion": true,
            })
        );
    }

    #[test]
    fn test_with_replaces_existing_parameter() {
        let instructions = EndpointParameterInstructions::new()
            .with("Region", EndpointParameter::Static(json!("a")))
            .with("Region", EndpointParameter::Static(json!("b")));
        let params: Vec<_> = instructions.iter().collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].1, &EndpointParameter::Static(json!("b")));
    }

    #[test]
    fn test_default_resolver_requires_endpoint() {
        let err = DefaultEndpointResolver
            .resolve_endpoint(&object(json!({"Region": "us-east-1"})))
            .unwrap_err();
        assert!(matches!(err, SdkError::Configuration(_)));

        let endpoint = DefaultEndpointResolver
            .resolve_endpoint(&object(json!({"Endpoint": "https://localhost:8443/base"})))
            .unwrap();
        assert_eq!(endpoint.url.as_str(), "https://localhost:8443/base");
    }

    #[test]
    fn test_template_resolver() {
        let resolver = TemplateEndpointResolver::new("https://widgets.{Region}.example.com");
        let endpoint = resolver
            .resolve_endpoint(&object(json!({"Region": "eu-west-1", "UseFIPS": false})))
            .unwrap();
        assert_eq!(endpoint.url.as_str(), "https://widgets.eu-west-1.example.com/");

        assert!(resolver.resolve_endpoint(&EndpointParams::new()).is_err());

        let custom = resolver
            .resolve_endpoint(&object(json!({"Endpoint": "http://localhost:1234"})))
            .unwrap();
        assert_eq!(custom.url.as_str(), "http://localhost:1234/");
    }
}
