use async_trait::async_trait;
use log::trace;

use super::Transport;
use crate::error::BoxError;
use crate::http::{HttpHandlerOptions, HttpRequest, HttpResponse};

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn handle(
        &self,
        request: HttpRequest,
        options: &HttpHandlerOptions,
    ) -> Result<HttpResponse, BoxError> {
        trace!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue, Method, StatusCode};
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_round_trip_through_reqwest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widgets"))
            .and(header("x-amz-target", "Widgets.Describe"))
            .and(body_string(r#"{"Name":"w"}"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-amzn-requestid", "req-1")
                    .set_body_string(r#"{"Foo":"bar"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/widgets", server.uri())).unwrap();
        let request = HttpRequest::new(Method::POST, url)
            .with_header(
                HeaderName::from_static("x-amz-target"),
                HeaderValue::from_static("Widgets.Describe"),
            )
            .with_body(r#"{"Name":"w"}"#);

        let response = ReqwestTransport::new()
            .handle(request, &HttpHandlerOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("x-amzn-requestid"), Some("req-1"));
        assert_eq!(response.body, br#"{"Foo":"bar"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_request_timeout_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let request = HttpRequest::new(Method::GET, Url::parse(&server.uri()).unwrap());
        let result = ReqwestTransport::new()
            .handle(
                request,
                &HttpHandlerOptions::with_request_timeout(Duration::from_millis(50)),
            )
            .await;
        assert!(result.is_err());
    }
}
