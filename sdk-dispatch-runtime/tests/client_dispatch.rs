mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use log::Level;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};

use common::{
    client_config, describe_widget, describe_widget_builder, json_response,
    DescribeWidgetInput, DescribeWidgetOutput, FakeTransport, WIDGET_SERVICE_EXCEPTION,
};
use sdk_dispatch_runtime::command::default_plugins;
use sdk_dispatch_runtime::common::{Logger, SENSITIVE_STRING};
use sdk_dispatch_runtime::paginator::{PaginationConfig, Paginator};
use sdk_dispatch_runtime::retry::StandardRetryStrategy;
use sdk_dispatch_runtime::{
    Client, CommandBuilder, Fault, HttpHandlerOptions, SdkError,
};

#[derive(Debug, Default)]
struct RecordingLogger(Mutex<Vec<(Level, String)>>);

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        self.0.lock().unwrap().push((level, message.to_string()));
    }
}

#[tokio::test]
async fn test_send_returns_deserialized_output() {
    let transport = FakeTransport::with_responses([json_response(200, r#"{"Foo":"bar"}"#)]);
    let client = Client::new(client_config(&transport)).unwrap();

    let output = client
        .send(describe_widget().new_command(DescribeWidgetInput::named("w-1")))
        .await
        .unwrap();
    assert_eq!(
        output,
        DescribeWidgetOutput {
            foo: Some("bar".into()),
            ..DescribeWidgetOutput::default()
        }
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.as_str(), "https://widgets.example.com/");
    assert_eq!(requests[0].body, br#"{"WidgetName":"w-1"}"#.to_vec());
    assert_eq!(
        requests[0].headers.get("content-length").unwrap(),
        &requests[0].body.len().to_string()
    );
}

#[tokio::test]
async fn test_error_response_maps_to_service_exception() {
    let transport = FakeTransport::with_responses([json_response(
        400,
        r#"{"__type":"ValidationException","message":"bad input"}"#,
    )]);
    let client = Client::new(client_config(&transport)).unwrap();

    let error = client
        .send(describe_widget().new_command(DescribeWidgetInput::named("w-1")))
        .await
        .unwrap_err();

    let exception = error.service_exception().expect("service exception");
    assert_eq!(exception.name(), "ValidationException");
    assert_eq!(exception.fault(), Fault::Client);
    assert_eq!(exception.message(), "bad input");
    assert_eq!(exception.metadata().http_status_code, Some(400));
    assert_eq!(exception.metadata().request_id.as_deref(), Some("req-123"));
    assert_eq!(exception.metadata().attempts, Some(1));
    assert!(WIDGET_SERVICE_EXCEPTION.matches(exception));
}

#[tokio::test]
async fn test_handler_cache_reuses_resolution_per_command_type() {
    let resolutions = Arc::new(AtomicUsize::new(0));
    let counter = resolutions.clone();
    let command_type = describe_widget_builder()
        .middleware(move |command_type, _client_stack, config, _options| {
            counter.fetch_add(1, Ordering::SeqCst);
            default_plugins(command_type, config)
        })
        .build();

    let transport = FakeTransport::with_responses((0..3).map(|_| json_response(200, "{}")));
    let client = Client::new(client_config(&transport).with_cache_middleware(true)).unwrap();

    for name in ["a", "b"] {
        assert_ok!(
            client
                .send(command_type.new_command(DescribeWidgetInput::named(name)))
                .await
        );
    }
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);
    assert_eq!(client.cached_handlers(), 1);

    let options = HttpHandlerOptions::with_request_timeout(Duration::from_secs(3));
    assert_ok!(
        client
            .send_with_options(
                command_type.new_command(DescribeWidgetInput::named("c")),
                options.clone(),
            )
            .await
    );
    assert_eq!(resolutions.load(Ordering::SeqCst), 2);
    assert_eq!(client.cached_handlers(), 1);
    assert_eq!(transport.last_options(), Some(options));
}

#[tokio::test]
async fn test_cache_disabled_resolves_every_send() {
    let resolutions = Arc::new(AtomicUsize::new(0));
    let counter = resolutions.clone();
    let command_type = describe_widget_builder()
        .middleware(move |command_type, _client_stack, config, _options| {
            counter.fetch_add(1, Ordering::SeqCst);
            default_plugins(command_type, config)
        })
        .build();

    let transport = FakeTransport::with_responses((0..2).map(|_| json_response(200, "{}")));
    let client = Client::new(client_config(&transport)).unwrap();
    for _ in 0..2 {
        assert_ok!(client.send(command_type.new_default_command()).await);
    }
    assert_eq!(resolutions.load(Ordering::SeqCst), 2);
    assert_eq!(client.cached_handlers(), 0);
}

#[tokio::test]
async fn test_callback_receives_output_and_error() {
    let transport = FakeTransport::with_responses([
        json_response(200, r#"{"Foo":"bar"}"#),
        json_response(400, r#"{"__type":"ValidationException"}"#),
    ]);
    let client = Arc::new(Client::new(client_config(&transport)).unwrap());

    let (tx, rx) = oneshot::channel();
    client
        .clone()
        .send_with_callback(describe_widget().new_default_command(), None, move |result| {
            tx.send(result).unwrap();
        })
        .await
        .unwrap();
    assert_eq!(rx.await.unwrap().unwrap().foo.as_deref(), Some("bar"));

    let (tx, rx) = oneshot::channel();
    client
        .clone()
        .send_with_callback(describe_widget().new_default_command(), None, move |result| {
            tx.send(result).unwrap();
        })
        .await
        .unwrap();
    let error = rx.await.unwrap().unwrap_err();
    assert_eq!(error.name(), Some("ValidationException"));
}

#[test_log::test(tokio::test)]
async fn test_panicking_callback_is_swallowed() {
    let transport = FakeTransport::with_responses([json_response(200, "{}")]);
    let client = Arc::new(Client::new(client_config(&transport)).unwrap());
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = delivered.clone();

    let handle = client.send_with_callback(
        describe_widget().new_default_command(),
        None,
        move |result: Result<DescribeWidgetOutput, SdkError>| {
            assert!(result.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
            panic!("callback bug");
        },
    );

    assert_ok!(handle.await);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transport_errors_pass_through() {
    let transport = FakeTransport::with_responses([]);
    let client = Client::new(client_config(&transport)).unwrap();

    let error = client
        .send(describe_widget().new_default_command())
        .await
        .unwrap_err();
    assert!(matches!(error, SdkError::Transport(_)));
    assert_eq!(error.to_string(), "Transport error: connection refused");
}

#[tokio::test]
async fn test_missing_serializer_is_a_configuration_error() {
    let transport = FakeTransport::with_responses([]);
    let client = Client::new(client_config(&transport)).unwrap();
    let command_type = CommandBuilder::<DescribeWidgetInput, DescribeWidgetOutput>::new()
        .names("WidgetClient", "BrokenCommand")
        .build();

    let error = client
        .send(command_type.new_default_command())
        .await
        .unwrap_err();
    assert!(matches!(error, SdkError::Configuration(_)));
    assert_eq!(transport.request_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_server_faults_are_retried() {
    let transport = FakeTransport::with_responses([
        json_response(503, r#"{"__type":"ServiceUnavailable"}"#),
        json_response(200, r#"{"Foo":"bar"}"#),
    ]);
    let strategy = StandardRetryStrategy::new(3).with_base_delay(Duration::ZERO);
    let client =
        Client::new(client_config(&transport).with_retry_strategy(Arc::new(strategy))).unwrap();

    let response = client
        .send_with_metadata(describe_widget().new_default_command(), None)
        .await
        .unwrap();
    assert_eq!(response.output.foo.as_deref(), Some("bar"));
    assert_eq!(response.metadata.attempts, Some(2));
    assert_eq!(response.metadata.http_status_code, Some(200));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_destroy_releases_transport_and_cache() {
    let transport = FakeTransport::with_responses((0..2).map(|_| json_response(200, "{}")));
    let client = Client::new(client_config(&transport).with_cache_middleware(true)).unwrap();
    let command_type = describe_widget();

    assert_ok!(client.send(command_type.new_default_command()).await);
    assert_eq!(client.cached_handlers(), 1);

    client.destroy();
    assert_eq!(transport.destroy_count(), 1);
    assert_eq!(client.cached_handlers(), 0);

    assert_ok!(client.send(command_type.new_default_command()).await);
}

#[tokio::test]
async fn test_logger_middleware_applies_sensitive_filters() {
    let logger = Arc::new(RecordingLogger::default());
    let transport = FakeTransport::with_responses([
        json_response(200, r#"{"Foo":"secret-output"}"#),
        json_response(400, r#"{"__type":"ValidationException"}"#),
    ]);
    let client = Client::new(client_config(&transport).with_logger(logger.clone())).unwrap();
    let command_type = describe_widget_builder()
        .sensitive_filters(
            |input: &DescribeWidgetInput| serde_json::json!({ "WidgetName": input.widget_name }),
            |_output: &DescribeWidgetOutput| serde_json::json!({ "Foo": SENSITIVE_STRING }),
        )
        .build();

    assert_ok!(client.send(command_type.new_command(DescribeWidgetInput::named("w"))).await);
    assert_err!(client.send(command_type.new_default_command()).await);

    let entries = logger.0.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, Level::Info);
    assert!(entries[0].1.contains(r#""commandName":"DescribeWidgetCommand""#));
    assert!(entries[0].1.contains(SENSITIVE_STRING));
    assert!(!entries[0].1.contains("secret-output"));
    assert_eq!(entries[1].0, Level::Error);
    assert!(entries[1].1.contains("ValidationException"));
}

#[tokio::test]
async fn test_paginator_follows_tokens() {
    let transport = FakeTransport::with_responses([
        json_response(200, r#"{"Foo":"page-1","NextToken":"t1"}"#),
        json_response(200, r#"{"Foo":"page-2","NextToken":"t2"}"#),
        json_response(200, r#"{"Foo":"page-3"}"#),
    ]);
    let client = Arc::new(Client::new(client_config(&transport)).unwrap());
    let paginator = Paginator::new(
        describe_widget(),
        |input: &mut DescribeWidgetInput, token| input.next_token = token,
        |output: &DescribeWidgetOutput| output.next_token.clone(),
    )
    .with_page_size(|input: &mut DescribeWidgetInput, size| {
        input.max_results.get_or_insert(size);
    });

    let pages: Vec<_> = paginator
        .paginate(
            client,
            DescribeWidgetInput::named("w"),
            PaginationConfig {
                page_size: Some(10),
                ..PaginationConfig::default()
            },
        )
        .collect()
        .await;

    let foos: Vec<_> = pages
        .into_iter()
        .map(|page| page.unwrap().foo.unwrap())
        .collect();
    assert_eq!(foos, vec!["page-1", "page-2", "page-3"]);

    let bodies: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| String::from_utf8(r.body.clone()).unwrap())
        .collect();
    assert_eq!(bodies[0], r#"{"WidgetName":"w","MaxResults":10}"#);
    assert_eq!(bodies[2], r#"{"WidgetName":"w","NextToken":"t2","MaxResults":10}"#);
}

#[tokio::test]
async fn test_paginator_stops_on_repeated_token() {
    let transport = FakeTransport::with_responses([
        json_response(200, r#"{"NextToken":"same"}"#),
        json_response(200, r#"{"NextToken":"same"}"#),
    ]);
    let client = Arc::new(Client::new(client_config(&transport)).unwrap());
    let paginator = Paginator::new(
        describe_widget(),
        |input: &mut DescribeWidgetInput, token| input.next_token = token,
        |output: &DescribeWidgetOutput| output.next_token.clone(),
    );

    let pages: Vec<_> = paginator
        .paginate(
            client,
            DescribeWidgetInput::named("w"),
            PaginationConfig {
                stop_on_same_token: true,
                ..PaginationConfig::default()
            },
        )
        .collect()
        .await;
    assert_eq!(pages.len(), 2);
    assert_eq!(transport.request_count(), 2);
}
