mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{Reply, ScriptedTransport, client};
use reqwest::Method;
use serde_json::{Value, json};
use strict_fetch::http::{
    ApiError, Endpoint, FetchClient, ParamsError, ReqwestTransport, RequestOptions, TransportBody, TransportError,
    fetch_api, parallel,
};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_scenario_url_reaches_transport() {
    let transport = ScriptedTransport::new([Reply::json(200, json!({"id": 42}))]);

    let envelope = fetch_api(
        transport.as_ref(),
        &Endpoint::get("/items/:id"),
        RequestOptions::new().path("id", "42").query("page", 1),
        Some("https://api.test"),
    )
    .await
    .unwrap();

    assert!(envelope.ok());
    assert_eq!(envelope.data(), &json!({"id": 42}));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.as_str(), "https://api.test/items/42?page=1");
    assert_eq!(requests[0].method, Method::GET);
}

#[tokio::test]
async fn test_missing_params_never_touch_transport() {
    let transport = ScriptedTransport::always(|| Reply::json(200, Value::Null));
    let endpoint = Endpoint::get("https://api.test/:org/:repo/issues/:number");

    let err = fetch_api(transport.as_ref(), &endpoint, RequestOptions::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Params(ParamsError::Missing)));

    let err = fetch_api(
        transport.as_ref(),
        &endpoint,
        RequestOptions::new().path_map(Default::default()),
        None,
    )
    .await
    .unwrap_err();
    match err {
        ApiError::Params(ParamsError::Unresolved(names)) => assert_eq!(names, vec!["org", "repo", "number"]),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_url_errors_are_returned_even_without_throwing() {
    let transport = ScriptedTransport::always(|| Reply::json(200, Value::Null));

    let err = fetch_api(transport.as_ref(), &Endpoint::get("/relative"), RequestOptions::new(), None)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Cannot construct url \"/relative\"");
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_call_time_query_wins_over_defaults() {
    let transport = ScriptedTransport::always(|| Reply::json(200, json!([])));
    let client = client(&transport)
        .with_base_url("https://api.test")
        .with_defaults(RequestOptions::new().query("page", 1).query("per_page", 20));

    client
        .fetch(&Endpoint::get("/list?page=9"), RequestOptions::new().query("page", 3))
        .await
        .unwrap();

    let url = &transport.requests()[0].url;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![("page".to_string(), "3".to_string()), ("per_page".to_string(), "20".to_string())]
    );
}

#[tokio::test]
async fn test_body_encoding_reaches_transport() {
    let transport = ScriptedTransport::always(|| Reply::text(201, ""));
    let endpoint = Endpoint::post("https://api.test/new");

    fetch_api(
        transport.as_ref(),
        &endpoint,
        RequestOptions::new().body(json!({"license": "123", "tags": [1, 2]})),
        None,
    )
    .await
    .unwrap();
    fetch_api(transport.as_ref(), &endpoint, RequestOptions::new().body("raw text"), None)
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0].body,
        Some(TransportBody::Text(r#"{"license":"123","tags":[1,2]}"#.into()))
    );
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[1].body, Some(TransportBody::Text("raw text".into())));
    assert_eq!(requests[1].header("content-type"), None);
}

#[tokio::test]
async fn test_transport_failure_is_folded_unless_throwing() {
    let transport = ScriptedTransport::always(|| Reply::Fail(TransportError::Network("connection refused".into())));
    let endpoint = Endpoint::get("https://api.test/");

    let envelope = fetch_api(transport.as_ref(), &endpoint, RequestOptions::new(), None)
        .await
        .unwrap();
    assert!(!envelope.ok());
    assert_eq!(envelope.status_code(), 0);
    assert_eq!(envelope.status_text(), "Request failed: connection refused");

    let err = fetch_api(
        transport.as_ref(),
        &endpoint,
        RequestOptions::new().throws_on_error(true),
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Request error [0]: Request failed: connection refused");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_error_status_with_throwing() {
    let transport = ScriptedTransport::new([Reply::json(404, json!({"message": "missing"}))]);

    let err = fetch_api(
        transport.as_ref(),
        &Endpoint::get("https://api.test/items/1"),
        RequestOptions::new().throws_on_error(true),
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::Response { code: 404, ref message } if message == "Not Found"));
}

#[tokio::test]
async fn test_error_status_without_throwing_keeps_error_body() {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let transport = ScriptedTransport::new([Reply::json(422, json!({"message": "invalid license"}))]);
    let envelope = fetch_api(
        transport.as_ref(),
        &Endpoint::post("https://api.test/new"),
        RequestOptions::new(),
        None,
    )
    .await
    .unwrap();

    assert!(!envelope.ok());
    assert_eq!(envelope.status_code(), 422);
    let body: ErrorBody = envelope.data_as().unwrap();
    assert_eq!(body.message, "invalid license");
}

#[tokio::test]
async fn test_success_handler_transforms_data() {
    let transport = ScriptedTransport::new([Reply::json(200, json!({"items": ["a", "b"]}))]);
    let endpoint = Endpoint::get("https://api.test/items").on_success(|data| data["items"].clone());

    let envelope = fetch_api(transport.as_ref(), &endpoint, RequestOptions::new(), None)
        .await
        .unwrap();

    assert_eq!(envelope.data(), &json!(["a", "b"]));
    assert_eq!(envelope.status_code(), 200);
}

#[tokio::test]
async fn test_handlers_skip_failure_envelopes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let endpoint = Endpoint::get("https://api.test/items")
        .on_success({
            let calls = Arc::clone(&calls);
            move |data| {
                calls.fetch_add(1, Ordering::SeqCst);
                data
            }
        })
        .on_error({
            let calls = Arc::clone(&calls);
            move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                json!("handled")
            }
        });
    let transport = ScriptedTransport::new([
        Reply::Fail(TransportError::Network("connection reset".into())),
        Reply::text(500, "<html>oops</html>"),
        Reply::text(200, "<html>ok</html>"),
    ]);

    for _ in 0..3 {
        let envelope = fetch_api(transport.as_ref(), &endpoint, RequestOptions::new(), None)
            .await
            .unwrap();
        assert!(!envelope.ok());
        assert_eq!(envelope.status_code(), 0);
        assert_eq!(envelope.data(), &Value::Null);
    }

    assert_eq!(transport.request_count(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fetch_api_over_reqwest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/vehicles/7"))
        .and(query_param("notify", "true"))
        .and(header("Authorization", "Bearer token"))
        .and(body_string(r#"{"color":"red"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":7,"color":"red"}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let envelope = fetch_api(
        &transport,
        &Endpoint::patch("/vehicles/:id"),
        RequestOptions::new()
            .path("id", 7)
            .query("notify", true)
            .header("Authorization", "Bearer token")
            .body(json!({"color": "red"})),
        Some(&mock_server.uri()),
    )
    .await
    .unwrap();

    assert!(envelope.ok());
    assert_eq!(envelope.status_text(), "OK");
    assert_eq!(envelope.data(), &json!({"id": 7, "color": "red"}));
}

#[tokio::test]
async fn test_transport_timeout_over_reqwest() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::with_config(Duration::from_millis(200), None).unwrap();
    let envelope = fetch_api(
        &transport,
        &Endpoint::get(mock_server.uri()),
        RequestOptions::new(),
        None,
    )
    .await
    .unwrap();

    assert!(!envelope.ok());
    assert_eq!(envelope.status_code(), 0);
    assert!(envelope.status_text().starts_with("Request failed: "));
}

#[tokio::test]
async fn test_simple_requests() {
    let transport = ScriptedTransport::new([
        Reply::json(200, json!({"items": ["hello"]})),
        Reply::text(200, "not json"),
        Reply::text(500, "boom"),
    ]);
    let client: FetchClient = client(&transport);

    let response = client
        .get("https://example.com/", RequestOptions::new().query("page", 1))
        .await
        .unwrap();
    assert!(response.ok());
    assert_eq!(response.json::<Value>().unwrap(), Some(json!({"items": ["hello"]})));

    let response = client
        .post("https://example.com/raw", RequestOptions::new().body(json!({"a": 1})))
        .await
        .unwrap();
    assert_eq!(response.text(), Some("not json"));
    assert_eq!(response.json::<Value>().unwrap(), None);

    let err = client
        .delete("https://example.com/1", RequestOptions::new().throws_on_error(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Response { code: 500, .. }));

    let requests = transport.requests();
    assert_eq!(requests[0].url.as_str(), "https://example.com/?page=1");
    assert_eq!(requests[1].method, Method::POST);
    assert_eq!(requests[1].header("Content-Type"), Some("application/json"));
    assert_eq!(requests[2].method, Method::DELETE);
}

#[tokio::test]
async fn test_simple_transport_failure() {
    let transport = ScriptedTransport::always(|| Reply::Fail(TransportError::Network("refused".into())));
    let client = client(&transport);

    let response = client.get("https://example.com/", RequestOptions::new()).await.unwrap();
    assert!(!response.ok());
    assert_eq!(response.status_code(), 0);
    assert_eq!(response.text(), None);

    let err = client
        .get("https://example.com/", RequestOptions::new().throws_on_error(true))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Request error [0]: Request failed: refused");
}

#[tokio::test]
async fn test_parallel_keeps_input_order() {
    let transport = ScriptedTransport::new([
        Reply::delayed(Duration::from_millis(50), Reply::json(200, json!(1))),
        Reply::json(200, json!(2)),
    ]);
    let client = client(&transport);

    let responses = parallel([
        client.get("https://example.com/slow", RequestOptions::new()),
        client.get("https://example.com/fast", RequestOptions::new()),
    ])
    .await;

    let values: Vec<Value> = responses
        .into_iter()
        .map(|response| response.unwrap().json::<Value>().unwrap().unwrap())
        .collect();
    assert_eq!(values, vec![json!(1), json!(2)]);
}
