use crate::error::DataSourceError;
use crate::http_handler::{http_handler, HttpRequest, HttpResponse, Transport};
use crate::LoadResult;
use futures::future::BoxFuture;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::StatusCode;
use montage_expr::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

struct StubTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<HttpResponse>>,
}

impl StubTransport {
    fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        })
    }
    fn ok(body: &str) -> Arc<Self> {
        Self::new(vec![HttpResponse {
            status: StatusCode::OK,
            body: body.as_bytes().to_vec(),
        }])
    }
    fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, LoadResult<HttpResponse>> {
        self.requests.lock().unwrap().push(request);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HttpResponse {
                status: StatusCode::OK,
                body: b"{}".to_vec(),
            });
        Box::pin(async move { Ok(response) })
    }
}

fn obj(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn str_val(s: &str) -> Value {
    Value::String(s.to_string())
}

#[tokio::test]
async fn post_without_params_sends_empty_json_object() {
    let transport = StubTransport::ok("1");
    let handler = http_handler(transport.clone());

    let result = handler(obj(&[
        ("url", str_val("https://api.example.com/items")),
        ("method", str_val("post")),
    ]))
    .await
    .unwrap();

    assert_eq!(result, Value::Number(1.0));

    let request = transport.last_request();
    assert_eq!(request.method, http::Method::POST);
    assert_eq!(request.body.as_deref(), Some(b"{}".as_slice()));
    assert_eq!(
        request.headers.get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(request.headers.get(ACCEPT).unwrap(), "application/json");
}

#[tokio::test]
async fn get_params_move_into_query_string() {
    let transport = StubTransport::ok("{}");
    let handler = http_handler(transport.clone());

    handler(obj(&[
        ("url", str_val("https://api.example.com/search")),
        ("method", str_val("GET")),
        (
            "params",
            obj(&[("page", Value::Number(2.0)), ("q", str_val("a b"))]),
        ),
    ]))
    .await
    .unwrap();

    let request = transport.last_request();
    assert_eq!(
        request.url,
        "https://api.example.com/search?page=2&q=a%20b"
    );
    assert!(request.body.is_none());
    assert!(request.headers.get(CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn server_error_preserves_status_text_and_body() {
    let transport = StubTransport::new(vec![HttpResponse {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: br#"{"message":"boom"}"#.to_vec(),
    }]);
    let handler = http_handler(transport.clone());

    let err = handler(obj(&[("url", str_val("https://api.example.com/fail"))]))
        .await
        .unwrap_err();

    match err {
        DataSourceError::Transport {
            status,
            status_text,
            body,
        } => {
            assert_eq!(status, 500);
            assert_eq!(status_text, "Internal Server Error");
            assert_eq!(body, Some(serde_json::json!({"message": "boom"})));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn no_content_succeeds_only_for_delete() {
    let no_content = || HttpResponse {
        status: StatusCode::NO_CONTENT,
        body: Vec::new(),
    };

    let transport = StubTransport::new(vec![no_content()]);
    let handler = http_handler(transport);
    let result = handler(obj(&[
        ("url", str_val("https://api.example.com/items/3")),
        ("method", str_val("DELETE")),
    ]))
    .await
    .unwrap();
    assert_eq!(result, Value::Null);

    let transport = StubTransport::new(vec![no_content()]);
    let handler = http_handler(transport);
    let err = handler(obj(&[
        ("url", str_val("https://api.example.com/items")),
        ("method", str_val("POST")),
    ]))
    .await
    .unwrap_err();
    assert!(matches!(err, DataSourceError::Transport { status: 204, .. }));
}

#[tokio::test]
async fn form_encoded_body_when_content_type_declares_it() {
    let transport = StubTransport::ok("{}");
    let handler = http_handler(transport.clone());

    handler(obj(&[
        ("url", str_val("https://api.example.com/login")),
        ("method", str_val("POST")),
        ("contentType", str_val("application/x-www-form-urlencoded")),
        (
            "params",
            obj(&[("name", str_val("ada")), ("pin", Value::Number(42.0))]),
        ),
    ]))
    .await
    .unwrap();

    let request = transport.last_request();
    assert_eq!(request.body.as_deref(), Some(b"name=ada&pin=42".as_slice()));
    assert_eq!(
        request.headers.get(CONTENT_TYPE).unwrap(),
        "application/x-www-form-urlencoded"
    );
}

#[tokio::test]
async fn declared_headers_are_applied_and_invalid_ones_dropped() {
    let transport = StubTransport::ok("{}");
    let handler = http_handler(transport.clone());

    handler(obj(&[
        ("url", str_val("https://api.example.com/items")),
        (
            "headers",
            obj(&[
                ("x-request-id", str_val("abc-123")),
                ("bad header", str_val("dropped")),
            ]),
        ),
    ]))
    .await
    .unwrap();

    let request = transport.last_request();
    assert_eq!(request.headers.get("x-request-id").unwrap(), "abc-123");
    assert!(request.headers.get("bad header").is_none());
}

#[tokio::test(start_paused = true)]
async fn timeout_option_bounds_the_request() {
    struct NeverTransport;
    impl Transport for NeverTransport {
        fn send(&self, _request: HttpRequest) -> BoxFuture<'static, LoadResult<HttpResponse>> {
            Box::pin(futures::future::pending())
        }
    }

    let handler = http_handler(Arc::new(NeverTransport));
    let err = handler(obj(&[
        ("url", str_val("https://api.example.com/slow")),
        ("timeout", Value::Number(50.0)),
    ]))
    .await
    .unwrap_err();

    assert_eq!(err, DataSourceError::Timeout(50));
}
