//! The default `http` request handler.
//!
//! Serializes resolved request options into a concrete request and
//! interprets the response, over an injected [`Transport`]. There is no
//! bundled HTTP client; the embedding host supplies one.

use crate::error::{DataSourceError, LoadResult};
use crate::handlers::RequestHandler;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use montage_expr::Value;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A concrete request as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// A raw response from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Injected network transport. The host wires its HTTP client in here;
/// tests stub it.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'static, LoadResult<HttpResponse>>;
}

const MULTIPART_BOUNDARY: &str = "montage-form-boundary";

/// Build the default handler over `transport`.
pub fn http_handler(transport: Arc<dyn Transport>) -> RequestHandler {
    Arc::new(move |options: Value| {
        let transport = transport.clone();
        Box::pin(async move {
            let (request, timeout_ms) = build_request(&options)?;
            let method = request.method.clone();
            debug!(method = %method, url = %request.url, "dispatching request");

            let send = transport.send(request);
            let response = match timeout_ms {
                Some(ms) => tokio::time::timeout(Duration::from_millis(ms), send)
                    .await
                    .map_err(|_| DataSourceError::Timeout(ms))??,
                None => send.await?,
            };

            interpret_response(&method, response)
        })
    })
}

fn field_str(options: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| options.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn build_request(options: &Value) -> LoadResult<(HttpRequest, Option<u64>)> {
    let url = field_str(options, &["url", "uri", "target"])
        .ok_or_else(|| DataSourceError::InvalidOptions("missing 'url'".to_string()))?;

    let method_name = field_str(options, &["method"]).unwrap_or_else(|| "GET".to_string());
    let method: Method = method_name
        .to_uppercase()
        .parse()
        .map_err(|_| DataSourceError::InvalidOptions(format!("bad method '{}'", method_name)))?;

    let params = match options.get("params") {
        Some(Value::Object(map)) => map.clone(),
        _ => Default::default(),
    };

    let content_type =
        field_str(options, &["contentType"]).unwrap_or_else(|| "application/json".to_string());

    let timeout_ms = match options.get("timeout") {
        Some(Value::Number(n)) if *n > 0.0 => Some(*n as u64),
        _ => None,
    };

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(Value::Object(declared)) = options.get("headers") {
        for (name, value) in declared {
            let Ok(name) = name.parse::<HeaderName>() else {
                warn!(header = %name, "dropping invalid header name");
                continue;
            };
            let Ok(value) = HeaderValue::from_str(&value.render()) else {
                warn!(header = %name, "dropping invalid header value");
                continue;
            };
            headers.insert(name, value);
        }
    }

    // GET/DELETE/OPTIONS carry parameters in the query string; everything
    // else serializes them into the body.
    let query_methods = [Method::GET, Method::DELETE, Method::OPTIONS];
    let (url, body) = if query_methods.contains(&method) {
        (append_query(&url, &params), None)
    } else {
        let body = encode_body(&content_type, &params)?;
        let declared_type = if content_type.starts_with("multipart/form-data") {
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY)
        } else {
            content_type.clone()
        };
        if let Ok(value) = HeaderValue::from_str(&declared_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        (url, Some(body))
    };

    Ok((
        HttpRequest {
            method,
            url,
            headers,
            body,
        },
        timeout_ms,
    ))
}

fn append_query(url: &str, params: &std::collections::BTreeMap<String, Value>) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(&v.render())))
        .collect();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query.join("&"))
}

fn encode_body(
    content_type: &str,
    params: &std::collections::BTreeMap<String, Value>,
) -> LoadResult<Vec<u8>> {
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let encoded: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(&v.render())))
            .collect();
        return Ok(encoded.join("&").into_bytes());
    }

    if content_type.starts_with("multipart/form-data") {
        let mut body = String::new();
        for (name, value) in params {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY,
                name,
                value.render()
            ));
        }
        body.push_str(&format!("--{}--\r\n", MULTIPART_BOUNDARY));
        return Ok(body.into_bytes());
    }

    // JSON by default.
    let map: serde_json::Map<String, JsonValue> = params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::to_vec(&JsonValue::Object(map))
        .map_err(|e| DataSourceError::InvalidOptions(e.to_string()))
}

fn interpret_response(method: &Method, response: HttpResponse) -> LoadResult<Value> {
    let status = response.status;
    let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

    if status.is_success() {
        // 204 carries no body; only DELETE accepts that.
        if status == StatusCode::NO_CONTENT {
            if *method == Method::DELETE {
                return Ok(Value::Null);
            }
            return Err(DataSourceError::Transport {
                status: status.as_u16(),
                status_text: "No Content without a body".to_string(),
                body: None,
            });
        }
        return Ok(decode_body(&response.body));
    }

    let body = if status.as_u16() >= 400 {
        serde_json::from_slice::<JsonValue>(&response.body).ok()
    } else {
        None
    };

    Err(DataSourceError::Transport {
        status: status.as_u16(),
        status_text,
        body,
    })
}

fn decode_body(body: &[u8]) -> Value {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::String(String::from_utf8_lossy(body).to_string()),
    }
}

/// Minimal percent-encoding for query and form components.
fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
