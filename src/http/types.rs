//! Request and response types of the endpoint client.
//!
//! An [`Endpoint`] is declared once per API operation. Each call supplies a
//! [`RequestOptions`] and receives a [`ResponseEnvelope`].

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Marker that starts a path variable segment, as in `/items/:id`.
pub const PATH_VARIABLE_MARKER: char = ':';

type SuccessHandler = dyn Fn(Value) -> Value + Send + Sync;
type ErrorHandler = dyn Fn(u16, Value) -> Value + Send + Sync;

/// Static declaration of one API endpoint.
///
/// `endpoint` is a URL or a path relative to a base URL, and may contain
/// `:name` segments that are filled from [`RequestOptions::path`] at call
/// time. Descriptors are never mutated by a request.
///
/// # Example
///
/// ```rust
/// use strict_fetch::http::Endpoint;
///
/// let get_item = Endpoint::get("/items/:id");
/// assert_eq!(get_item.method().as_str(), "GET");
/// assert_eq!(get_item.endpoint(), "/items/:id");
/// ```
#[derive(Clone, Deserialize, Serialize)]
pub struct Endpoint {
    #[serde(with = "method_serde", default = "default_method")]
    method: Method,
    endpoint: String,
    #[serde(skip)]
    handlers: EndpointHandlers,
}

fn default_method() -> Method {
    Method::GET
}

impl Endpoint {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            handlers: EndpointHandlers::default(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Attaches a transform for parsed bodies of successful (2xx) responses.
    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.handlers.on_success = Some(Arc::new(handler));
        self
    }

    /// Attaches a transform for parsed bodies of non-2xx responses.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(u16, Value) -> Value + Send + Sync + 'static,
    {
        self.handlers.on_error = Some(Arc::new(handler));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn handlers(&self) -> &EndpointHandlers {
        &self.handlers
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("on_success", &self.handlers.on_success.is_some())
            .field("on_error", &self.handlers.on_error.is_some())
            .finish()
    }
}

/// Body transforms attached to an [`Endpoint`].
///
/// Handlers see only parsed bodies; the status of the envelope is never
/// theirs to change.
#[derive(Clone, Default)]
pub(crate) struct EndpointHandlers {
    on_success: Option<Arc<SuccessHandler>>,
    on_error: Option<Arc<ErrorHandler>>,
}

impl EndpointHandlers {
    pub(crate) fn apply(&self, ok: bool, status: u16, data: Value) -> Value {
        match (ok, &self.on_success, &self.on_error) {
            (true, Some(handler), _) => handler(data),
            (false, _, Some(handler)) => handler(status, data),
            _ => data,
        }
    }
}

mod method_serde {
    use super::*;

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_bytes(raw.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Request body as supplied by the caller.
///
/// Structured JSON values (objects, arrays, `null`) are encoded as JSON text
/// and sent with `Content-Type: application/json`. JSON strings, numbers and
/// booleans, and raw text or bytes, are sent as-is without a content type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Serializes `value` into a [`RequestBody::Json`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, RequestBody::Json(Value::Object(_) | Value::Array(_) | Value::Null))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Omit,
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    Follow,
    Error,
    Manual,
}

/// Transport-specific knobs passed through to the [`Transport`](super::Transport).
///
/// Transports honour what they can and ignore the rest.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestExtra {
    #[serde(default)]
    pub cache: Option<CacheMode>,
    #[serde(default)]
    pub credentials: Option<CredentialsMode>,
    #[serde(default)]
    pub redirect: Option<RedirectMode>,
    #[serde(default)]
    pub keepalive: Option<bool>,
    #[serde(default)]
    pub referrer: Option<String>,
    /// Per-request timeout enforced by the transport.
    #[serde(default, with = "optional_secs")]
    pub timeout: Option<Duration>,
    /// Cooperative abort signal.
    #[serde(skip)]
    pub signal: Option<CancellationToken>,
}

impl RequestExtra {
    /// Field-wise merge where fields set on `self` win over `defaults`.
    pub fn merged_over(self, defaults: &RequestExtra) -> RequestExtra {
        RequestExtra {
            cache: self.cache.or(defaults.cache),
            credentials: self.credentials.or(defaults.credentials),
            redirect: self.redirect.or(defaults.redirect),
            keepalive: self.keepalive.or(defaults.keepalive),
            referrer: self.referrer.or_else(|| defaults.referrer.clone()),
            timeout: self.timeout.or(defaults.timeout),
            signal: self.signal.or_else(|| defaults.signal.clone()),
        }
    }
}

mod optional_secs {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Per-call options of a request.
///
/// Query and path values are stringified when inserted. `path` stays `None`
/// until a path variable is set, which lets the builder tell "no path map"
/// apart from "path map without this name".
///
/// # Example
///
/// ```rust
/// use strict_fetch::http::RequestOptions;
///
/// let options = RequestOptions::new()
///     .path("id", 42)
///     .query("page", 1)
///     .header("Accept", "application/json")
///     .throws_on_error(true);
/// assert_eq!(options.path_params().and_then(|p| p.get("id")).map(String::as_str), Some("42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) query: BTreeMap<String, String>,
    pub(crate) path: Option<BTreeMap<String, String>>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) extra: RequestExtra,
    pub(crate) throws_on_error: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    pub fn path(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.to_string());
        self
    }

    /// Supplies an explicit, possibly empty, path map.
    pub fn path_map(mut self, values: BTreeMap<String, String>) -> Self {
        self.path = Some(values);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as a structured JSON body.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        Ok(self.body(RequestBody::json(value)?))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn extra(mut self, extra: RequestExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.extra.signal = Some(token);
        self
    }

    pub fn throws_on_error(mut self, throws: bool) -> Self {
        self.throws_on_error = Some(throws);
        self
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn path_params(&self) -> Option<&BTreeMap<String, String>> {
        self.path.as_ref()
    }

    pub fn request_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn request_extra(&self) -> &RequestExtra {
        &self.extra
    }

    pub fn throws(&self) -> bool {
        self.throws_on_error.unwrap_or(false)
    }

    /// Shallow merge of call-time options over `defaults`.
    ///
    /// Map fields (query, path, headers) and `extra` are merged field-wise
    /// with call-time entries winning; body and `throws_on_error` fall back
    /// to the defaults only when unset.
    pub fn merged_over(self, defaults: &RequestOptions) -> RequestOptions {
        let mut query = defaults.query.clone();
        query.extend(self.query);

        let path = match (defaults.path.clone(), self.path) {
            (Some(mut base), Some(call)) => {
                base.extend(call);
                Some(base)
            },
            (base, call) => call.or(base),
        };

        let mut headers = defaults.headers.clone();
        headers.extend(self.headers);

        RequestOptions {
            query,
            path,
            body: self.body.or_else(|| defaults.body.clone()),
            headers,
            extra: self.extra.merged_over(&defaults.extra),
            throws_on_error: self.throws_on_error.or(defaults.throws_on_error),
        }
    }
}

/// Normalized result of one request.
///
/// `ok` is derived from `status_code` when the envelope is built and cannot
/// be set independently. A status code of `0` means the request never got a
/// usable response; `status_text` then describes the failure. Deserializing
/// ignores any incoming `ok` and recomputes it from `statusCode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EnvelopeFields")]
pub struct ResponseEnvelope {
    ok: bool,
    status_code: u16,
    status_text: String,
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeFields {
    status_code: u16,
    #[serde(default)]
    status_text: String,
    #[serde(default)]
    data: Value,
}

impl From<EnvelopeFields> for ResponseEnvelope {
    fn from(fields: EnvelopeFields) -> Self {
        Self::from_status(fields.status_code, fields.status_text, fields.data)
    }
}

impl ResponseEnvelope {
    pub(crate) fn from_status(status_code: u16, status_text: impl Into<String>, data: Value) -> Self {
        Self {
            ok: (200..300).contains(&status_code),
            status_code,
            status_text: status_text.into(),
            data,
        }
    }

    pub(crate) fn failed(status_text: impl Into<String>) -> Self {
        Self::from_status(0, status_text, Value::Null)
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Parsed JSON body, `Null` when parsing failed or there was no body.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// Deserializes the body into the endpoint's success or error shape.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_ok_follows_status() {
        assert!(ResponseEnvelope::from_status(200, "OK", Value::Null).ok());
        assert!(ResponseEnvelope::from_status(299, "", Value::Null).ok());
        assert!(!ResponseEnvelope::from_status(300, "Multiple Choices", Value::Null).ok());
        assert!(!ResponseEnvelope::from_status(404, "Not Found", Value::Null).ok());

        let failed = ResponseEnvelope::failed("Request failed: refused");
        assert!(!failed.ok());
        assert_eq!(failed.status_code(), 0);
        assert_eq!(failed.data(), &Value::Null);
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let envelope = ResponseEnvelope::from_status(201, "Created", json!({"id": 7}));
        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            encoded,
            json!({"ok": true, "statusCode": 201, "statusText": "Created", "data": {"id": 7}})
        );
    }

    #[test]
    fn test_deserialized_envelope_recomputes_ok() {
        let envelope: ResponseEnvelope =
            serde_json::from_value(json!({"ok": true, "statusCode": 500, "statusText": "x", "data": null})).unwrap();
        assert!(!envelope.ok());
        assert_eq!(envelope.status_code(), 500);

        let envelope: ResponseEnvelope = serde_json::from_value(json!({"ok": false, "statusCode": 204})).unwrap();
        assert!(envelope.ok());
        assert_eq!(envelope.status_text(), "");
        assert_eq!(envelope.data(), &Value::Null);

        let original = ResponseEnvelope::from_status(201, "Created", json!({"id": 7}));
        let decoded: ResponseEnvelope = serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_data_as_typed_shape() {
        #[derive(Deserialize)]
        struct Item {
            id: u32,
        }

        let envelope = ResponseEnvelope::from_status(200, "OK", json!({"id": 7}));
        let item: Item = envelope.data_as().unwrap();
        assert_eq!(item.id, 7);
    }

    #[test]
    fn test_structured_body_detection() {
        assert!(RequestBody::Json(json!({"a": 1})).is_structured());
        assert!(RequestBody::Json(json!([1, 2])).is_structured());
        assert!(RequestBody::Json(Value::Null).is_structured());
        assert!(!RequestBody::Json(json!("text")).is_structured());
        assert!(!RequestBody::Json(json!(12)).is_structured());
        assert!(!RequestBody::from("raw").is_structured());
    }

    #[test]
    fn test_merge_call_time_wins() {
        let defaults = RequestOptions::new()
            .query("page", 1)
            .query("per_page", 10)
            .header("Authorization", "Bearer a")
            .header("Accept", "application/json")
            .throws_on_error(true);
        let call = RequestOptions::new().query("page", 3).header("Authorization", "Bearer b");

        let merged = call.merged_over(&defaults);
        assert_eq!(merged.query_params().get("page").map(String::as_str), Some("3"));
        assert_eq!(merged.query_params().get("per_page").map(String::as_str), Some("10"));
        assert_eq!(merged.headers().get("Authorization").map(String::as_str), Some("Bearer b"));
        assert_eq!(merged.headers().get("Accept").map(String::as_str), Some("application/json"));
        assert!(merged.throws());
        assert!(merged.path_params().is_none());
    }

    #[test]
    fn test_merge_extra_field_wise() {
        let defaults = RequestExtra {
            cache: Some(CacheMode::NoStore),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let call = RequestExtra {
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };

        let merged = call.merged_over(&defaults);
        assert_eq!(merged.cache, Some(CacheMode::NoStore));
        assert_eq!(merged.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_endpoint_deserializes_custom_method() {
        let endpoint: Endpoint = serde_json::from_value(json!({"method": "PURGE", "endpoint": "/cache"})).unwrap();
        assert_eq!(endpoint.method().as_str(), "PURGE");

        let endpoint: Endpoint = serde_json::from_value(json!({"endpoint": "/cache"})).unwrap();
        assert_eq!(endpoint.method(), &Method::GET);
    }

    #[test]
    fn test_handlers_only_touch_matching_outcome() {
        let endpoint = Endpoint::get("/x")
            .on_success(|data| json!({"wrapped": data}))
            .on_error(|status, _| json!({"status": status}));

        let handlers = endpoint.handlers();
        assert_eq!(handlers.apply(true, 200, json!(1)), json!({"wrapped": 1}));
        assert_eq!(handlers.apply(false, 404, json!(1)), json!({"status": 404}));
        assert_eq!(EndpointHandlers::default().apply(true, 200, json!(1)), json!(1));
    }
}
