//! Folds a transport outcome into a [`ResponseEnvelope`].

use log::{debug, warn};
use serde_json::Value;

use super::{
    error::{ApiError, TransportError},
    transport::TransportResponse,
    types::{EndpointHandlers, ResponseEnvelope},
};

const REQUEST_FAILED: &str = "Request failed";
const JSON_PARSE_FAILED: &str = "JSON parse failed";

/// Normalizes the outcome of one transport invocation.
///
/// Transport failures and unparsable bodies become envelopes with a status
/// code of `0`, unless `throws_on_error` is set, in which case they are
/// returned as [`ApiError::Response`]. A non-2xx status is only an error when
/// `throws_on_error` is set. The body is read exactly once.
pub(crate) async fn normalize(
    outcome: Result<TransportResponse, TransportError>,
    throws_on_error: bool,
    handlers: &EndpointHandlers,
) -> Result<ResponseEnvelope, ApiError> {
    let response = match outcome {
        Ok(response) => response,
        Err(err) => return failure(REQUEST_FAILED, &err, throws_on_error),
    };

    let ok = response.ok();
    if !ok && throws_on_error {
        return Err(ApiError::response(response.status, response.status_text));
    }

    let TransportResponse {
        status,
        status_text,
        body,
    } = response;

    let text = match body.text().await {
        Ok(text) => text,
        Err(err) => return failure(REQUEST_FAILED, &err, throws_on_error),
    };

    let data = match parse_body(&text) {
        Ok(data) => data,
        Err(err) => return failure(JSON_PARSE_FAILED, &err, throws_on_error),
    };

    debug!(status = status, ok = ok; "Normalized response");

    let data = handlers.apply(ok, status, data);
    Ok(ResponseEnvelope::from_status(status, status_text, data))
}

/// Parses a response body; an empty body is `null`.
fn parse_body(text: &str) -> Result<Value, serde_json::Error> {
    if text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
}

fn failure(
    prefix: &str,
    cause: &dyn std::fmt::Display,
    throws_on_error: bool,
) -> Result<ResponseEnvelope, ApiError> {
    let text = format!("{prefix}: {cause}");
    warn!(reason:% = text; "Request did not produce a response");

    if throws_on_error {
        return Err(ApiError::response(0, text));
    }
    Ok(ResponseEnvelope::failed(text))
}
