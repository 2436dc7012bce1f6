//! Turns an [`Endpoint`] and call-time [`RequestOptions`] into a [`TransportRequest`].
//!
//! Building is a pure transformation: URL resolution, path variable
//! substitution, query merging and body encoding. Any structural problem is
//! reported here, before the transport is ever touched.

use std::collections::BTreeMap;

use log::trace;
use url::Url;

use super::{
    error::{ApiError, ParamsError},
    transport::{TransportBody, TransportRequest},
    types::{Endpoint, PATH_VARIABLE_MARKER, RequestBody, RequestOptions},
};

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// Builds the request for one call of `endpoint`.
///
/// # Errors
///
/// - [`ApiError::Url`] if the endpoint, resolved against `base_url`, is not a
///   valid URL.
/// - [`ApiError::Params`] if the path contains `:name` variables and either
///   no path map was supplied ([`ParamsError::Missing`]) or some variables
///   were left unresolved ([`ParamsError::Unresolved`]).
pub fn build_request(
    endpoint: &Endpoint,
    options: &RequestOptions,
    base_url: Option<&str>,
) -> Result<TransportRequest, ApiError> {
    let mut url = resolve_url(endpoint.endpoint(), base_url)?;

    let names = path_variables(&url);
    if !names.is_empty() {
        let values = options.path_params().ok_or(ParamsError::Missing)?;
        substitute_path(&mut url, values);

        let unresolved = path_variables(&url);
        if !unresolved.is_empty() {
            return Err(ParamsError::Unresolved(unresolved).into());
        }
    }

    apply_query(&mut url, options.query_params());

    let (body, headers) = encode_body(options.request_body(), options.headers());

    trace!(url:% = url, method:% = endpoint.method(); "Built request");

    Ok(TransportRequest {
        url,
        method: endpoint.method().clone(),
        headers,
        body,
        extra: options.request_extra().clone(),
    })
}

/// Resolves `endpoint` against `base_url` the way a browser resolves a
/// relative reference: absolute endpoints ignore the base.
pub(crate) fn resolve_url(endpoint: &str, base_url: Option<&str>) -> Result<Url, ApiError> {
    let url_error = || ApiError::Url {
        endpoint: endpoint.to_string(),
        base: base_url.map(str::to_string),
    };

    match base_url {
        Some(base) => Url::parse(base)
            .and_then(|base| base.join(endpoint))
            .map_err(|_| url_error()),
        None => Url::parse(endpoint).map_err(|_| url_error()),
    }
}

/// Names of the `:name` segments of the URL path, in path order.
pub(crate) fn path_variables(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter_map(|segment| segment.strip_prefix(PATH_VARIABLE_MARKER))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn substitute_path(url: &mut Url, values: &BTreeMap<String, String>) {
    let path = url
        .path()
        .split('/')
        .map(|segment| {
            segment
                .strip_prefix(PATH_VARIABLE_MARKER)
                .and_then(|name| values.get(name))
                .map_or(segment, String::as_str)
        })
        .collect::<Vec<_>>()
        .join("/");

    url.set_path(&path);
}

/// Sets every query entry, replacing any existing entry of the same name.
pub(crate) fn apply_query(url: &mut Url, query: &BTreeMap<String, String>) {
    if query.is_empty() {
        return;
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (name, value) in query {
        match pairs.iter().position(|(key, _)| key == name) {
            Some(first) => {
                pairs[first].1 = value.clone();
                let mut index = 0;
                pairs.retain(|(key, _)| {
                    let keep = index <= first || key != name;
                    index += 1;
                    keep
                });
            },
            None => pairs.push((name.clone(), value.clone())),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Encodes the body and returns it with the final header set.
///
/// A JSON content type is a default for structured bodies: it is only added
/// when the caller did not set `Content-Type` themselves.
pub(crate) fn encode_body(
    body: Option<&RequestBody>,
    headers: &BTreeMap<String, String>,
) -> (Option<TransportBody>, BTreeMap<String, String>) {
    let mut headers = headers.clone();

    let body = body.map(|body| match body {
        RequestBody::Json(value) if body.is_structured() => {
            let caller_set = headers.keys().any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE));
            if !caller_set {
                headers.insert(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string());
            }
            TransportBody::Text(value.to_string())
        },
        RequestBody::Json(serde_json::Value::String(text)) => TransportBody::Text(text.clone()),
        RequestBody::Json(value) => TransportBody::Text(value.to_string()),
        RequestBody::Text(text) => TransportBody::Text(text.clone()),
        RequestBody::Bytes(bytes) => TransportBody::Bytes(bytes.clone()),
    });

    (body, headers)
}
