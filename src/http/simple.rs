//! Simple requests to absolute URLs.
//!
//! These skip endpoint descriptors and path templates. The body is read once
//! and kept as text; [`SimpleResponse::json`] parses it on demand.

use std::future::Future;

use futures::future::join_all;
use log::warn;
use reqwest::Method;
use serde::de::DeserializeOwned;

use super::{
    builder::{apply_query, encode_body, resolve_url},
    error::ApiError,
    fetch_api::FetchClient,
    transport::TransportRequest,
    types::RequestOptions,
};

/// Outcome of a simple request.
#[derive(Debug, Clone)]
pub struct SimpleResponse {
    ok: bool,
    status_code: u16,
    status_text: String,
    body: Option<String>,
    throws_on_error: bool,
}

impl SimpleResponse {
    fn unreachable(status_text: String) -> Self {
        Self {
            ok: false,
            status_code: 0,
            status_text,
            body: None,
            throws_on_error: false,
        }
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

    /// Raw body text, `None` if the request never got a response.
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Parses the body as JSON.
    ///
    /// Returns `Ok(None)` when there is no body or it does not parse, unless
    /// the request was made with `throws_on_error`, in which case a parse
    /// failure is an [`ApiError::Response`] with code `0`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, ApiError> {
        let Some(body) = &self.body else {
            return Ok(None);
        };

        match serde_json::from_str(body) {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.throws_on_error => Err(ApiError::response(0, format!("JSON parsing failed: {e}"))),
            Err(e) => {
                warn!(error:% = e; "JSON parsing failed");
                Ok(None)
            },
        }
    }
}

impl FetchClient {
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        self.send(Method::GET, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        self.send(Method::POST, url, options).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        self.send(Method::PUT, url, options).await
    }

    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        self.send(Method::PATCH, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        self.send(Method::DELETE, url, options).await
    }

    /// Sends `method` to `url`, resolved against the client's base URL.
    ///
    /// Path maps in `options` are ignored; query, headers, body and extra
    /// options apply as for endpoint requests.
    pub async fn send(&self, method: Method, url: &str, options: RequestOptions) -> Result<SimpleResponse, ApiError> {
        let options = options.merged_over(self.defaults());
        let throws_on_error = options.throws();

        let mut resolved = resolve_url(url, self.base_url())?;
        apply_query(&mut resolved, options.query_params());
        let (body, headers) = encode_body(options.request_body(), options.headers());

        let request = TransportRequest {
            url: resolved,
            method,
            headers,
            body,
            extra: options.request_extra().clone(),
        };

        let response = match self.transport().invoke(request).await {
            Ok(response) => response,
            Err(e) => {
                let text = format!("Request failed: {e}");
                if throws_on_error {
                    return Err(ApiError::response(0, text));
                }
                warn!(reason:% = text; "Simple request failed");
                return Ok(SimpleResponse::unreachable(text));
            },
        };

        if !response.ok() && throws_on_error {
            return Err(ApiError::response(response.status, response.status_text));
        }

        let ok = response.ok();
        let status_code = response.status;
        let status_text = response.status_text;
        let body = match response.body.text().await {
            Ok(text) => Some(text),
            Err(e) if throws_on_error => return Err(ApiError::response(0, format!("Request failed: {e}"))),
            Err(e) => {
                warn!(error:% = e; "Failed to read response body");
                None
            },
        };

        Ok(SimpleResponse {
            ok,
            status_code,
            status_text,
            body,
            throws_on_error,
        })
    }
}

/// Awaits a batch of requests concurrently; results keep the input order.
pub async fn parallel<I, F, T>(requests: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    join_all(requests).await
}
