//! The one-shot request operation.
//!
//! [`fetch_api`] composes the builder, one transport invocation and the
//! normalizer. [`FetchClient`] bundles a transport with a base URL and default
//! options so that the long-polling, sequencing and grouped wrappers share one
//! way of issuing requests.

use std::{fmt, sync::Arc};

use log::debug;

use super::{
    builder::build_request,
    error::ApiError,
    normalizer::normalize,
    transport::Transport,
    types::{Endpoint, RequestOptions, ResponseEnvelope},
};

/// Issues one request against `endpoint`.
///
/// The request is built first; URL and path-parameter errors are returned
/// without touching the transport. The transport is invoked at most once and
/// never retried.
///
/// # Example
///
/// ```rust,no_run
/// use strict_fetch::http::{Endpoint, ReqwestTransport, RequestOptions, fetch_api};
///
/// # async fn example() -> Result<(), anyhow::Error> {
/// let transport = ReqwestTransport::new()?;
/// let get_item = Endpoint::get("/items/:id");
///
/// let envelope = fetch_api(
///     &transport,
///     &get_item,
///     RequestOptions::new().path("id", 42).query("page", 1),
///     Some("https://api.example.com"),
/// )
/// .await?;
///
/// if envelope.ok() {
///     println!("{}", envelope.data());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch_api(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    options: RequestOptions,
    base_url: Option<&str>,
) -> Result<ResponseEnvelope, ApiError> {
    let request = build_request(endpoint, &options, base_url)?;
    debug!(method:% = request.method, url:% = request.url; "Fetching endpoint");

    let outcome = transport.invoke(request).await;
    normalize(outcome, options.throws(), endpoint.handlers()).await
}

/// A transport plus the base URL and default options requests are made with.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    base_url: Option<String>,
    defaults: RequestOptions,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: None,
            defaults: RequestOptions::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Calls `endpoint` with `options` merged over the client defaults.
    pub async fn fetch(&self, endpoint: &Endpoint, options: RequestOptions) -> Result<ResponseEnvelope, ApiError> {
        let options = options.merged_over(&self.defaults);
        fetch_api(self.transport.as_ref(), endpoint, options, self.base_url.as_deref()).await
    }
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
