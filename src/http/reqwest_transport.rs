use std::time::{Duration, Instant};

use futures::{FutureExt, future::BoxFuture};
use log::{debug, trace};
use tokio::sync::RwLock;

use super::{
    error::TransportError,
    transport::{ResponseBody, Transport, TransportBody, TransportRequest, TransportResponse},
    types::CacheMode,
};
use crate::log::mask_header;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("strict-fetch/", env!("CARGO_PKG_VERSION"));

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// Requests are sent once; there is no retry layer. The round-trip time of
/// the most recent response head is kept for monitoring.
pub struct ReqwestTransport {
    client: reqwest::Client,
    last_latency: RwLock<Option<(Duration, Instant)>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::with_config(Duration::from_secs(DEFAULT_TIMEOUT_SECS), None)
    }

    pub fn with_config(timeout: Duration, user_agent: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            last_latency: RwLock::new(None),
        }
    }

    async fn update_latency(&self, duration: Duration) {
        *self.last_latency.write().await = Some((duration, Instant::now()));
    }

    pub async fn get_latency(&self) -> Option<Duration> {
        self.last_latency.read().await.map(|(d, _)| d)
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let start = Instant::now();
        let TransportRequest {
            url,
            method,
            headers,
            body,
            extra,
        } = request;

        debug!(method:% = method, url:% = url; "Sending request");

        let mut req = self.client.request(method, url);
        for (name, value) in &headers {
            trace!(header:% = name, value:% = mask_header(name, value); "Request header");
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(directive) = extra.cache.and_then(cache_control) {
            let caller_set = headers.keys().any(|name| name.eq_ignore_ascii_case("cache-control"));
            if !caller_set {
                req = req.header(reqwest::header::CACHE_CONTROL, directive);
            }
        }
        if let Some(referrer) = &extra.referrer {
            req = req.header(reqwest::header::REFERER, referrer.as_str());
        }
        if let Some(timeout) = extra.timeout {
            req = req.timeout(timeout);
        }
        if extra.credentials.is_some() || extra.redirect.is_some() || extra.keepalive.is_some() {
            trace!("Ignoring browser-only request options");
        }

        req = match body {
            Some(TransportBody::Text(text)) => req.body(text),
            Some(TransportBody::Bytes(bytes)) => req.body(bytes),
            None => req,
        };

        let resp = match extra.signal {
            Some(signal) => {
                tokio::select! {
                    resp = req.send() => resp?,
                    _ = signal.cancelled() => return Err(TransportError::Aborted),
                }
            },
            None => req.send().await?,
        };

        self.update_latency(start.elapsed()).await;

        let status = resp.status();
        debug!(status = status.as_u16(); "Received response");

        let body = ResponseBody::new(async move { resp.text().await.map_err(|e| TransportError::Body(e.to_string())) });

        Ok(TransportResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
        ))
    }
}

fn cache_control(mode: CacheMode) -> Option<&'static str> {
    match mode {
        CacheMode::NoStore => Some("no-store"),
        CacheMode::NoCache | CacheMode::Reload => Some("no-cache"),
        CacheMode::Default | CacheMode::ForceCache | CacheMode::OnlyIfCached => None,
    }
}

impl Transport for ReqwestTransport {
    fn invoke(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        self.send(request).boxed()
    }
}
