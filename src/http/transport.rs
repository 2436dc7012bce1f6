//! The network collaborator behind every request.
//!
//! The request pipeline never talks to the network directly. It hands a fully
//! built [`TransportRequest`] to a [`Transport`] and gets back a
//! [`TransportResponse`] whose body can be read exactly once.

use std::{collections::BTreeMap, fmt};

use futures::future::BoxFuture;
use reqwest::Method;
use url::Url;

use super::{error::TransportError, types::RequestExtra};

/// An async HTTP transport.
///
/// Implementations handle the mechanics of making requests (TLS, redirects,
/// connection reuse) while this trait exposes only what the client needs.
/// It is object safe so that callers can inject it as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    fn invoke(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl TransportBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TransportBody::Text(text) => text.as_bytes(),
            TransportBody::Bytes(bytes) => bytes,
        }
    }
}

/// A request ready to be put on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<TransportBody>,
    pub extra: RequestExtra,
}

impl TransportRequest {
    /// Looks up a request header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response head plus a one-shot body reader.
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .finish_non_exhaustive()
    }
}

/// The full response body, readable once.
pub struct ResponseBody {
    reader: BoxFuture<'static, Result<String, TransportError>>,
}

impl ResponseBody {
    pub fn new<F>(reader: F) -> Self
    where
        F: Future<Output = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
        }
    }

    /// A body that is already in memory.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(async move { Ok(text) })
    }

    /// Reads the whole body as text, consuming the reader.
    pub async fn text(self) -> Result<String, TransportError> {
        self.reader.await
    }
}
