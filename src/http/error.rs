//! Error types for endpoint requests.
//!
//! This module defines the [`ApiError`] enum, the stable error surface of the
//! request pipeline, and the [`TransportError`] that a [`Transport`] reports
//! when a request never produced an HTTP response.
//!
//! [`Transport`]: super::Transport

use thiserror::Error;

/// Errors surfaced by [`fetch_api`](super::fetch_api) and the wrappers built on it.
///
/// Structural errors ([`Url`](ApiError::Url), [`Params`](ApiError::Params),
/// [`UnknownEndpoint`](ApiError::UnknownEndpoint)) are always returned, no
/// matter how the request was configured. [`Response`](ApiError::Response) is
/// only produced when the caller opted into `throws_on_error`; otherwise the
/// same information is folded into a [`ResponseEnvelope`](super::ResponseEnvelope)
/// with a status code of `0`.
///
/// # Example
///
/// ```rust
/// use strict_fetch::http::{ApiError, ParamsError};
///
/// fn describe(err: &ApiError) -> &'static str {
///     match err {
///         ApiError::Url { .. } => "bad url",
///         ApiError::Params(ParamsError::Missing) => "no path params given",
///         ApiError::Params(ParamsError::Unresolved(_)) => "some path params missing",
///         ApiError::Response { .. } => "request failed",
///         ApiError::UnknownEndpoint(_) => "no such endpoint",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint, resolved against the base URL, is not a valid URL.
    #[error("{}", url_error_message(.endpoint, .base.as_deref()))]
    Url {
        /// The raw endpoint template of the descriptor.
        endpoint: String,
        /// The base URL the endpoint was resolved against, if any.
        base: Option<String>,
    },

    /// Path variables of the endpoint could not be resolved.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// The request failed and the caller asked for failures to be raised.
    ///
    /// `code` is the HTTP status, or `0` when the transport never produced a
    /// response or the body could not be parsed.
    #[error("Request error [{code}]: {message}")]
    Response {
        /// HTTP status code, `0` for transport and parse failures.
        code: u16,
        /// Status text or synthesized failure description.
        message: String,
    },

    /// A grouped repository has no endpoint under the given name.
    #[error("No endpoint named \"{0}\" in the repository")]
    UnknownEndpoint(String),
}

impl ApiError {
    pub(crate) fn response(code: u16, message: impl Into<String>) -> Self {
        ApiError::Response {
            code,
            message: message.into(),
        }
    }
}

fn url_error_message(endpoint: &str, base: Option<&str>) -> String {
    match base {
        Some(base) => format!("Cannot construct url with base \"{base}\" and path \"{endpoint}\""),
        None => format!("Cannot construct url \"{endpoint}\""),
    }
}

/// Unresolved path variables in an endpoint template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// The endpoint has variables but no `path` map was supplied at all.
    #[error("The endpoint contains variables, but the params field is missing in the init")]
    Missing,

    /// These variables were still present after substitution.
    #[error("The following fields is missing ({}): {}", .0.len(), quoted(.0))]
    Unresolved(Vec<String>),
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A request that never produced a usable HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or connection failure (refused, DNS, TLS, timeout).
    #[error("{0}")]
    Network(String),

    /// The request was cancelled through its abort signal.
    #[error("The operation was aborted")]
    Aborted,

    /// The response head arrived but reading the body failed.
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}
