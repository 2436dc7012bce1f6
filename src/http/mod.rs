//! Typed endpoint client.
//!
//! Requests are declared as [`Endpoint`]s and issued through a [`Transport`].
//! Every call goes through the same pipeline:
//!
//! 1. [`build_request`] resolves the URL, substitutes `:name` path variables,
//!    merges query entries and encodes the body.
//! 2. The transport is invoked exactly once. There are no retries here.
//! 3. The response is folded into a [`ResponseEnvelope`].
//!
//! # Components
//!
//! - [`fetch_api`] and [`FetchClient`] for single requests
//! - [`group_api`] and [`ApiGroup`] for repositories of endpoints sharing a
//!   base URL and default options
//! - [`FetchClient::get`] and friends for plain requests to absolute URLs
//! - [`ReqwestTransport`], the production [`Transport`]
//!
//! # Error Handling
//!
//! Structural problems (bad URL, unresolved path variables) are always
//! returned as [`ApiError`]. Network failures, unparsable bodies and non-2xx
//! statuses end up in the envelope unless the call sets `throws_on_error`,
//! in which case they are returned as [`ApiError::Response`].

mod builder;
mod error;
mod fetch_api;
mod group;
mod normalizer;
mod reqwest_transport;
mod simple;
mod transport;
mod types;

pub use builder::build_request;
pub use error::{ApiError, ParamsError, TransportError};
pub use fetch_api::{FetchClient, fetch_api};
pub use group::{ApiCallable, ApiGroup, ApiRepo, RepoEntry, group_api};
pub use reqwest_transport::ReqwestTransport;
pub use simple::{SimpleResponse, parallel};
pub use transport::{ResponseBody, Transport, TransportBody, TransportRequest, TransportResponse};
pub use types::{
    CacheMode, CredentialsMode, Endpoint, PATH_VARIABLE_MARKER, RedirectMode, RequestBody, RequestExtra,
    RequestOptions, ResponseEnvelope,
};
