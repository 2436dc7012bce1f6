//! Typed HTTP endpoint client.
//!
//! - [`http`]: endpoint descriptors, the request pipeline and the
//!   [`Transport`](http::Transport) seam
//! - [`polling`]: long-polling sessions with a timeout budget
//! - [`sequence`]: latest-wins sequencing of concurrent calls
//! - [`config`]: file and environment configuration

pub mod cli;
pub mod config;
pub mod http;
pub mod log;
pub mod polling;
pub mod sequence;

pub use crate::http::{
    ApiError, ApiGroup, ApiRepo, Endpoint, FetchClient, ParamsError, RequestOptions, ResponseEnvelope, Transport,
    fetch_api, group_api,
};
pub use crate::polling::{LongPolling, LongPollingOptions};
pub use crate::sequence::Sequence;
