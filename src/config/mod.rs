//! Client configuration.
//!
//! Loaded from a TOML file with environment overrides, see
//! [`load_configuration`].

mod loader;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

pub use loader::{ENV_PREFIX, get_default_config, load_configuration, write_config_to};

use crate::{
    http::{ApiGroup, ApiRepo, FetchClient, RequestOptions, ReqwestTransport, Transport},
    polling::LongPollingOptions,
};

/// Default transport-level request timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL relative endpoints are resolved against.
    pub base_url: Option<String>,
    /// Headers sent with every request unless a call overrides them.
    pub headers: BTreeMap<String, String>,
    /// Transport-level request timeout in seconds.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub polling: LongPollingOptions,
    pub endpoints: ApiRepo,
}

impl ClientConfig {
    /// Default options every request starts from.
    pub fn default_options(&self) -> RequestOptions {
        self.headers
            .iter()
            .fold(RequestOptions::new(), |options, (name, value)| options.header(name, value))
    }

    pub fn transport(&self) -> anyhow::Result<ReqwestTransport> {
        let timeout = self.timeout_secs.map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);
        ReqwestTransport::with_config(timeout, self.user_agent.as_deref())
    }

    /// A client over `transport` with the configured base URL and headers.
    pub fn client(&self, transport: Arc<dyn Transport>) -> FetchClient {
        let client = FetchClient::new(transport).with_defaults(self.default_options());
        match &self.base_url {
            Some(base_url) => client.with_base_url(base_url),
            None => client,
        }
    }

    /// The configured endpoint repository bound to `client`.
    pub fn endpoints(&self, client: &FetchClient) -> ApiGroup {
        client.group(&self.endpoints)
    }
}
