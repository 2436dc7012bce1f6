//! Grouped endpoint repositories.
//!
//! An [`ApiRepo`] declares a tree of endpoints. [`group_api`] binds it to a
//! transport, a shared base URL and shared default options, producing an
//! [`ApiGroup`] with one [`ApiCallable`] per leaf.
//!
//! Repositories deserialize from configuration:
//!
//! ```toml
//! [endpoints.vehicles.new]
//! method = "POST"
//! endpoint = "/new"
//!
//! [endpoints.vehicles.edit]
//! method = "POST"
//! endpoint = "/edit/:id"
//! ```

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{
    error::ApiError,
    fetch_api::FetchClient,
    transport::Transport,
    types::{Endpoint, RequestOptions, ResponseEnvelope},
};

const NAME_SEPARATOR: char = '.';

/// One node of a repository: an endpoint or a nested repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RepoEntry {
    Endpoint(Endpoint),
    Group(ApiRepo),
}

/// A tree of named endpoint declarations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ApiRepo(BTreeMap<String, RepoEntry>);

impl ApiRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, name: impl Into<String>, endpoint: Endpoint) -> Self {
        self.0.insert(name.into(), RepoEntry::Endpoint(endpoint));
        self
    }

    pub fn group(mut self, name: impl Into<String>, repo: ApiRepo) -> Self {
        self.0.insert(name.into(), RepoEntry::Group(repo));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RepoEntry)> {
        self.0.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

/// A bound endpoint: calling it issues one request.
#[derive(Debug, Clone)]
pub struct ApiCallable {
    client: FetchClient,
    endpoint: Endpoint,
}

impl ApiCallable {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Issues the request; call-time options override the group defaults.
    pub async fn call(&self, options: RequestOptions) -> Result<ResponseEnvelope, ApiError> {
        self.client.fetch(&self.endpoint, options).await
    }
}

#[derive(Debug, Clone)]
enum GroupEntry {
    Callable(ApiCallable),
    Group(ApiGroup),
}

/// The callable counterpart of an [`ApiRepo`].
#[derive(Debug, Clone, Default)]
pub struct ApiGroup {
    entries: BTreeMap<String, GroupEntry>,
}

impl ApiGroup {
    /// Looks up a leaf by dotted name, e.g. `"vehicles.edit"`.
    pub fn get(&self, name: &str) -> Option<&ApiCallable> {
        match self.lookup(name)? {
            GroupEntry::Callable(callable) => Some(callable),
            GroupEntry::Group(_) => None,
        }
    }

    /// Looks up a nested group by dotted name.
    pub fn group(&self, name: &str) -> Option<&ApiGroup> {
        match self.lookup(name)? {
            GroupEntry::Group(group) => Some(group),
            GroupEntry::Callable(_) => None,
        }
    }

    /// Calls the leaf named `name`.
    pub async fn call(&self, name: &str, options: RequestOptions) -> Result<ResponseEnvelope, ApiError> {
        let callable = self
            .get(name)
            .ok_or_else(|| ApiError::UnknownEndpoint(name.to_string()))?;
        callable.call(options).await
    }

    /// Dotted names of every leaf, in lexical order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names("", &mut names);
        names
    }

    fn collect_names(&self, prefix: &str, names: &mut Vec<String>) {
        for (name, entry) in &self.entries {
            let full = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}{NAME_SEPARATOR}{name}")
            };
            match entry {
                GroupEntry::Callable(_) => names.push(full),
                GroupEntry::Group(group) => group.collect_names(&full, names),
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&GroupEntry> {
        let (head, rest) = match name.split_once(NAME_SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };

        match (self.entries.get(head)?, rest) {
            (entry, None) => Some(entry),
            (GroupEntry::Group(group), Some(rest)) => group.lookup(rest),
            (GroupEntry::Callable(_), Some(_)) => None,
        }
    }
}

/// Binds every endpoint of `repo` to `transport`, `base_url` and `defaults`.
pub fn group_api(
    transport: Arc<dyn Transport>,
    base_url: impl Into<String>,
    repo: &ApiRepo,
    defaults: RequestOptions,
) -> ApiGroup {
    let client = FetchClient::new(transport)
        .with_base_url(base_url)
        .with_defaults(defaults);
    bind(&client, repo)
}

impl FetchClient {
    /// Binds `repo` to this client's transport, base URL and defaults.
    pub fn group(&self, repo: &ApiRepo) -> ApiGroup {
        bind(self, repo)
    }
}

fn bind(client: &FetchClient, repo: &ApiRepo) -> ApiGroup {
    let entries = repo
        .entries()
        .map(|(name, entry)| {
            let bound = match entry {
                RepoEntry::Endpoint(endpoint) => GroupEntry::Callable(ApiCallable {
                    client: client.clone(),
                    endpoint: endpoint.clone(),
                }),
                RepoEntry::Group(nested) => GroupEntry::Group(bind(client, nested)),
            };
            (name.to_string(), bound)
        })
        .collect();

    ApiGroup { entries }
}
