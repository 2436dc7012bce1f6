//! Latest-wins request sequencing.
//!
//! A [`Sequence`] issues requests against one endpoint and keeps only the
//! response of the most recently issued call that succeeded. Calls may
//! resolve in any order; a slow, older call can never overwrite a newer one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::http::{ApiError, Endpoint, FetchClient, RequestOptions, ResponseEnvelope};

/// Sequenced calls of one endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use strict_fetch::http::{Endpoint, FetchClient, ReqwestTransport};
/// use strict_fetch::sequence::Sequence;
///
/// # async fn example() -> Result<(), anyhow::Error> {
/// let client = FetchClient::new(Arc::new(ReqwestTransport::new()?));
/// let search = Sequence::new(client, Endpoint::get("https://api.example.com/search"));
///
/// search.call(None).await?;
/// if let Some(latest) = search.read() {
///     println!("{}", latest.data());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Sequence {
    client: FetchClient,
    endpoint: Endpoint,
    default_options: Option<RequestOptions>,
    state: Mutex<SequenceState>,
}

#[derive(Debug, Default)]
struct SequenceState {
    issued: u64,
    last_accepted_id: u64,
    last_accepted: Option<ResponseEnvelope>,
}

impl Sequence {
    pub fn new(client: FetchClient, endpoint: Endpoint) -> Self {
        Self {
            client,
            endpoint,
            default_options: None,
            state: Mutex::new(SequenceState::default()),
        }
    }

    /// Options used by calls that do not supply their own.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.default_options = Some(options);
        self
    }

    /// Issues one request with `options`, or the sequence's default options.
    ///
    /// The call's id is taken before the request is sent. Its response is
    /// stored only if it is `ok` and no later-issued call has been stored
    /// already; otherwise it is dropped and the call still succeeds.
    ///
    /// # Errors
    ///
    /// Errors of the request itself ([`ApiError`]) are returned unchanged.
    pub async fn call(&self, options: Option<RequestOptions>) -> Result<(), ApiError> {
        let id = {
            let mut state = self.state();
            state.issued += 1;
            state.issued
        };

        let options = options.or_else(|| self.default_options.clone()).unwrap_or_default();
        let envelope = self.client.fetch(&self.endpoint, options).await?;

        let mut state = self.state();
        if envelope.ok() && id > state.last_accepted_id {
            state.last_accepted_id = id;
            state.last_accepted = Some(envelope);
        } else {
            debug!(
                id = id,
                last_accepted = state.last_accepted_id,
                ok = envelope.ok();
                "Discarding sequenced response"
            );
        }
        Ok(())
    }

    /// The last accepted response, if any call has been accepted yet.
    pub fn read(&self) -> Option<ResponseEnvelope> {
        self.state().last_accepted.clone()
    }

    fn state(&self) -> MutexGuard<'_, SequenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
