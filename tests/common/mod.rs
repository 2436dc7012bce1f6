//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{FutureExt, future::BoxFuture};
use reqwest::StatusCode;
use serde_json::Value;
use strict_fetch::http::{
    FetchClient, ResponseBody, Transport, TransportError, TransportRequest, TransportResponse,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// What the transport does with one request.
pub enum Reply {
    Respond {
        status: u16,
        status_text: String,
        body: String,
    },
    Fail(TransportError),
    /// Never answers; resolves with `Aborted` once the request signal is cancelled.
    Pending,
    /// Never answers and ignores the request signal.
    Stubborn,
    /// Answers after the delay, ignoring the request signal.
    Delayed(Duration, Box<Reply>),
    /// Answers with whatever the test sends through the paired sender.
    Gate(oneshot::Receiver<Reply>),
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::text(status, body.to_string())
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Reply::Respond {
            status,
            status_text,
            body: body.into(),
        }
    }

    pub fn delayed(delay: Duration, reply: Reply) -> Self {
        Reply::Delayed(delay, Box::new(reply))
    }
}

/// A reply the test resolves later, plus the sender resolving it.
pub fn gate() -> (oneshot::Sender<Reply>, Reply) {
    let (tx, rx) = oneshot::channel();
    (tx, Reply::Gate(rx))
}

type Fallback = Box<dyn Fn() -> Reply + Send + Sync>;

/// Replies to requests in script order, then with the fallback.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Fallback>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A transport answering every request with `reply()`.
    pub fn always(reply: impl Fn() -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(Box::new(reply)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self) -> Reply {
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(fallback) => fallback(),
            None => Reply::Fail(TransportError::Network("script exhausted".into())),
        }
    }
}

impl Transport for ScriptedTransport {
    fn invoke(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let signal = request.extra.signal.clone();
        self.requests.lock().unwrap().push(request);
        resolve(self.next_reply(), signal)
    }
}

fn resolve(
    reply: Reply,
    signal: Option<CancellationToken>,
) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
    async move {
        match reply {
            Reply::Respond {
                status,
                status_text,
                body,
            } => Ok(TransportResponse::new(status, status_text, ResponseBody::from_text(body))),
            Reply::Fail(err) => Err(err),
            Reply::Pending => match signal {
                Some(signal) => {
                    signal.cancelled().await;
                    Err(TransportError::Aborted)
                },
                None => futures::future::pending().await,
            },
            Reply::Stubborn => futures::future::pending().await,
            Reply::Delayed(delay, reply) => {
                tokio::time::sleep(delay).await;
                resolve(*reply, None).await
            },
            Reply::Gate(rx) => match rx.await {
                Ok(reply) => resolve(reply, signal).await,
                Err(_) => Err(TransportError::Network("gate dropped".into())),
            },
        }
    }
    .boxed()
}

pub fn client(transport: &Arc<ScriptedTransport>) -> FetchClient {
    FetchClient::new(transport.clone())
}
