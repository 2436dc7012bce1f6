use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, error, info, warn};
use tokio::{
    runtime::Handle,
    sync::{oneshot, watch},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::LongPollingOptions;
use crate::http::{ApiError, Endpoint, FetchClient, RequestOptions, ResponseEnvelope};

type StepHandler = dyn Fn(&ResponseEnvelope) -> bool + Send + Sync;

/// What a session polls: a bare URL (polled with `GET`) or a full endpoint.
#[derive(Debug, Clone)]
pub enum PollTarget {
    Url(String),
    ParsedUrl(Url),
    Endpoint(Endpoint),
}

impl PollTarget {
    fn into_endpoint(self) -> Endpoint {
        match self {
            PollTarget::Url(url) => Endpoint::get(url),
            PollTarget::ParsedUrl(url) => Endpoint::get(String::from(url)),
            PollTarget::Endpoint(endpoint) => endpoint,
        }
    }
}

impl From<&str> for PollTarget {
    fn from(url: &str) -> Self {
        PollTarget::Url(url.to_string())
    }
}

impl From<String> for PollTarget {
    fn from(url: String) -> Self {
        PollTarget::Url(url)
    }
}

impl From<Url> for PollTarget {
    fn from(url: Url) -> Self {
        PollTarget::ParsedUrl(url)
    }
}

impl From<Endpoint> for PollTarget {
    fn from(endpoint: Endpoint) -> Self {
        PollTarget::Endpoint(endpoint)
    }
}

/// A long-polling session against one endpoint.
///
/// The session is either idle or polling. While polling, each step issues one
/// request and waits at most `timeout_secs` for it:
///
/// - on a timeout the request's signal is cancelled and the timeout counted;
///   the session stops once `max_consecutive_timeouts` is reached, otherwise
///   the next step runs after `delay_millis`;
/// - on a response the timeout count is reset and the step handler decides:
///   `true` polls again after `delay_millis`, `false` stops the session.
///
/// A response that arrives after its step timed out, or after [`stop`](Self::stop),
/// is discarded. The step handler runs at most once per step.
///
/// Dropping the session stops it.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use strict_fetch::http::{FetchClient, ReqwestTransport, RequestOptions};
/// use strict_fetch::polling::{LongPolling, LongPollingOptions};
///
/// # async fn example() -> Result<(), anyhow::Error> {
/// let client = FetchClient::new(Arc::new(ReqwestTransport::new()?)).with_base_url("https://api.example.com");
///
/// let polling = LongPolling::new(
///     client,
///     "/events",
///     RequestOptions::new(),
///     LongPollingOptions::default(),
///     |envelope| {
///         println!("{}", envelope.data());
///         envelope.ok()
///     },
/// );
///
/// polling.stopped().await;
/// # Ok(())
/// # }
/// ```
pub struct LongPolling {
    shared: Arc<Shared>,
}

struct Shared {
    client: FetchClient,
    endpoint: Endpoint,
    request: RequestOptions,
    options: LongPollingOptions,
    handler: Box<StepHandler>,
    session: Mutex<Session>,
    running: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct Session {
    /// Incremented on every start; steps of older runs never touch the session.
    generation: u64,
    run: Option<CancellationToken>,
    consecutive_timeouts: u32,
}

enum StepOutcome {
    Continue,
    Stop,
    Abandoned,
}

/// Settles a poll step exactly once, either by its response or by its timeout.
#[derive(Default)]
struct PollStep {
    settled: AtomicBool,
}

impl PollStep {
    fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::SeqCst)
    }
}

impl LongPolling {
    /// Creates a session polling `target` with `request` on every step.
    ///
    /// When `options.auto_start` is set the session starts immediately, which
    /// requires a Tokio runtime.
    pub fn new<F>(
        client: FetchClient,
        target: impl Into<PollTarget>,
        request: RequestOptions,
        options: LongPollingOptions,
        handler: F,
    ) -> Self
    where
        F: Fn(&ResponseEnvelope) -> bool + Send + Sync + 'static,
    {
        let auto_start = options.auto_start;
        let (running, _) = watch::channel(false);
        let polling = Self {
            shared: Arc::new(Shared {
                client,
                endpoint: target.into().into_endpoint(),
                request,
                options,
                handler: Box::new(handler),
                session: Mutex::new(Session::default()),
                running,
            }),
        };

        if auto_start {
            polling.start();
        }
        polling
    }

    /// Moves an idle session to polling and schedules the first step.
    ///
    /// Returns `false`, logging a warning, if the session is already polling.
    pub fn start(&self) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            error!("Long-polling needs a Tokio runtime to start");
            return false;
        };

        let mut session = self.shared.session();
        if session.run.is_some() {
            warn!("Long-polling already started");
            return false;
        }

        session.generation += 1;
        session.consecutive_timeouts = 0;
        let run = CancellationToken::new();
        session.run = Some(run.clone());
        let generation = session.generation;
        self.shared.running.send_replace(true);
        drop(session);

        info!(
            method:% = self.shared.endpoint.method(),
            endpoint = self.shared.endpoint.endpoint();
            "Long-polling started"
        );
        runtime.spawn(run_session(Arc::clone(&self.shared), generation, run));
        true
    }

    /// Moves a polling session to idle.
    ///
    /// No further step starts; a request already in flight completes but its
    /// response is discarded. Returns `false`, logging a warning, if the
    /// session is not polling.
    pub fn stop(&self) -> bool {
        if self.shared.halt() {
            info!("Long-polling stopped");
            true
        } else {
            warn!("Long-polling is not running");
            false
        }
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.borrow()
    }

    /// Timeouts counted since the last response of the current session.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.shared.session().consecutive_timeouts
    }

    /// Resolves once the session is idle, whether it was stopped, ran out of
    /// timeout budget or was ended by the step handler.
    pub async fn stopped(&self) {
        let mut running = self.shared.running.subscribe();
        // The sender lives in `shared`, so the channel cannot close under us.
        let _ = running.wait_for(|running| !*running).await;
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub fn options(&self) -> &LongPollingOptions {
        &self.shared.options
    }
}

impl Drop for LongPolling {
    fn drop(&mut self) {
        self.shared.halt();
    }
}

impl fmt::Debug for LongPolling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongPolling")
            .field("endpoint", &self.shared.endpoint)
            .field("options", &self.shared.options)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ends the current run, if any.
    fn halt(&self) -> bool {
        let mut session = self.session();
        match session.run.take() {
            Some(run) => {
                run.cancel();
                self.running.send_replace(false);
                true
            },
            None => false,
        }
    }

    /// Ends run `generation` from inside the loop, unless it already ended.
    fn finish(&self, generation: u64) {
        let mut session = self.session();
        if session.generation != generation {
            return;
        }
        if let Some(run) = session.run.take() {
            run.cancel();
            self.running.send_replace(false);
        }
    }

    fn record_timeout(&self, generation: u64) -> StepOutcome {
        let mut session = self.session();
        if session.generation != generation || session.run.is_none() {
            return StepOutcome::Abandoned;
        }

        session.consecutive_timeouts += 1;
        let timeouts = session.consecutive_timeouts;
        let max = self.options.max_consecutive_timeouts;
        warn!(
            timeouts = timeouts,
            max = max,
            timeout_secs = self.options.timeout_secs;
            "Long-polling request timed out"
        );

        if timeouts < max {
            StepOutcome::Continue
        } else {
            warn!(timeouts = timeouts; "Too many consecutive timeouts, stopping long-polling");
            StepOutcome::Stop
        }
    }

    fn reset_timeouts(&self, generation: u64) {
        let mut session = self.session();
        if session.generation == generation {
            session.consecutive_timeouts = 0;
        }
    }
}

/// Returns the session to idle when its loop exits, including by a panicking
/// step handler.
struct RunGuard {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(generation = self.generation; "Long-polling step handler panicked, stopping");
        }
        self.shared.finish(self.generation);
    }
}

async fn run_session(shared: Arc<Shared>, generation: u64, run: CancellationToken) {
    let _guard = RunGuard {
        shared: Arc::clone(&shared),
        generation,
    };

    loop {
        if run.is_cancelled() {
            break;
        }

        match poll_step(&shared, generation, &run).await {
            StepOutcome::Continue => {},
            StepOutcome::Stop | StepOutcome::Abandoned => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.options.delay()) => {},
            _ = run.cancelled() => break,
        }
    }

    debug!(generation = generation; "Long-polling loop exited");
}

async fn poll_step(shared: &Arc<Shared>, generation: u64, run: &CancellationToken) -> StepOutcome {
    let step = Arc::new(PollStep::default());
    let signal = CancellationToken::new();
    let (tx, mut rx) = oneshot::channel::<Result<ResponseEnvelope, ApiError>>();

    let request = shared.request.clone().signal(signal.clone());
    tokio::spawn({
        let shared = Arc::clone(shared);
        let step = Arc::clone(&step);
        async move {
            let result = shared.client.fetch(&shared.endpoint, request).await;
            if step.settle() {
                let _ = tx.send(result);
            } else {
                debug!("Discarding response of a timed out poll step");
            }
        }
    });

    let received = match timeout(shared.options.timeout(), &mut rx).await {
        Ok(received) => received,
        Err(_) if step.settle() => {
            signal.cancel();
            return shared.record_timeout(generation);
        },
        // The response settled the step while the timer fired.
        Err(_) => rx.await,
    };

    let Ok(result) = received else {
        error!("Poll request ended without a result");
        return StepOutcome::Stop;
    };

    if run.is_cancelled() {
        debug!("Discarding response received after long-polling stopped");
        return StepOutcome::Abandoned;
    }
    shared.reset_timeouts(generation);

    match result {
        Ok(envelope) => {
            if (shared.handler)(&envelope) {
                StepOutcome::Continue
            } else {
                info!(status = envelope.status_code(); "Step handler ended long-polling");
                StepOutcome::Stop
            }
        },
        Err(e) => {
            error!(error:% = e; "Long-polling request failed");
            StepOutcome::Stop
        },
    }
}
