//! The polling engine.
//!
//! One task per connected reporter owns the session, the connection
//! supervisor, the cached request list and the callbacks. It reacts to three
//! inputs, one at a time:
//!
//! ```text
//!   commands (stop / request / finish) ──┐
//!   session events (up / failed / ...) ──┼──▶ PollingEngine ──▶ result callback
//!   timer ticks ─────────────────────────┤         │
//!   request completions (JoinSet) ───────┘         └──▶ last error slot
//! ```
//!
//! Each tick spawns one task per request, so a slow or failing request never
//! holds up its siblings or the next tick. Completions are handled by the
//! engine task itself and never interleave.

use std::sync::Arc;
use std::time::Duration;

use semprate_types::{MonitoredTarget, QueryMode, Rate};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::catalog::QueryCatalog;
use crate::error::{ErrorSlot, ReporterError, TransportError};
use crate::parser::{self, RateDelegate};
use crate::request::{self, PendingRequest, RequestContext};
use crate::supervisor::{ConnectionSupervisor, Transition};
use crate::transport::{Session, SessionEvent};

/// Receives each `(target, rate)` result.
pub type ResultCallback = Arc<dyn Fn(&MonitoredTarget, Rate) + Send + Sync>;

/// Instructions from the [`RateReporter`](crate::RateReporter) handle.
#[derive(Debug)]
pub(crate) enum Command {
    /// Issue one round of requests now.
    Request,
    /// Disarm the timer; in-flight requests still complete.
    Stop,
    /// Stop, disconnect and dispose the session, then acknowledge.
    Finish(oneshot::Sender<()>),
}

/// Outcome of one request.
#[derive(Debug)]
struct Completion {
    target: MonitoredTarget,
    payload: String,
    outcome: Result<String, TransportError>,
}

pub(crate) struct PollingEngine {
    session: Arc<dyn Session>,
    supervisor: ConnectionSupervisor,
    catalog: QueryCatalog,
    context: RequestContext,
    interval: Duration,
    timeout: Duration,
    on_result: Option<ResultCallback>,
    delegate: Option<RateDelegate>,
    errors: ErrorSlot,
    /// Built on the first transition into `Connected`, kept for the session's lifetime.
    requests: Option<Vec<PendingRequest>>,
}

impl PollingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<dyn Session>,
        supervisor: ConnectionSupervisor,
        catalog: QueryCatalog,
        context: RequestContext,
        interval: Duration,
        timeout: Duration,
        on_result: Option<ResultCallback>,
        delegate: Option<RateDelegate>,
        errors: ErrorSlot,
    ) -> Self {
        Self {
            session,
            supervisor,
            catalog,
            context,
            interval,
            timeout,
            on_result,
            delegate,
            errors,
            requests: None,
        }
    }

    /// Drive the engine until `Finish` arrives or the reporter handle is dropped.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut timer: Option<Interval> = None;
        let mut in_flight: JoinSet<Completion> = JoinSet::new();

        let done = loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Request) => self.tick(&mut in_flight),
                    Some(Command::Stop) => self.disarm(&mut timer),
                    Some(Command::Finish(done)) => break Some(done),
                    None => break None,
                },

                Some(event) = events.recv() => match self.supervisor.handle(event) {
                    Transition::Connected => self.arm(&mut timer),
                    Transition::Disconnected => self.disarm(&mut timer),
                    Transition::Unchanged => {}
                },

                Some(joined) = in_flight.join_next() => match joined {
                    Ok(completion) => self.complete(completion),
                    Err(e) => error!("Request task failed: {}", e),
                },

                _ = next_tick(&mut timer) => self.tick(&mut in_flight),
            }
        };

        self.disarm(&mut timer);
        self.session.disconnect();
        self.session.dispose();
        // The session is gone; replies still in flight are discarded.
        in_flight.abort_all();
        self.supervisor.close();
        info!("Reporter finished");

        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    fn arm(&mut self, timer: &mut Option<Interval>) {
        if self.requests.is_none() {
            let requests = request::build(&self.catalog, &self.context);
            info!(
                "Built {} {} requests",
                requests.len(),
                self.catalog.mode()
            );
            self.requests = Some(requests);
        }

        if timer.is_none() {
            let mut interval = time::interval_at(Instant::now() + self.interval, self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *timer = Some(interval);
            debug!("Polling every {:?}", self.interval);
        }
    }

    fn disarm(&mut self, timer: &mut Option<Interval>) {
        if timer.take().is_some() {
            debug!("Polling stopped");
        }
    }

    /// Send every cached request, each in its own task.
    fn tick(&mut self, in_flight: &mut JoinSet<Completion>) {
        if !self.supervisor.state().is_connected() {
            debug!("Session disconnected, not sending SEMP requests");
            return;
        }
        let Some(requests) = &self.requests else {
            debug!("No requests built yet");
            return;
        };

        debug!("Processing {} requests", requests.len());
        for request in requests.iter().cloned() {
            let session = Arc::clone(&self.session);
            let timeout = self.timeout;
            in_flight.spawn(async move {
                let outcome = session
                    .send_request(&request.topic, &request.payload, timeout)
                    .await;
                Completion {
                    target: request.target,
                    payload: request.payload,
                    outcome,
                }
            });
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            target,
            payload,
            outcome,
        } = completion;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(source) => {
                let err = ReporterError::Request {
                    target: target.identifier().to_string(),
                    source,
                };
                warn!("{}", err);
                self.errors.record(&err, payload);
                return;
            }
        };
        debug!("SEMP response for {}: {}", target, raw);

        let mode = target.mode();
        let rate = match parser::parse(mode, &raw, self.delegate.as_ref()) {
            Ok(rate) => rate,
            Err(source) => {
                let err = ReporterError::Parse {
                    target: target.identifier().to_string(),
                    source,
                };
                warn!("{}", err);
                self.errors.record(&err, raw);
                if mode == QueryMode::UserCallback {
                    return;
                }
                Rate::Messages(0)
            }
        };
        debug!("Extracted rate for {}: {}", target, rate);

        match &self.on_result {
            Some(on_result) => on_result(&target, rate),
            None => debug!("No result callback registered; dropping rate for {}", target),
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
