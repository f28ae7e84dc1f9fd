//! Scan lifecycle: submit, poll until terminal, fetch results.
//!
//! All network work runs on spawned tokio tasks. The host receives
//! [`ControllerEvent`]s over an unbounded channel and applies them on its
//! own task; the controller never touches presentation state.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use surfacescan_config::ControllerConfig;
use surfacescan_model::{CreatedScan, ScanHandle, ScanRequest, ScanStatus};
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug, info, warn};

use crate::backend::ScanBackend;
use crate::error::ScanError;

/// Identifies one submission. Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl ScanPhase {
    pub fn is_active(self) -> bool {
        matches!(self, ScanPhase::Submitting | ScanPhase::Polling)
    }
}

/// Everything the host needs to render a scan's progress. Events of a run
/// that has been superseded are never sent.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The backend accepted the scan and assigned it an id.
    Submitted { run: RunId, scan_id: String },
    /// A successful status check.
    Status { run: RunId, handle: ScanHandle },
    /// Results of a completed scan. Sent at most once per fetch.
    ResultsReady {
        run: RunId,
        scan_id: String,
        results: Value,
    },
    Error { run: RunId, error: ScanError },
}

impl ControllerEvent {
    pub fn run(&self) -> RunId {
        match self {
            ControllerEvent::Submitted { run, .. }
            | ControllerEvent::Status { run, .. }
            | ControllerEvent::ResultsReady { run, .. }
            | ControllerEvent::Error { run, .. } => *run,
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    /// `None` when idle or shut down; tasks of any other run are stale.
    current: Option<RunId>,
    last_issued: u64,
    phase: ScanPhase,
    handle: Option<ScanHandle>,
}

struct Shared {
    backend: Arc<dyn ScanBackend>,
    config: ControllerConfig,
    span: Span,
    events: mpsc::UnboundedSender<ControllerEvent>,
    state: Mutex<RunState>,
}

/// Drives one scan at a time against a [`ScanBackend`].
#[derive(Clone)]
pub struct ScanController {
    shared: Arc<Shared>,
}

impl fmt::Debug for ScanController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ScanController")
            .field("backend", &self.shared.backend)
            .field("current", &state.current)
            .field("phase", &state.phase)
            .finish()
    }
}

impl ScanController {
    pub fn new(
        backend: Arc<dyn ScanBackend>,
        config: ControllerConfig,
        span: Span,
    ) -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            shared: Arc::new(Shared {
                backend,
                config,
                span,
                events,
                state: Mutex::new(RunState::default()),
            }),
        };
        (controller, receiver)
    }

    pub fn phase(&self) -> ScanPhase {
        self.shared.state.lock().phase
    }

    /// Snapshot of the scan being tracked, once the backend assigned an id.
    pub fn handle(&self) -> Option<ScanHandle> {
        self.shared.state.lock().handle.clone()
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.shared.state.lock().current
    }

    /// Start a new scan. Whatever the previous run was doing stops being
    /// reported from this point on.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: ScanRequest) -> RunId {
        let run = {
            let mut state = self.shared.state.lock();
            state.last_issued += 1;
            let run = RunId(state.last_issued);
            if let Some(previous) = state.current.replace(run) {
                debug!(parent: &self.shared.span, %previous, %run, "superseding scan run");
            }
            state.phase = ScanPhase::Submitting;
            state.handle = None;
            run
        };

        info!(parent: &self.shared.span, %run, url = %request.url, "submitting scan");
        let shared = Arc::clone(&self.shared);
        let span = self.shared.span.clone();
        tokio::spawn(async move { shared.run_scan(run, request).await }.instrument(span));
        run
    }

    /// Fetch the results of the completed scan again, e.g. after the first
    /// fetch failed. Returns `false` when there is no completed scan.
    pub fn reload_results(&self) -> bool {
        let (run, scan_id) = {
            let state = self.shared.state.lock();
            match (state.current, state.phase, &state.handle) {
                (Some(run), ScanPhase::Completed, Some(handle)) => {
                    (run, handle.scan_id.clone())
                }
                _ => return false,
            }
        };

        let shared = Arc::clone(&self.shared);
        let span = self.shared.span.clone();
        tokio::spawn(
            async move { shared.fetch_results(run, scan_id).await }.instrument(span),
        );
        true
    }

    /// Stop tracking the current scan. In-flight calls may still complete
    /// but nothing more is reported.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if let Some(run) = state.current.take() {
            debug!(parent: &self.shared.span, %run, "scan controller shut down");
        }
        state.phase = ScanPhase::Idle;
        state.handle = None;
    }
}

impl Shared {
    fn is_current(&self, run: RunId) -> bool {
        self.state.lock().current == Some(run)
    }

    /// Apply `change` and send the event it produces, but only while `run`
    /// is still the current one. Returns whether the run is still current.
    fn update(
        &self,
        run: RunId,
        change: impl FnOnce(&mut RunState) -> Option<ControllerEvent>,
    ) -> bool {
        let mut state = self.state.lock();
        if state.current != Some(run) {
            debug!(%run, "dropping update from superseded run");
            return false;
        }
        if let Some(event) = change(&mut state)
            && self.events.send(event).is_err()
        {
            debug!(%run, "event receiver closed");
        }
        true
    }

    fn fail(&self, run: RunId, error: ScanError) {
        warn!(%run, %error, "scan failed");
        self.update(run, |state| {
            state.phase = ScanPhase::Failed;
            Some(ControllerEvent::Error { run, error })
        });
    }

    async fn run_scan(self: Arc<Self>, run: RunId, request: ScanRequest) {
        let created = self.backend.create_scan(&request).await;
        let scan_id = match created {
            Err(err) => return self.fail(run, ScanError::Create(err)),
            Ok(CreatedScan { id: Some(id), .. }) if !id.trim().is_empty() => id,
            Ok(_) => return self.fail(run, ScanError::InvalidData),
        };

        info!(%run, %scan_id, "scan created");
        let live = self.update(run, |state| {
            state.phase = ScanPhase::Polling;
            state.handle = Some(ScanHandle::new(scan_id.clone()));
            Some(ControllerEvent::Submitted {
                run,
                scan_id: scan_id.clone(),
            })
        });
        if live {
            self.poll_until_terminal(run, scan_id).await;
        }
    }

    async fn poll_until_terminal(self: Arc<Self>, run: RunId, scan_id: String) {
        let mut failures = 0u32;

        loop {
            if !self.is_current(run) {
                debug!(%run, "polling cancelled");
                return;
            }

            let report = match self.backend.scan_status(&scan_id).await {
                Ok(report) => report,
                Err(err) => {
                    failures += 1;
                    warn!(%run, %scan_id, failures, error = %err, "status check failed");
                    if let Some(ceiling) = self.config.max_consecutive_poll_failures
                        && failures >= ceiling
                    {
                        return self.fail(
                            run,
                            ScanError::PollingExhausted {
                                scan_id,
                                failures,
                                last: err,
                            },
                        );
                    }
                    tokio::time::sleep(self.config.error_backoff).await;
                    continue;
                }
            };
            failures = 0;

            let live = self.update(run, |state| {
                let handle = state
                    .handle
                    .get_or_insert_with(|| ScanHandle::new(scan_id.clone()));
                handle.apply(&report);
                match report.status {
                    ScanStatus::Completed => state.phase = ScanPhase::Completed,
                    ScanStatus::Failed => state.phase = ScanPhase::Failed,
                    _ => {}
                }
                Some(ControllerEvent::Status {
                    run,
                    handle: handle.clone(),
                })
            });
            if !live {
                return;
            }

            match report.status {
                ScanStatus::Completed => {
                    info!(%run, %scan_id, "scan completed");
                    let shared = Arc::clone(&self);
                    tokio::spawn(
                        async move { shared.fetch_results(run, scan_id).await }
                            .instrument(Span::current()),
                    );
                    return;
                }
                ScanStatus::Failed => {
                    let message =
                        report.error.unwrap_or_else(|| "Scan failed".to_string());
                    warn!(%run, %scan_id, error = %message, "backend reported failure");
                    self.update(run, |_| {
                        Some(ControllerEvent::Error {
                            run,
                            error: ScanError::Backend(message),
                        })
                    });
                    return;
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    async fn fetch_results(self: Arc<Self>, run: RunId, scan_id: String) {
        let event = match self.backend.scan_results(&scan_id).await {
            Ok(results) => ControllerEvent::ResultsReady {
                run,
                scan_id,
                results,
            },
            Err(err) => {
                warn!(%run, %scan_id, error = %err, "failed to load results");
                ControllerEvent::Error {
                    run,
                    error: ScanError::Results(err),
                }
            }
        };
        self.update(run, |_| Some(event));
    }
}
