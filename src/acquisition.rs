//! Acquisition controller.
//!
//! The controller owns the session state and drives the main-image loop:
//!
//! ```text
//! start ─> [wait for server gate] ─> fetch main image ─┬─> show image, refresh rate
//!                ▲                                     ├─> debug fan-out (if requested)
//!                │                                     └─> continuous && !stop ?
//!                └──────────────────── yes ────────────────────┘    │ no
//!                                                                    ▼
//!                                                                  Idle
//! ```
//!
//! One loop task exists per run and carries a `CancellationToken`; `stop` lets the
//! in-flight frame finish, `abort` cancels it. Main-image requests have a deadline
//! and are retried a bounded number of times; once retries are exhausted the
//! failure is reported to the view and the run returns to idle.
//!
//! The loop task holds the shared server gate for the whole run, so the status
//! poller never talks to the server while an acquisition is in progress.

use crate::config::{AcquisitionConfig, PanelConfig};
use crate::debug_plots::{spawn_fan_out, DebugLayout, DebugPlanner};
use crate::error::{AppResult, PanelError};
use crate::mode::{ModeSelection, Toggles};
use crate::server::{Dimension, ImagingServer, MainImageRequest};
use crate::session::{idle_label, running_label, DebugState, FrameOutcome, SessionState};
use crate::view::{Indicator, MainImage, PanelView};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

struct Inner {
    server: Arc<dyn ImagingServer>,
    view: Arc<dyn PanelView>,
    toggles: Arc<Toggles>,
    settings: AcquisitionConfig,
    planner: DebugPlanner,
    session: Mutex<SessionState>,
    debug_state: Arc<Mutex<DebugState>>,
    state_tx: watch::Sender<SessionState>,
    server_gate: Arc<tokio::sync::Mutex<()>>,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Run/stop controller for main-image acquisition.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct AcquisitionController {
    inner: Arc<Inner>,
}

impl AcquisitionController {
    /// Idle controller; nothing talks to `server` until [`start`](Self::start).
    pub fn new(
        server: Arc<dyn ImagingServer>,
        view: Arc<dyn PanelView>,
        toggles: Arc<Toggles>,
        config: &PanelConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                server,
                view,
                toggles,
                settings: config.acquisition.clone(),
                planner: DebugPlanner::from_config(&config.debug),
                session: Mutex::new(SessionState::default()),
                debug_state: Arc::new(Mutex::new(DebugState::Off)),
                state_tx,
                server_gate: Arc::new(tokio::sync::Mutex::new(())),
                cancel: Mutex::new(None),
            }),
        }
    }

    /// Operator switches read by every frame.
    pub fn toggles(&self) -> &Arc<Toggles> {
        &self.inner.toggles
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.session.lock().clone()
    }

    /// Whether an acquisition loop is active.
    pub fn is_running(&self) -> bool {
        self.inner.session.lock().running
    }

    /// Current debug panel state.
    pub fn debug_state(&self) -> DebugState {
        *self.inner.debug_state.lock()
    }

    /// Receiver that observes every session transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Serializes access to the imaging server between a run and the status poller.
    pub fn server_gate(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.inner.server_gate)
    }

    /// `Idle → Running`: read the mode and launch the image loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> AppResult<Uuid> {
        self.launch(None)
    }

    /// Like [`start`](Self::start), but a continuous run ends by itself after
    /// `frames` main images. No request beyond the last frame is issued.
    pub fn start_limited(&self, frames: u64) -> AppResult<Uuid> {
        self.launch(Some(frames))
    }

    fn launch(&self, frame_limit: Option<u64>) -> AppResult<Uuid> {
        let mode = self.inner.toggles.snapshot();
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        let label = {
            let mut session = self.inner.session.lock();
            let label = session.begin(run_id, mode.continuous, frame_limit)?;
            *self.inner.cancel.lock() = Some(cancel.clone());
            self.inner.state_tx.send_replace(session.clone());
            label
        };
        self.inner.view.set_run_state(&label);

        let span = info_span!("acquisition", %run_id);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                info!(
                    continuous = mode.continuous,
                    frame_limit = ?frame_limit,
                    dimension = %Dimension::from_mode(&mode),
                    simulated = mode.simulated,
                    "Run started"
                );
                let error = inner.run_loop(run_id, &cancel).await;
                inner.finish(run_id, error);
            }
            .instrument(span),
        );

        Ok(run_id)
    }

    /// `Running → Stopping`. The in-flight frame completes; no further frame is
    /// requested. Returns false (and does nothing) when not running.
    pub fn stop(&self) -> bool {
        let label = {
            let mut session = self.inner.session.lock();
            let label = session.request_stop();
            if label.is_some() {
                self.inner.state_tx.send_replace(session.clone());
            }
            label
        };
        match label {
            Some(label) => {
                info!("Stop requested, waiting for in-flight frame");
                self.inner.view.set_run_state(&label);
                true
            }
            None => false,
        }
    }

    /// Cancel the in-flight request and end the run. Returns false when idle.
    pub fn abort(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some(cancel) = self.inner.cancel.lock().as_ref() {
            info!("Aborting run");
            cancel.cancel();
        }
        true
    }

    /// Force the session back to idle, cancelling any run.
    ///
    /// Used when the server is found unreachable; the label is reset even if the
    /// session was already idle.
    pub fn force_idle(&self, reason: &str) {
        {
            let mut session = self.inner.session.lock();
            if let Some(cancel) = self.inner.cancel.lock().take() {
                cancel.cancel();
            }
            if session.running {
                warn!(reason, "Run forced to idle");
                session.reset(Some(reason.to_string()));
            }
            self.inner.state_tx.send_replace(session.clone());
        }
        self.inner.view.set_run_state(&idle_label());
    }

    /// Debug toggle. Turning on shows the waiting placeholder until the next
    /// main image brings a reference plot; it never fetches by itself.
    pub fn set_debug(&self, enabled: bool) {
        self.inner.toggles.set_debug(enabled);
        let layout = {
            let mut state = self.inner.debug_state.lock();
            if enabled {
                state.enable().then(DebugLayout::waiting)
            } else {
                state.disable();
                Some(DebugLayout::hidden())
            }
        };
        if let Some(layout) = layout {
            debug!(enabled, "Debug display toggled");
            self.inner.view.set_debug_layout(&layout);
        }
    }

    /// Wait until no run is active.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|state| !state.running).await;
    }
}

impl Inner {
    /// Drive one run. Returns the error that ended it, if any.
    async fn run_loop(&self, run_id: Uuid, cancel: &CancellationToken) -> Option<PanelError> {
        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            guard = Arc::clone(&self.server_gate).lock_owned() => guard,
        };

        let mut frame: u64 = 0;
        loop {
            frame += 1;
            let mode = self.toggles.snapshot();
            let request = MainImageRequest::from_mode(&mode);
            let issued = Instant::now();

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PanelError::Cancelled),
                result = self.fetch_with_retry(request) => result,
            };

            match result {
                Ok(data) => {
                    let image = MainImage {
                        dimension: Dimension::from_mode(&mode),
                        frame,
                        elapsed: issued.elapsed(),
                        data,
                    };
                    if self.on_frame(run_id, image) == FrameOutcome::Finished {
                        return None;
                    }
                }
                Err(PanelError::Cancelled) => {
                    info!(frame, "Run cancelled");
                    return None;
                }
                Err(e) => {
                    error!(frame, error = %e, "Main image failed");
                    return Some(e);
                }
            }
        }
    }

    /// Main-image request with deadline and bounded retry.
    async fn fetch_with_retry(&self, mut request: MainImageRequest) -> AppResult<Bytes> {
        let deadline = self.settings.request_timeout();
        let mut attempt: u32 = 1;
        loop {
            let err = match timeout(deadline, self.server.fetch_main_image(&request)).await {
                Ok(Ok(data)) => return Ok(data),
                Ok(Err(e)) => e,
                Err(_) => PanelError::Timeout {
                    path: request.path().to_string(),
                    after: deadline,
                },
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt > self.settings.max_retries {
                return Err(PanelError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!(attempt, error = %err, "Main image attempt failed, retrying");
            sleep(self.settings.retry_backoff()).await;
            request = request.refreshed();
            attempt += 1;
        }
    }

    /// Completion of one main image: display it, fan out debug plots, then
    /// decide whether the loop continues. Toggles are re-read because they may
    /// have changed while the request was in flight.
    fn on_frame(&self, run_id: Uuid, image: MainImage) -> FrameOutcome {
        debug!(
            frame = image.frame,
            elapsed_ms = image.elapsed.as_millis() as u64,
            "Frame received"
        );
        self.view.show_main_image(&image);
        self.view.set_refresh_rate(&Indicator::refresh_rate(image.elapsed));

        let mode = self.toggles.snapshot();
        if mode.debug_requested {
            self.fan_out_debug(mode);
        }

        let (outcome, label) = {
            let mut session = self.session.lock();
            if !session.owns(run_id) {
                // forced idle while the frame was in flight
                return FrameOutcome::Finished;
            }
            let outcome = session.complete_frame(mode.continuous);
            self.state_tx.send_replace(session.clone());
            let label = match outcome {
                FrameOutcome::Continue => running_label(mode.continuous),
                FrameOutcome::Finished => {
                    self.cancel.lock().take();
                    idle_label()
                }
            };
            (outcome, label)
        };

        if outcome == FrameOutcome::Finished {
            info!(frames = image.frame, "Run finished");
        }
        self.view.set_run_state(&label);
        outcome
    }

    fn fan_out_debug(&self, mode: ModeSelection) {
        // Detached: debug plots complete on their own schedule.
        let _ = spawn_fan_out(
            Arc::clone(&self.server),
            Arc::clone(&self.view),
            Arc::clone(&self.debug_state),
            &self.planner,
            mode,
            self.settings.debug_timeout(),
        );
    }

    /// Return to idle after the loop exits, unless the session already moved on.
    fn finish(&self, run_id: Uuid, error: Option<PanelError>) {
        let ended = {
            let mut session = self.session.lock();
            if session.owns(run_id) {
                session.reset(error.as_ref().map(ToString::to_string));
                self.state_tx.send_replace(session.clone());
                self.cancel.lock().take();
                true
            } else {
                false
            }
        };
        if ended {
            if let Some(e) = &error {
                self.view.report_failure(e);
            }
            self.view.set_run_state(&idle_label());
        }
    }
}

/// Longest a single frame can take before the run gives up on it.
pub fn worst_case_frame_time(settings: &AcquisitionConfig) -> Duration {
    let attempts = settings.max_retries + 1;
    settings.request_timeout() * attempts + settings.retry_backoff() * settings.max_retries
}
