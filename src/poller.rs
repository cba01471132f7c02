//! Connectivity status poller.
//!
//! Polls the server's microcontroller status once at startup and then on a fixed
//! interval until shut down. Polling and acquisition are mutually exclusive:
//!
//! - ticks that fall while a run is active are skipped (the poller watches the
//!   session channel), and
//! - each poll holds the controller's server gate, which the acquisition loop
//!   also takes, so a run that starts mid-poll waits for the poll to finish.
//!
//! A failed poll marks everything disconnected and forces the session to idle.

use crate::acquisition::AcquisitionController;
use crate::config::PollerConfig;
use crate::server::{ImagingServer, StatusReply};
use crate::view::{Badge, ConnectivityIndicators, Indicator, PanelView};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// Device reply meaning the microcontroller is attached.
pub const CONNECTED: &str = "Connected";
/// Sample-rate value meaning "not sampling / unknown".
pub const SAMPLE_RATE_UNKNOWN: &str = "N/A";

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityStatus {
    /// The status endpoint answered
    pub server_reachable: bool,
    /// The microcontroller is attached
    pub device_connected: bool,
    /// Device connection text as reported by the server
    pub device_label: String,
    /// Current sample rate, `N/A` when unknown
    pub sample_rate: String,
}

impl ConnectivityStatus {
    /// Status of a server that answered with `reply`.
    pub fn from_reply(reply: &StatusReply) -> Self {
        Self {
            server_reachable: true,
            device_connected: reply.connection == CONNECTED,
            device_label: reply.connection.clone(),
            sample_rate: reply.sample_rate.clone(),
        }
    }

    /// Server unreachable: nothing is known about the device either.
    pub fn unreachable() -> Self {
        Self {
            server_reachable: false,
            device_connected: false,
            device_label: "Not Connected".to_string(),
            sample_rate: SAMPLE_RATE_UNKNOWN.to_string(),
        }
    }

    /// Whether the device reported a sample rate.
    pub fn sample_rate_known(&self) -> bool {
        self.sample_rate != SAMPLE_RATE_UNKNOWN
    }

    /// Labels and badges for the three indicators.
    pub fn indicators(&self) -> ConnectivityIndicators {
        let server = if self.server_reachable {
            Indicator::new("Connected", Badge::Success)
        } else {
            Indicator::new("Not Connected", Badge::Danger)
        };
        let device_badge = if self.device_connected {
            Badge::Success
        } else {
            Badge::Danger
        };
        let rate_badge = if self.sample_rate_known() {
            Badge::Success
        } else {
            Badge::Secondary
        };
        ConnectivityIndicators {
            server,
            device: Indicator::new(self.device_label.clone(), device_badge),
            sample_rate: Indicator::new(self.sample_rate.clone(), rate_badge),
        }
    }
}

/// Periodic connectivity checker.
pub struct StatusPoller {
    controller: AcquisitionController,
    server: Arc<dyn ImagingServer>,
    view: Arc<dyn PanelView>,
    interval: Duration,
    timeout: Duration,
}

impl StatusPoller {
    /// Poller using the interval and timeout from `config`.
    pub fn new(
        controller: AcquisitionController,
        server: Arc<dyn ImagingServer>,
        view: Arc<dyn PanelView>,
        config: &PollerConfig,
    ) -> Self {
        Self {
            controller,
            server,
            view,
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }

    /// Poll once. Returns `None` when skipped because a run holds the server.
    pub async fn poll_once(&self) -> Option<ConnectivityStatus> {
        let gate = self.controller.server_gate();
        let Ok(_guard) = gate.try_lock() else {
            debug!("Server busy with acquisition, status poll skipped");
            return None;
        };
        if self.controller.is_running() {
            debug!("Run starting, status poll skipped");
            return None;
        }

        let status = match timeout(self.timeout, self.server.micro_status()).await {
            Ok(Ok(reply)) => Some(ConnectivityStatus::from_reply(&reply)),
            Ok(Err(e)) => {
                warn!(error = %e, "Status poll failed");
                None
            }
            Err(_) => {
                warn!(after = ?self.timeout, "Status poll timed out");
                None
            }
        };

        let status = match status {
            Some(status) => status,
            None => {
                let status = ConnectivityStatus::unreachable();
                self.view.set_connectivity(&status.indicators());
                self.controller.force_idle("imaging server unreachable");
                return Some(status);
            }
        };

        debug!(
            device = %status.device_label,
            sample_rate = %status.sample_rate,
            "Status poll succeeded"
        );
        self.view.set_connectivity(&status.indicators());
        Some(status)
    }

    /// Run the poller in the background: immediately, then every interval.
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(
            async move {
                let mut ticker = interval(self.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let state_rx = self.controller.subscribe();

                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if state_rx.borrow().running {
                        debug!("Acquisition active, status poll paused");
                        continue;
                    }
                    self.poll_once().await;
                }
                debug!("Status poller stopped");
            }
            .instrument(info_span!("status_poller")),
        );
        PollerHandle { cancel, join }
    }
}

/// Handle to a running poller.
pub struct PollerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Status poller task ended abnormally");
        }
    }
}
