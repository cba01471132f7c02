//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use sonar_panel::debug_plots::{DebugLayout, DebugPlot};
use sonar_panel::server::mock::MockImagingServer;
use sonar_panel::view::{ConnectivityIndicators, Indicator, MainImage, PanelView};
use sonar_panel::{AcquisitionController, ModeSelection, PanelConfig, PanelError, Toggles};
use std::sync::Arc;
use std::time::Duration;

/// Everything the view was asked to display, in order.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    RunState(Indicator),
    RefreshRate(Indicator),
    MainImage { frame: u64 },
    DebugPlot(String),
    DebugLayout(DebugLayout),
    Connectivity(ConnectivityIndicators),
    Failure(String),
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().clone()
    }

    pub fn run_labels(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::RunState(indicator) => Some(indicator.text),
                _ => None,
            })
            .collect()
    }

    pub fn last_run_label(&self) -> Option<String> {
        self.run_labels().pop()
    }

    pub fn layouts(&self) -> Vec<DebugLayout> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::DebugLayout(layout) => Some(layout),
                _ => None,
            })
            .collect()
    }

    pub fn connectivity(&self) -> Vec<ConnectivityIndicators> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Connectivity(indicators) => Some(indicators),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Failure(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn frames_shown(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ViewEvent::MainImage { .. }))
            .count()
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().push(event);
    }
}

impl PanelView for RecordingView {
    fn set_run_state(&self, indicator: &Indicator) {
        self.push(ViewEvent::RunState(indicator.clone()));
    }

    fn set_refresh_rate(&self, indicator: &Indicator) {
        self.push(ViewEvent::RefreshRate(indicator.clone()));
    }

    fn show_main_image(&self, image: &MainImage) {
        self.push(ViewEvent::MainImage { frame: image.frame });
    }

    fn show_debug_plot(&self, plot: &DebugPlot, _data: &Bytes) {
        self.push(ViewEvent::DebugPlot(plot.name.clone()));
    }

    fn set_debug_layout(&self, layout: &DebugLayout) {
        self.push(ViewEvent::DebugLayout(*layout));
    }

    fn set_connectivity(&self, indicators: &ConnectivityIndicators) {
        self.push(ViewEvent::Connectivity(indicators.clone()));
    }

    fn report_failure(&self, error: &PanelError) {
        self.push(ViewEvent::Failure(error.to_string()));
    }
}

/// Controller wired to a mock server and a recording view.
pub struct Rig {
    pub server: Arc<MockImagingServer>,
    pub view: Arc<RecordingView>,
    pub controller: AcquisitionController,
    pub config: PanelConfig,
}

impl Rig {
    pub fn new(server: MockImagingServer, mode: ModeSelection) -> Self {
        Self::with_config(server, mode, test_config())
    }

    pub fn with_config(
        server: MockImagingServer,
        mode: ModeSelection,
        config: PanelConfig,
    ) -> Self {
        let server = Arc::new(server);
        let view = Arc::new(RecordingView::default());
        let controller = AcquisitionController::new(
            server.clone(),
            view.clone(),
            Arc::new(Toggles::new(mode)),
            &config,
        );
        Self {
            server,
            view,
            controller,
            config,
        }
    }
}

/// Small timeouts so failure paths resolve quickly on the paused clock.
pub fn test_config() -> PanelConfig {
    let mut config = PanelConfig::default();
    config.acquisition.request_timeout_ms = 1_000;
    config.acquisition.retry_backoff_ms = 100;
    config.acquisition.max_retries = 2;
    config.acquisition.debug_timeout_ms = 1_000;
    config
}

pub fn mode(continuous: bool) -> ModeSelection {
    ModeSelection {
        continuous,
        ..ModeSelection::default()
    }
}

/// Let spawned tasks run; on a paused clock this also advances time.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
