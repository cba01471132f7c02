//! Panel presentation surface.
//!
//! Everything the controller wants to show an operator goes through the
//! [`PanelView`] trait: label text with a badge colour, received images, and the
//! visibility of the debug panel groups. The crate ships [`ConsoleView`], which
//! logs indicator changes and optionally writes every image to disk; tests plug in
//! a recording implementation.

use crate::debug_plots::{DebugLayout, DebugPlot};
use crate::error::PanelError;
use crate::server::Dimension;
use bytes::Bytes;
use chrono::Local;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Colour class of a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    /// Neutral / unknown
    Secondary,
    /// Healthy / active
    Success,
    /// Fault / stopping
    Danger,
}

/// A status label as displayed: text plus badge colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    /// Label text
    pub text: String,
    /// Label colour
    pub badge: Badge,
}

impl Indicator {
    /// Label with `text` in `badge` colour.
    pub fn new(text: impl Into<String>, badge: Badge) -> Self {
        Self {
            text: text.into(),
            badge,
        }
    }

    /// Refresh-rate label for a main image that took `elapsed` to arrive.
    pub fn refresh_rate(elapsed: Duration) -> Self {
        let millis = elapsed.as_millis() as f64;
        Self::new(format!("{} s", millis / 1000.0), Badge::Success)
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{:?}]", self.text, self.badge)
    }
}

/// The three connectivity labels refreshed by every status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityIndicators {
    /// Imaging server reachability
    pub server: Indicator,
    /// Microcontroller connection
    pub device: Indicator,
    /// Current sample rate
    pub sample_rate: Indicator,
}

/// A main sonar image as received from the server.
#[derive(Debug, Clone)]
pub struct MainImage {
    /// Plot the image was requested as
    pub dimension: Dimension,
    /// 1-based frame number within the run
    pub frame: u64,
    /// Time from request to arrival
    pub elapsed: Duration,
    /// PNG bytes
    pub data: Bytes,
}

/// Presentation surface driven by the acquisition controller and the poller.
///
/// Implementations are called from tokio tasks and must not block for long.
pub trait PanelView: Send + Sync {
    /// Run-state label ("Idle", "Running (cont.)", ...).
    fn set_run_state(&self, indicator: &Indicator);

    /// Time taken by the last main image.
    fn set_refresh_rate(&self, indicator: &Indicator);

    /// A main image arrived.
    fn show_main_image(&self, image: &MainImage);

    /// One debug plot arrived.
    fn show_debug_plot(&self, plot: &DebugPlot, data: &Bytes);

    /// Visibility of the debug container, placeholder and panel groups.
    fn set_debug_layout(&self, layout: &DebugLayout);

    /// Result of a status poll.
    fn set_connectivity(&self, indicators: &ConnectivityIndicators);

    /// A run was forced to stop by `error`.
    fn report_failure(&self, error: &PanelError);
}

/// Terminal view: logs every change through `tracing` and, when an output
/// directory is configured, writes images to it.
///
/// The latest main image overwrites `sonar_image_1D.png` / `sonar_image_2D.png`
/// and debug plots land under `debug/` with their server-side names.
pub struct ConsoleView {
    output_dir: Option<PathBuf>,
    last_run_state: Mutex<Option<Indicator>>,
}

impl ConsoleView {
    /// View that saves images under `output_dir` when set.
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir,
            last_run_state: Mutex::new(None),
        }
    }

    /// Directory images are written to, if any.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    fn write_image(&self, relative: &Path, data: &Bytes) {
        let Some(dir) = &self.output_dir else {
            return;
        };
        let path = dir.join(relative);
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, data));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to save image");
        }
    }
}

impl PanelView for ConsoleView {
    fn set_run_state(&self, indicator: &Indicator) {
        let mut last = self.last_run_state.lock();
        if last.as_ref() != Some(indicator) {
            info!(state = %indicator.text, "Run state");
            *last = Some(indicator.clone());
        }
    }

    fn set_refresh_rate(&self, indicator: &Indicator) {
        debug!(refresh = %indicator.text, "Refresh rate");
    }

    fn show_main_image(&self, image: &MainImage) {
        info!(
            frame = image.frame,
            bytes = image.data.len(),
            elapsed_ms = image.elapsed.as_millis() as u64,
            at = %Local::now().format("%H:%M:%S%.3f"),
            "{} image received",
            image.dimension
        );
        self.write_image(Path::new(image.dimension.endpoint()), &image.data);
    }

    fn show_debug_plot(&self, plot: &DebugPlot, data: &Bytes) {
        debug!(plot = %plot.name, bytes = data.len(), "Debug plot received");
        self.write_image(&Path::new("debug").join(&plot.name), data);
    }

    fn set_debug_layout(&self, layout: &DebugLayout) {
        info!(?layout, "Debug panels");
    }

    fn set_connectivity(&self, indicators: &ConnectivityIndicators) {
        info!(
            server = %indicators.server.text,
            device = %indicators.device.text,
            sample_rate = %indicators.sample_rate.text,
            "Connectivity"
        );
    }

    fn report_failure(&self, error: &PanelError) {
        error!(error = %error, "Acquisition stopped");
    }
}
