//! Debug plot fan-out.
//!
//! When debug mode is on, every main image is followed by a burst of requests for
//! the intermediate plots of the signal-processing pipeline:
//!
//! 1. the shared reference plot (`_1_chirp.png`), requested first;
//! 2. for each receiver `i`, one plot per configured stage, named
//!    `{i}_{n}_{stage}.png` with `n` the 1-based stage number;
//! 3. in live 2D mode, the combined-channel plots (`all_profile_mags.png`, ...).
//!
//! 1D mode only covers receiver 0. All requests are issued at once and complete
//! independently. The panels stay hidden until the reference plot arrives; its
//! arrival moves the debug state to `On` and reveals the groups for the mode.

use crate::config::DebugConfig;
use crate::mode::ModeSelection;
use crate::server::{DebugPlotRequest, ImagingServer};
use crate::session::DebugState;
use crate::view::PanelView;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// What a debug plot shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotKind {
    /// Shared transmit reference; gates panel visibility
    Reference,
    /// One pipeline stage of one receiver
    Receiver {
        /// 0-based receiver number
        index: usize,
        /// Pipeline stage name
        stage: String,
    },
    /// Aggregate over all receivers
    Combined,
}

/// A debug plot and its server-side file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugPlot {
    /// Server-side file name
    pub name: String,
    /// What the plot shows
    pub kind: PlotKind,
}

/// Visibility of the debug container and its panel groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugLayout {
    /// Debug section shown at all
    pub container: bool,
    /// "Waiting for plots" placeholder
    pub waiting_message: bool,
    /// Receiver 0 panel group
    pub receiver0: bool,
    /// Panel groups of receivers 1 and up
    pub remaining_receivers: bool,
    /// Combined-channel panel group
    pub combined: bool,
}

impl DebugLayout {
    /// Debug display switched off.
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Switched on, nothing received yet.
    pub fn waiting() -> Self {
        Self {
            container: true,
            waiting_message: true,
            ..Self::default()
        }
    }

    /// Reference plot arrived for a fan-out issued in `mode`.
    pub fn revealed(mode: &ModeSelection) -> Self {
        let two_d = !mode.one_dimensional;
        Self {
            container: true,
            waiting_message: false,
            receiver0: true,
            remaining_receivers: two_d,
            combined: two_d && !mode.simulated,
        }
    }
}

/// Builds the list of debug plots for a mode.
#[derive(Debug, Clone)]
pub struct DebugPlanner {
    receiver_count: usize,
    stages: Vec<String>,
    reference: String,
    combined: Vec<String>,
}

impl DebugPlanner {
    /// Planner for the configured receivers and stages.
    pub fn from_config(config: &DebugConfig) -> Self {
        Self {
            receiver_count: config.receiver_count,
            stages: config.stages.clone(),
            reference: config.reference_plot.clone(),
            combined: config.combined_plots.clone(),
        }
    }

    /// Number of receive channels.
    pub fn receiver_count(&self) -> usize {
        self.receiver_count
    }

    /// Plots to request after a main image, reference plot first.
    pub fn plan(&self, mode: &ModeSelection) -> Vec<DebugPlot> {
        let receivers = if mode.one_dimensional {
            1
        } else {
            self.receiver_count
        };

        let mut plots = Vec::with_capacity(1 + receivers * self.stages.len() + self.combined.len());
        plots.push(DebugPlot {
            name: format!("_1_{}.png", self.reference),
            kind: PlotKind::Reference,
        });

        for index in 0..receivers {
            for (n, stage) in self.stages.iter().enumerate() {
                plots.push(DebugPlot {
                    name: format!("{index}_{}_{stage}.png", n + 1),
                    kind: PlotKind::Receiver {
                        index,
                        stage: stage.clone(),
                    },
                });
            }
        }

        if !mode.simulated && !mode.one_dimensional {
            plots.extend(self.combined.iter().map(|name| DebugPlot {
                name: format!("{name}.png"),
                kind: PlotKind::Combined,
            }));
        }

        plots
    }
}

/// Handles of one fan-out's in-flight requests.
///
/// Dropping it leaves the requests running; [`FanOut::join`] waits for all of them.
#[derive(Debug)]
pub struct FanOut {
    handles: Vec<JoinHandle<()>>,
}

impl FanOut {
    /// Number of requests issued.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when no request was issued.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait until every request finished or failed.
    pub async fn join(self) {
        join_all(self.handles).await;
    }
}

/// Issue every plot of `planner.plan(mode)` concurrently.
pub fn spawn_fan_out(
    server: Arc<dyn ImagingServer>,
    view: Arc<dyn PanelView>,
    debug_state: Arc<Mutex<DebugState>>,
    planner: &DebugPlanner,
    mode: ModeSelection,
    request_timeout: Duration,
) -> FanOut {
    let plots = planner.plan(&mode);
    debug!(count = plots.len(), "Requesting debug plots");

    let handles = plots
        .into_iter()
        .map(|plot| {
            let server = Arc::clone(&server);
            let view = Arc::clone(&view);
            let debug_state = Arc::clone(&debug_state);
            tokio::spawn(async move {
                let request = DebugPlotRequest::new(plot.name.clone());
                let fetch = server.fetch_debug_plot(&request);
                let data = match timeout(request_timeout, fetch).await {
                    Ok(Ok(data)) => data,
                    Ok(Err(e)) => {
                        warn!(plot = %plot.name, error = %e, "Debug plot failed");
                        return;
                    }
                    Err(_) => {
                        warn!(plot = %plot.name, "Debug plot timed out");
                        return;
                    }
                };

                view.show_debug_plot(&plot, &data);

                if plot.kind == PlotKind::Reference {
                    let reveal = debug_state.lock().reference_arrived();
                    if reveal {
                        view.set_debug_layout(&DebugLayout::revealed(&mode));
                    }
                }
            })
        })
        .collect();

    FanOut { handles }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> DebugPlanner {
        DebugPlanner::from_config(&DebugConfig::default())
    }

    fn mode(one_dimensional: bool, simulated: bool) -> ModeSelection {
        ModeSelection {
            continuous: true,
            one_dimensional,
            simulated,
            debug_requested: true,
        }
    }

    fn receivers(plots: &[DebugPlot]) -> Vec<usize> {
        let mut indices: Vec<usize> = plots
            .iter()
            .filter_map(|p| match &p.kind {
                PlotKind::Receiver { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        indices.dedup();
        indices
    }

    #[test]
    fn test_one_d_covers_receiver_zero_only() {
        let plots = planner().plan(&mode(true, false));
        assert_eq!(receivers(&plots), vec![0]);
        assert_eq!(plots.len(), 1 + 6);
        assert!(!plots.iter().any(|p| p.kind == PlotKind::Combined));
    }

    #[test]
    fn test_two_d_live_adds_combined_plots() {
        let plots = planner().plan(&mode(false, false));
        assert_eq!(receivers(&plots), (0..8).collect::<Vec<_>>());
        let combined: Vec<&str> = plots
            .iter()
            .filter(|p| p.kind == PlotKind::Combined)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(combined, vec!["all_profile_mags.png", "all_profile_phases.png"]);
        assert_eq!(plots.len(), 1 + 8 * 6 + 2);
    }

    #[test]
    fn test_two_d_simulated_omits_combined_plots() {
        let plots = planner().plan(&mode(false, true));
        assert_eq!(receivers(&plots).len(), 8);
        assert!(!plots.iter().any(|p| p.kind == PlotKind::Combined));
    }

    #[test]
    fn test_plot_names() {
        let plots = planner().plan(&mode(false, true));
        assert_eq!(plots[0].name, "_1_chirp.png");
        assert_eq!(plots[0].kind, PlotKind::Reference);
        assert_eq!(plots[1].name, "0_1_receive.png");
        assert_eq!(plots[2].name, "0_2_filter.png");
        assert_eq!(plots[6].name, "0_6_range_profile.png");
        assert_eq!(plots[7].name, "1_1_receive.png");
    }

    #[test]
    fn test_stage_list_is_configurable() {
        let config = DebugConfig {
            receiver_count: 2,
            stages: vec!["receive".into(), "inverse_filter".into()],
            ..DebugConfig::default()
        };
        let plots = DebugPlanner::from_config(&config).plan(&mode(false, true));
        let names: Vec<&str> = plots.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "_1_chirp.png",
                "0_1_receive.png",
                "0_2_inverse_filter.png",
                "1_1_receive.png",
                "1_2_inverse_filter.png",
            ]
        );
    }

    #[test]
    fn test_layouts() {
        assert_eq!(DebugLayout::hidden(), DebugLayout::default());

        let waiting = DebugLayout::waiting();
        assert!(waiting.container && waiting.waiting_message);
        assert!(!waiting.receiver0 && !waiting.remaining_receivers && !waiting.combined);

        let one_d = DebugLayout::revealed(&mode(true, false));
        assert!(one_d.receiver0 && !one_d.remaining_receivers && !one_d.combined);
        assert!(!one_d.waiting_message);

        let live = DebugLayout::revealed(&mode(false, false));
        assert!(live.receiver0 && live.remaining_receivers && live.combined);

        let sim = DebugLayout::revealed(&mode(false, true));
        assert!(sim.remaining_receivers && !sim.combined);
    }

    #[tokio::test]
    async fn test_fan_out_reveals_on_reference() {
        use crate::server::mock::MockImagingServer;
        use crate::view::ConsoleView;

        let server = Arc::new(MockImagingServer::new());
        let state = Arc::new(Mutex::new(DebugState::Waiting));
        let fan_out = spawn_fan_out(
            server.clone(),
            Arc::new(ConsoleView::new(None)),
            Arc::clone(&state),
            &planner(),
            mode(true, true),
            Duration::from_secs(1),
        );
        assert_eq!(fan_out.len(), 7);

        fan_out.join().await;
        assert_eq!(*state.lock(), DebugState::On);
        assert_eq!(server.debug_plot_names()[0], "_1_chirp.png");
    }
}
