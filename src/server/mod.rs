//! Imaging server interface.
//!
//! The panel consumes three kinds of resource from the imaging server:
//!
//! - `GET sonar_image_{1D,2D}.png?sim_mode=..&debug_mode=..&rand_number=..`: main plot
//! - `GET debug?plotname=<name>.png&rand_number=..`: one intermediate pipeline plot
//! - `POST micro_status`: microcontroller connectivity as JSON
//!
//! Every image request carries a fresh random `rand_number` so that no cache
//! between the panel and the server can answer with a stale plot.
//!
//! [`ImagingServer`] is the seam: [`http::HttpImagingServer`] talks to the real
//! server, [`mock::MockImagingServer`] answers in-process for tests and dry runs.

pub mod http;
pub mod mock;

use crate::error::AppResult;
use crate::mode::ModeSelection;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which main plot to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    /// 1D range plot
    OneD,
    /// 2D sonar image
    TwoD,
}

impl Dimension {
    /// Dimension selected by the display switch.
    pub fn from_mode(mode: &ModeSelection) -> Self {
        if mode.one_dimensional {
            Dimension::OneD
        } else {
            Dimension::TwoD
        }
    }

    /// Server resource name for this plot.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Dimension::OneD => "sonar_image_1D.png",
            Dimension::TwoD => "sonar_image_2D.png",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::OneD => write!(f, "1D"),
            Dimension::TwoD => write!(f, "2D"),
        }
    }
}

/// Uniform random token in `[0, 1)` used to defeat caching.
pub fn cache_token() -> f64 {
    rand::random::<f64>()
}

/// One main-image request.
#[derive(Debug, Clone, PartialEq)]
pub struct MainImageRequest {
    /// Which plot to render
    pub dimension: Dimension,
    /// `sim_mode` query flag
    pub simulated: bool,
    /// `debug_mode` query flag
    pub debug: bool,
    /// Cache-defeating `rand_number`
    pub token: f64,
}

impl MainImageRequest {
    /// Request for the current switch positions, with a fresh token.
    pub fn from_mode(mode: &ModeSelection) -> Self {
        Self {
            dimension: Dimension::from_mode(mode),
            simulated: mode.simulated,
            debug: mode.debug_requested,
            token: cache_token(),
        }
    }

    /// Same request with a new cache token, for a retry.
    pub fn refreshed(&self) -> Self {
        Self {
            token: cache_token(),
            ..self.clone()
        }
    }

    /// Endpoint path relative to the base URL.
    pub fn path(&self) -> &'static str {
        self.dimension.endpoint()
    }

    /// Query pairs in wire order.
    pub fn query(&self) -> [(&'static str, String); 3] {
        [
            ("sim_mode", self.simulated.to_string()),
            ("debug_mode", self.debug.to_string()),
            ("rand_number", self.token.to_string()),
        ]
    }
}

/// One debug plot request.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugPlotRequest {
    /// Server-side file name, e.g. `3_2_filter.png`
    pub plot_name: String,
    /// Cache-defeating `rand_number`
    pub token: f64,
}

impl DebugPlotRequest {
    /// Endpoint serving every debug plot.
    pub const PATH: &'static str = "debug";

    /// Request for `plot_name` with a fresh token.
    pub fn new(plot_name: impl Into<String>) -> Self {
        Self {
            plot_name: plot_name.into(),
            token: cache_token(),
        }
    }

    /// Query pairs in wire order.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("plotname", self.plot_name.clone()),
            ("rand_number", self.token.to_string()),
        ]
    }
}

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    /// `"Connected"` when the microcontroller answers
    pub connection: String,
    /// Current sample rate, `"N/A"` when not sampling
    pub sample_rate: String,
}

/// Access to the imaging server.
#[async_trait]
pub trait ImagingServer: Send + Sync {
    /// Fetch one rendered main plot.
    async fn fetch_main_image(&self, request: &MainImageRequest) -> AppResult<Bytes>;

    /// Fetch one intermediate debug plot.
    async fn fetch_debug_plot(&self, request: &DebugPlotRequest) -> AppResult<Bytes>;

    /// Query microcontroller connectivity.
    async fn micro_status(&self) -> AppResult<StatusReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_request_follows_mode() {
        let mode = ModeSelection {
            continuous: true,
            one_dimensional: true,
            simulated: true,
            debug_requested: false,
        };
        let request = MainImageRequest::from_mode(&mode);
        assert_eq!(request.path(), "sonar_image_1D.png");

        let query = request.query();
        assert_eq!(query[0], ("sim_mode", "true".to_string()));
        assert_eq!(query[1], ("debug_mode", "false".to_string()));
        assert_eq!(query[2].0, "rand_number");

        let mode = ModeSelection {
            one_dimensional: false,
            ..mode
        };
        assert_eq!(MainImageRequest::from_mode(&mode).path(), "sonar_image_2D.png");
    }

    #[test]
    fn cache_token_is_unit_interval() {
        for _ in 0..100 {
            let token = cache_token();
            assert!((0.0..1.0).contains(&token));
        }
    }

    #[test]
    fn refreshed_request_keeps_mode() {
        let request = MainImageRequest::from_mode(&ModeSelection::default());
        let retry = request.refreshed();
        assert_eq!(retry.dimension, request.dimension);
        assert_eq!(retry.simulated, request.simulated);
        assert_eq!(retry.debug, request.debug);
    }

    #[test]
    fn status_reply_parses() {
        let reply: StatusReply =
            serde_json::from_str(r#"{"connection":"Connected","sample_rate":"250 kHz"}"#)
                .unwrap();
        assert_eq!(reply.connection, "Connected");
        assert_eq!(reply.sample_rate, "250 kHz");
    }
}
