//! Mock Imaging Server
//!
//! In-process stand-in for the imaging server. All delays use
//! `tokio::time::sleep`, so tests running on a paused clock advance instantly.
//!
//! Behaviour is scripted through setters: response latency, a number of main
//! image failures to inject, and the status reply (or a status failure). Every
//! request is recorded for later inspection.

use super::{DebugPlotRequest, ImagingServer, MainImageRequest, StatusReply};
use crate::error::{AppResult, PanelError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
struct MockState {
    main_latency: Duration,
    debug_latency: Duration,
    status_latency: Duration,
    main_failures: u32,
    status: Option<StatusReply>,
    main_requests: Vec<MainImageRequest>,
    debug_requests: Vec<DebugPlotRequest>,
    status_requests: usize,
}

/// Scriptable in-memory imaging server.
#[derive(Debug)]
pub struct MockImagingServer {
    state: Mutex<MockState>,
}

impl Default for MockImagingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImagingServer {
    /// Instant responses and a connected, idle microcontroller.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                main_latency: Duration::ZERO,
                debug_latency: Duration::ZERO,
                status_latency: Duration::ZERO,
                main_failures: 0,
                status: Some(StatusReply {
                    connection: "Connected".to_string(),
                    sample_rate: "N/A".to_string(),
                }),
                main_requests: Vec::new(),
                debug_requests: Vec::new(),
                status_requests: 0,
            }),
        }
    }

    /// Delay before each main image is answered.
    pub fn with_main_latency(self, latency: Duration) -> Self {
        self.state.lock().main_latency = latency;
        self
    }

    /// Delay before each debug plot is answered.
    pub fn with_debug_latency(self, latency: Duration) -> Self {
        self.state.lock().debug_latency = latency;
        self
    }

    /// Delay before each status reply.
    pub fn with_status_latency(self, latency: Duration) -> Self {
        self.state.lock().status_latency = latency;
        self
    }

    /// Make the next `count` main-image requests fail with HTTP 500.
    pub fn fail_next_main(&self, count: u32) {
        self.state.lock().main_failures = count;
    }

    /// Reply to status polls with `reply`, or fail them when `None`.
    pub fn set_status(&self, reply: Option<StatusReply>) {
        self.state.lock().status = reply;
    }

    /// Every main-image request received so far.
    pub fn main_requests(&self) -> Vec<MainImageRequest> {
        self.state.lock().main_requests.clone()
    }

    /// Names of every debug plot requested so far.
    pub fn debug_plot_names(&self) -> Vec<String> {
        self.state
            .lock()
            .debug_requests
            .iter()
            .map(|r| r.plot_name.clone())
            .collect()
    }

    /// Number of status polls received.
    pub fn status_requests(&self) -> usize {
        self.state.lock().status_requests
    }
}

#[async_trait]
impl ImagingServer for MockImagingServer {
    async fn fetch_main_image(&self, request: &MainImageRequest) -> AppResult<Bytes> {
        let (latency, fail) = {
            let mut state = self.state.lock();
            state.main_requests.push(request.clone());
            let fail = state.main_failures > 0;
            if fail {
                state.main_failures -= 1;
            }
            (state.main_latency, fail)
        };
        sleep(latency).await;
        if fail {
            return Err(PanelError::ServerStatus {
                status: 500,
                path: request.path().to_string(),
            });
        }
        Ok(Bytes::from(format!("{}:{}", request.dimension, request.token)))
    }

    async fn fetch_debug_plot(&self, request: &DebugPlotRequest) -> AppResult<Bytes> {
        let latency = {
            let mut state = self.state.lock();
            state.debug_requests.push(request.clone());
            state.debug_latency
        };
        sleep(latency).await;
        Ok(Bytes::from(request.plot_name.clone()))
    }

    async fn micro_status(&self) -> AppResult<StatusReply> {
        let (latency, reply) = {
            let mut state = self.state.lock();
            state.status_requests += 1;
            (state.status_latency, state.status.clone())
        };
        sleep(latency).await;
        reply.ok_or_else(|| PanelError::ServerStatus {
            status: 503,
            path: "/micro_status".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModeSelection;

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let server = MockImagingServer::new();
        server.fail_next_main(1);
        let request = MainImageRequest::from_mode(&ModeSelection::default());

        assert!(server.fetch_main_image(&request).await.is_err());
        assert!(server.fetch_main_image(&request).await.is_ok());
        assert_eq!(server.main_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_status_failure() {
        let server = MockImagingServer::new();
        assert!(server.micro_status().await.is_ok());
        server.set_status(None);
        assert!(server.micro_status().await.is_err());
        assert_eq!(server.status_requests(), 2);
    }
}
