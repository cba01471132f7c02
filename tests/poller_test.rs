//! Integration tests for the connectivity poller and its interplay with runs.

mod common;

use common::{mode, settle, Rig};
use sonar_panel::server::mock::MockImagingServer;
use sonar_panel::server::StatusReply;
use sonar_panel::view::{Badge, Indicator};
use sonar_panel::StatusPoller;
use std::time::Duration;

fn poller(rig: &Rig) -> StatusPoller {
    StatusPoller::new(
        rig.controller.clone(),
        rig.server.clone(),
        rig.view.clone(),
        &rig.config.poller,
    )
}

fn sampling(rate: &str) -> StatusReply {
    StatusReply {
        connection: "Connected".to_string(),
        sample_rate: rate.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_reports_unknown_sample_rate_as_secondary() {
    let rig = Rig::new(MockImagingServer::new(), mode(true));

    let status = poller(&rig).poll_once().await.expect("poll ran");

    assert!(status.server_reachable);
    assert!(status.device_connected);
    let indicators = rig.view.connectivity().pop().expect("indicators shown");
    assert_eq!(indicators.server, Indicator::new("Connected", Badge::Success));
    assert_eq!(indicators.device, Indicator::new("Connected", Badge::Success));
    assert_eq!(indicators.sample_rate, Indicator::new("N/A", Badge::Secondary));
}

#[tokio::test(start_paused = true)]
async fn test_poll_reports_known_sample_rate_as_success() {
    let rig = Rig::new(MockImagingServer::new(), mode(true));
    rig.server.set_status(Some(sampling("500000")));

    poller(&rig).poll_once().await.expect("poll ran");

    let indicators = rig.view.connectivity().pop().expect("indicators shown");
    assert_eq!(indicators.sample_rate, Indicator::new("500000", Badge::Success));
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_while_idle_marks_disconnected() {
    let rig = Rig::new(MockImagingServer::new(), mode(true));
    rig.server.set_status(None);

    let status = poller(&rig).poll_once().await.expect("poll ran");

    assert!(!status.server_reachable);
    let indicators = rig.view.connectivity().pop().expect("indicators shown");
    assert_eq!(indicators.server.badge, Badge::Danger);
    assert_eq!(indicators.device.badge, Badge::Danger);
    assert_eq!(indicators.sample_rate.badge, Badge::Secondary);
    assert_eq!(rig.view.last_run_label().as_deref(), Some("Idle"));
    assert!(!rig.controller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_counts_as_failure() {
    let server = MockImagingServer::new().with_status_latency(Duration::from_secs(60));
    let rig = Rig::new(server, mode(true));

    let status = poller(&rig).poll_once().await.expect("poll ran");

    assert!(!status.server_reachable);
}

#[tokio::test(start_paused = true)]
async fn test_poll_skipped_while_running() {
    let server = MockImagingServer::new().with_main_latency(Duration::from_millis(100));
    let rig = Rig::new(server, mode(true));

    rig.controller.start().unwrap();
    settle(Duration::from_millis(10)).await;

    assert!(poller(&rig).poll_once().await.is_none());
    assert_eq!(rig.server.status_requests(), 0);

    rig.controller.abort();
    rig.controller.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_during_pending_start_forces_idle() {
    let server = MockImagingServer::new()
        .with_main_latency(Duration::from_millis(100))
        .with_status_latency(Duration::from_millis(500));
    let rig = Rig::new(server, mode(true));
    rig.server.set_status(None);

    let handle = poller(&rig).spawn();
    // the first poll is now holding the server
    settle(Duration::from_millis(10)).await;
    rig.controller.start().unwrap();
    assert!(rig.controller.is_running());

    settle(Duration::from_secs(1)).await;

    let state = rig.controller.snapshot();
    assert!(!state.running);
    assert_eq!(state.last_error.as_deref(), Some("imaging server unreachable"));
    assert_eq!(rig.server.main_requests().len(), 0);
    assert_eq!(rig.view.frames_shown(), 0);
    assert_eq!(rig.view.last_run_label().as_deref(), Some("Idle"));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_interval_while_idle() {
    let rig = Rig::new(MockImagingServer::new(), mode(true));

    let handle = poller(&rig).spawn();
    // ticks at 0s, 10s and 20s
    settle(Duration::from_secs(25)).await;

    assert_eq!(rig.server.status_requests(), 3);
    assert_eq!(rig.view.connectivity().len(), 3);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_polls_while_acquisition_runs() {
    let server = MockImagingServer::new().with_main_latency(Duration::from_millis(100));
    let rig = Rig::new(server, mode(true));

    let handle = poller(&rig).spawn();
    settle(Duration::from_millis(1)).await;
    assert_eq!(rig.server.status_requests(), 1);

    rig.controller.start().unwrap();
    settle(Duration::from_secs(35)).await;
    assert_eq!(rig.server.status_requests(), 1);
    assert!(rig.controller.snapshot().frames > 0);

    rig.controller.stop();
    rig.controller.wait_idle().await;
    settle(Duration::from_secs(10)).await;
    assert_eq!(rig.server.status_requests(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling() {
    let rig = Rig::new(MockImagingServer::new(), mode(true));

    let handle = poller(&rig).spawn();
    settle(Duration::from_millis(1)).await;
    handle.shutdown().await;
    settle(Duration::from_secs(30)).await;

    assert_eq!(rig.server.status_requests(), 1);
}
