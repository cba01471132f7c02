//! CLI Entry Point for sonar_panel
//!
//! Provides command-line access to an imaging server:
//! - `console`: interactive panel (commands on stdin, connectivity polled in the background)
//! - `run`: headless acquisition until a frame count is reached or Ctrl-C
//! - `status`: one connectivity check
//!
//! # Usage
//!
//! ```bash
//! sonar_panel --server http://127.0.0.1:5000 console
//! sonar_panel run --one-d --sim --frames 20
//! sonar_panel status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sonar_panel::acquisition::worst_case_frame_time;
use sonar_panel::console::{self, HELP};
use sonar_panel::server::http::HttpImagingServer;
use sonar_panel::server::ImagingServer;
use sonar_panel::view::{ConsoleView, PanelView};
use sonar_panel::{
    tracing_setup, AcquisitionController, ModeSelection, PanelConfig, StatusPoller, Toggles,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "sonar_panel")]
#[command(about = "Control panel for the sonar imaging server", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Imaging server base URL (overrides the configuration)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Directory for received images (overrides the configuration)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive panel on stdin
    Console,

    /// Acquire without interaction
    Run {
        /// Single-shot instead of continuous
        #[arg(long)]
        single: bool,

        /// 1D range plot instead of the 2D image
        #[arg(long)]
        one_d: bool,

        /// Ask the server for simulated data
        #[arg(long)]
        sim: bool,

        /// Also fetch debug plots
        #[arg(long)]
        debug: bool,

        /// Stop after this many frames (continuous mode)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        frames: Option<u64>,
    },

    /// Check server and microcontroller connectivity once
    Status,
}

struct Panel {
    controller: AcquisitionController,
    server: Arc<dyn ImagingServer>,
    view: Arc<dyn PanelView>,
    config: PanelConfig,
}

impl Panel {
    fn build(config: PanelConfig, mode: ModeSelection) -> Result<Self> {
        let server: Arc<dyn ImagingServer> = Arc::new(
            HttpImagingServer::new(&config.server).context("Failed to create HTTP client")?,
        );
        let view: Arc<dyn PanelView> =
            Arc::new(ConsoleView::new(config.application.output_dir.clone()));
        let controller = AcquisitionController::new(
            Arc::clone(&server),
            Arc::clone(&view),
            Arc::new(Toggles::new(mode)),
            &config,
        );
        Ok(Self {
            controller,
            server,
            view,
            config,
        })
    }

    fn poller(&self) -> StatusPoller {
        StatusPoller::new(
            self.controller.clone(),
            Arc::clone(&self.server),
            Arc::clone(&self.view),
            &self.config.poller,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PanelConfig::load_from(path),
        None => PanelConfig::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    if let Some(output) = cli.output {
        config.application.output_dir = Some(output);
    }
    config.validate()?;

    tracing_setup::init_from_config(&config).map_err(anyhow::Error::msg)?;
    info!(server = %config.server.base_url, "sonar_panel starting");

    match cli.command {
        Commands::Console => run_console(config).await,
        Commands::Run {
            single,
            one_d,
            sim,
            debug,
            frames,
        } => {
            let mode = ModeSelection {
                continuous: !single,
                one_dimensional: one_d,
                simulated: sim,
                debug_requested: debug,
            };
            run_headless(config, mode, frames).await
        }
        Commands::Status => check_status(config).await,
    }
}

async fn run_console(config: PanelConfig) -> Result<()> {
    let panel = Panel::build(config, ModeSelection::default())?;
    let poller = panel.poller().spawn();

    println!("{HELP}");
    let stdin = BufReader::new(tokio::io::stdin());
    console::run_console(&panel.controller, stdin).await?;

    panel.controller.stop();
    panel.controller.wait_idle().await;
    poller.shutdown().await;
    Ok(())
}

async fn run_headless(config: PanelConfig, mode: ModeSelection, frames: Option<u64>) -> Result<()> {
    let panel = Panel::build(config, mode)?;
    let controller = &panel.controller;

    if mode.debug_requested {
        controller.set_debug(true);
    }
    if panel.poller().poll_once().await.is_some_and(|status| !status.server_reachable) {
        anyhow::bail!("Imaging server {} is unreachable", panel.config.server.base_url);
    }

    let mut state_rx = controller.subscribe();
    match frames {
        Some(limit) => controller.start_limited(limit)?,
        None => controller.start()?,
    };
    let mut interrupts = 0;

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let running = state_rx.borrow_and_update().running;
                if !running {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                interrupts += 1;
                if interrupts == 1 {
                    info!(
                        max_wait = ?worst_case_frame_time(&panel.config.acquisition),
                        "Interrupted, finishing current frame (Ctrl-C again to abort)"
                    );
                    controller.stop();
                } else {
                    controller.abort();
                }
            }
        }
    }

    let session = controller.snapshot();
    info!(frames = session.frames, "Acquisition finished");
    match session.last_error {
        Some(error) => anyhow::bail!("Run ended with error: {error}"),
        None => Ok(()),
    }
}

async fn check_status(config: PanelConfig) -> Result<()> {
    let panel = Panel::build(config, ModeSelection::default())?;
    let Some(status) = panel.poller().poll_once().await else {
        anyhow::bail!("Status poll skipped");
    };
    let indicators = status.indicators();
    println!("server:      {}", indicators.server);
    println!("device:      {}", indicators.device);
    println!("sample rate: {}", indicators.sample_rate);
    if status.server_reachable {
        Ok(())
    } else {
        anyhow::bail!("Imaging server is unreachable")
    }
}
