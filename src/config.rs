//! Panel configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`PanelConfig::default`)
//! 2. A TOML file (by default `config/sonar_panel.toml`, silently skipped if absent)
//! 3. Environment variables prefixed with `SONAR_PANEL_`, using `__` between
//!    section and key
//!
//! # Example
//! ```no_run
//! use sonar_panel::config::PanelConfig;
//!
//! let config = PanelConfig::load()?;
//! println!("Imaging server: {}", config.server.base_url);
//! # Ok::<(), sonar_panel::error::PanelError>(())
//! ```
//!
//! Environment override example: `SONAR_PANEL_DEBUG__RECEIVER_COUNT=4`

use crate::error::{AppResult, PanelError};
use crate::tracing_setup::OutputFormat;
use crate::validation;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/sonar_panel.toml";

/// Top-level panel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Imaging server endpoint
    #[serde(default)]
    pub server: ServerConfig,
    /// Main-image fetch loop tuning
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Connectivity poller settings
    #[serde(default)]
    pub poller: PollerConfig,
    /// Debug plot layout
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
    /// Directory where received images are written (None = keep in memory only)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Imaging server endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the imaging server
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the microcontroller status endpoint
    #[serde(default = "default_status_path")]
    pub status_path: String,
    /// JSON string sent as the status request body
    #[serde(default = "default_status_payload")]
    pub status_payload: String,
}

/// Main-image loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Deadline for one main-image request in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Extra attempts after the first failed main-image request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Deadline for one debug plot request in milliseconds
    #[serde(default = "default_request_timeout")]
    pub debug_timeout_ms: u64,
}

/// Connectivity poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between status polls
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Deadline for one status request in milliseconds
    #[serde(default = "default_poll_timeout")]
    pub timeout_ms: u64,
}

/// Debug plot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Number of sonar receive channels
    #[serde(default = "default_receiver_count")]
    pub receiver_count: usize,
    /// Per-receiver pipeline stages, in pipeline order
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,
    /// Stage of the shared reference plot whose arrival reveals the panels
    #[serde(default = "default_reference_plot")]
    pub reference_plot: String,
    /// Combined-channel plots requested in live 2D mode
    #[serde(default = "default_combined_plots")]
    pub combined_plots: Vec<String>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_status_path() -> String {
    "/micro_status".to_string()
}

fn default_status_payload() -> String {
    "status".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_timeout() -> u64 {
    5_000
}

fn default_receiver_count() -> usize {
    8
}

fn default_stages() -> Vec<String> {
    ["receive", "filter", "window", "baseband", "comp", "range_profile"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_reference_plot() -> String {
    "chirp".to_string()
}

fn default_combined_plots() -> Vec<String> {
    vec!["all_profile_mags".to_string(), "all_profile_phases".to_string()]
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
            output_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_path: default_status_path(),
            status_payload: default_status_payload(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            debug_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_ms: default_poll_timeout(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            receiver_count: default_receiver_count(),
            stages: default_stages(),
            reference_plot: default_reference_plot(),
            combined_plots: default_combined_plots(),
        }
    }
}

impl AcquisitionConfig {
    /// Deadline for one main-image attempt.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Pause between main-image attempts.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Deadline for one debug plot request.
    pub fn debug_timeout(&self) -> Duration {
        Duration::from_millis(self.debug_timeout_ms)
    }
}

impl PollerConfig {
    /// Time between status polls.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Deadline for one status request.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PanelConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: PanelConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(PanelConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SONAR_PANEL_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |field: &str, reason: &str| {
            PanelError::Configuration(format!("{field}: {reason}"))
        };

        validation::is_valid_log_level(&self.application.log_level)
            .map_err(|e| invalid("application.log_level", e))?;

        validation::is_valid_base_url(&self.server.base_url)
            .map_err(|e| invalid("server.base_url", e))?;
        if !self.server.status_path.starts_with('/') {
            return Err(invalid("server.status_path", "must start with '/'"));
        }

        validation::is_in_range(self.acquisition.request_timeout_ms, 1..=600_000)
            .map_err(|e| invalid("acquisition.request_timeout_ms", e))?;
        validation::is_in_range(self.acquisition.debug_timeout_ms, 1..=600_000)
            .map_err(|e| invalid("acquisition.debug_timeout_ms", e))?;
        validation::is_in_range(self.acquisition.max_retries, 0..=20)
            .map_err(|e| invalid("acquisition.max_retries", e))?;

        validation::is_in_range(self.poller.interval_secs, 1..=3_600)
            .map_err(|e| invalid("poller.interval_secs", e))?;
        validation::is_in_range(self.poller.timeout_ms, 1..=600_000)
            .map_err(|e| invalid("poller.timeout_ms", e))?;

        validation::is_in_range(self.debug.receiver_count, 1..=64)
            .map_err(|e| invalid("debug.receiver_count", e))?;
        if self.debug.stages.is_empty() {
            return Err(invalid("debug.stages", "at least one stage is required"));
        }
        let mut seen = HashSet::new();
        for stage in &self.debug.stages {
            validation::is_valid_plot_token(stage).map_err(|e| invalid("debug.stages", e))?;
            if !seen.insert(stage) {
                return Err(invalid("debug.stages", &format!("duplicate stage '{stage}'")));
            }
        }
        validation::is_valid_plot_token(&self.debug.reference_plot)
            .map_err(|e| invalid("debug.reference_plot", e))?;
        for plot in &self.debug.combined_plots {
            validation::is_valid_plot_token(plot)
                .map_err(|e| invalid("debug.combined_plots", e))?;
        }

        Ok(())
    }
}
