//! # Sonar Panel Library
//!
//! Headless control panel for a sonar imaging rig. The imaging server does all of
//! the signal processing and rendering; this crate decides *when* to ask it for
//! images and what to do with the answers.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: `AcquisitionController`, the run/stop machine and the
//!   cancellable main-image loop with bounded retry.
//! - **`config`**: `PanelConfig`, loaded with `figment` from defaults, a TOML file and
//!   `SONAR_PANEL_` environment variables.
//! - **`console`**: Line commands that stand in for the panel's buttons and switches.
//! - **`debug_plots`**: Planning and concurrent fetching of per-receiver pipeline plots.
//! - **`error`**: The crate-wide `PanelError` enum.
//! - **`mode`**: Operator switches (`Toggles`) and the `ModeSelection` read from them.
//! - **`poller`**: Periodic microcontroller/server connectivity checks.
//! - **`server`**: The `ImagingServer` trait with HTTP and mock implementations.
//! - **`session`**: `SessionState` and `DebugState` transitions and their labels.
//! - **`tracing_setup`**: `tracing-subscriber` initialisation.
//! - **`validation`**: Small validators used by the configuration.
//! - **`view`**: The `PanelView` presentation trait and the logging `ConsoleView`.

pub mod acquisition;
pub mod config;
pub mod console;
pub mod debug_plots;
pub mod error;
pub mod mode;
pub mod poller;
pub mod server;
pub mod session;
pub mod tracing_setup;
pub mod validation;
pub mod view;

pub use acquisition::AcquisitionController;
pub use config::PanelConfig;
pub use error::{AppResult, PanelError};
pub use mode::{ModeSelection, Toggles};
pub use poller::{PollerHandle, StatusPoller};
