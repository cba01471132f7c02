//! Acquisition session state.
//!
//! [`SessionState`] is the run/stop machine shared by the image loop and the
//! status poller; [`DebugState`] tracks whether the debug panels are hidden,
//! waiting for their first plot, or showing.
//!
//! # State Machine
//!
//! ```text
//!          start                       stop
//! Idle ───────────> Running ─────────────────> Stopping
//!  ▲                  │                           │
//!  │  frame done,     │                           │ frame done
//!  │  single-shot     │                           │
//!  └──────────────────┴───────────────────────────┘
//!        (abort / forced idle from any state)
//! ```

use crate::error::{AppResult, PanelError};
use crate::view::{Badge, Indicator};
use serde::Serialize;
use uuid::Uuid;

/// Derived lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// No acquisition loop active
    Idle,
    /// Loop active, no stop requested
    Running,
    /// Loop active, will halt after the in-flight frame
    Stopping,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// What the image loop should do after a frame arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Issue the next main-image request
    Continue,
    /// The run is over; the session is back to idle
    Finished,
}

/// Run/stop flags plus bookkeeping for the current run.
///
/// `stop_requested` is only meaningful while `running` is true; both are cleared
/// whenever a run terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// An acquisition loop is active
    pub running: bool,
    /// The loop halts after the in-flight frame
    pub stop_requested: bool,
    /// Identifier of the active run
    pub run_id: Option<Uuid>,
    /// Main images received during the active (or last) run
    pub frames: u64,
    /// Run ends once this many frames have been received
    pub frame_limit: Option<u64>,
    /// Why the last run ended, if it ended on an error
    pub last_error: Option<String>,
}

impl SessionState {
    /// Lifecycle state derived from the two flags.
    pub fn run_state(&self) -> RunState {
        match (self.running, self.stop_requested) {
            (false, _) => RunState::Idle,
            (true, false) => RunState::Running,
            (true, true) => RunState::Stopping,
        }
    }

    /// `Idle → Running`. Returns the label to display.
    ///
    /// With `frame_limit`, a continuous run finishes on its own once that many
    /// frames have arrived.
    pub fn begin(
        &mut self,
        run_id: Uuid,
        continuous: bool,
        frame_limit: Option<u64>,
    ) -> AppResult<Indicator> {
        if self.running {
            return Err(PanelError::AlreadyRunning);
        }
        self.running = true;
        self.stop_requested = false;
        self.run_id = Some(run_id);
        self.frames = 0;
        self.frame_limit = frame_limit;
        self.last_error = None;
        Ok(running_label(continuous))
    }

    /// `Running → Stopping`. A stop while idle (or already stopping) is a no-op
    /// and yields `None`.
    pub fn request_stop(&mut self) -> Option<Indicator> {
        if self.run_state() != RunState::Running {
            return None;
        }
        self.stop_requested = true;
        Some(stopping_label())
    }

    /// Record a received frame and decide whether the loop goes on.
    pub fn complete_frame(&mut self, continuous: bool) -> FrameOutcome {
        self.frames += 1;
        let limit_reached = self.frame_limit.is_some_and(|limit| self.frames >= limit);
        if continuous && !self.stop_requested && !limit_reached {
            FrameOutcome::Continue
        } else {
            self.reset(None);
            FrameOutcome::Finished
        }
    }

    /// Return to idle from any state, remembering `error` if the run failed.
    pub fn reset(&mut self, error: Option<String>) {
        self.running = false;
        self.stop_requested = false;
        self.run_id = None;
        if error.is_some() {
            self.last_error = error;
        }
    }

    /// Whether `run_id` is still the run this session is tracking.
    pub fn owns(&self, run_id: Uuid) -> bool {
        self.running && self.run_id == Some(run_id)
    }
}

/// `"Running (cont.)"` / `"Running (single)"`
pub fn running_label(continuous: bool) -> Indicator {
    let text = if continuous {
        "Running (cont.)"
    } else {
        "Running (single)"
    };
    Indicator::new(text, Badge::Success)
}

/// `"Stopping..."`
pub fn stopping_label() -> Indicator {
    Indicator::new("Stopping...", Badge::Danger)
}

/// `"Idle"`
pub fn idle_label() -> Indicator {
    Indicator::new("Idle", Badge::Secondary)
}

/// Debug panel display state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DebugState {
    /// Panels hidden
    #[default]
    Off,
    /// Enabled, no reference plot received yet
    Waiting,
    /// Panels revealed
    On,
}

impl DebugState {
    /// Toggle turned on. Only `Off` moves (to `Waiting`); returns whether it did.
    pub fn enable(&mut self) -> bool {
        if *self == DebugState::Off {
            *self = DebugState::Waiting;
            true
        } else {
            false
        }
    }

    /// Toggle turned off, from any state.
    pub fn disable(&mut self) {
        *self = DebugState::Off;
    }

    /// The reference plot arrived. Returns true when the panels should be
    /// revealed; a plot landing after the toggle went off is ignored.
    pub fn reference_arrived(&mut self) -> bool {
        match self {
            DebugState::Off => false,
            DebugState::Waiting | DebugState::On => {
                *self = DebugState::On;
                true
            }
        }
    }
}
