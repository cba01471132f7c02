//! Operator toggles and the mode snapshot taken from them.
//!
//! [`Toggles`] plays the part of the panel's switches: it can be flipped from the
//! console at any moment, including while a request is in flight. The image loop
//! takes a fresh [`ModeSelection`] whenever it needs one, so the last change wins.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Acquisition mode as read at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeSelection {
    /// Re-issue the main image after each load (false = single shot)
    pub continuous: bool,
    /// 1D range plot instead of the 2D image
    pub one_dimensional: bool,
    /// Ask the server to synthesize data instead of reading the hardware
    pub simulated: bool,
    /// Fetch debug plots alongside each main image
    pub debug_requested: bool,
}

impl Default for ModeSelection {
    fn default() -> Self {
        Self {
            continuous: true,
            one_dimensional: false,
            simulated: false,
            debug_requested: false,
        }
    }
}

/// Shared, lock-free switch bank.
#[derive(Debug)]
pub struct Toggles {
    continuous: AtomicBool,
    one_dimensional: AtomicBool,
    simulated: AtomicBool,
    debug: AtomicBool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self::new(ModeSelection::default())
    }
}

impl Toggles {
    /// Switch bank starting at `initial`.
    pub fn new(initial: ModeSelection) -> Self {
        Self {
            continuous: AtomicBool::new(initial.continuous),
            one_dimensional: AtomicBool::new(initial.one_dimensional),
            simulated: AtomicBool::new(initial.simulated),
            debug: AtomicBool::new(initial.debug_requested),
        }
    }

    /// Current position of every switch.
    pub fn snapshot(&self) -> ModeSelection {
        ModeSelection {
            continuous: self.continuous.load(Ordering::Acquire),
            one_dimensional: self.one_dimensional.load(Ordering::Acquire),
            simulated: self.simulated.load(Ordering::Acquire),
            debug_requested: self.debug.load(Ordering::Acquire),
        }
    }

    /// Continuous or single-shot.
    pub fn set_continuous(&self, on: bool) {
        self.continuous.store(on, Ordering::Release);
    }

    /// 1D or 2D display.
    pub fn set_one_dimensional(&self, on: bool) {
        self.one_dimensional.store(on, Ordering::Release);
    }

    /// Simulated or live data.
    pub fn set_simulated(&self, on: bool) {
        self.simulated.store(on, Ordering::Release);
    }

    /// Only flips the switch. Use `AcquisitionController::set_debug` to also
    /// drive the debug panel state.
    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_panel_switches() {
        let mode = Toggles::default().snapshot();
        assert!(mode.continuous);
        assert!(!mode.one_dimensional);
        assert!(!mode.simulated);
        assert!(!mode.debug_requested);
    }

    #[test]
    fn snapshot_reflects_latest_change() {
        let toggles = Toggles::default();
        let before = toggles.snapshot();
        toggles.set_continuous(false);
        toggles.set_simulated(true);
        let after = toggles.snapshot();
        assert!(before.continuous);
        assert!(!after.continuous);
        assert!(after.simulated);
    }
}
