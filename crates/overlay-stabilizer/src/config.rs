//! Stabilizer configuration and per-context timing budgets

use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_core_types::DEVICE_PIXEL_TOLERANCE;

use crate::errors::StabilizerError;

/// Polling budget for one stabilization context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingProfile {
    /// Samples taken before giving up and forcing the overlay visible
    pub max_attempts: u32,

    /// Gap between samples (milliseconds)
    pub check_interval_ms: u64,

    /// Wait before the first measurement (milliseconds)
    pub initial_delay_ms: u64,
}

impl TimingProfile {
    pub const fn new(max_attempts: u32, check_interval_ms: u64, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            check_interval_ms,
            initial_delay_ms,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    fn validate(&self, name: &str) -> Result<(), StabilizerError> {
        if self.max_attempts == 0 {
            return Err(StabilizerError::InvalidConfig(format!(
                "{name}.max_attempts must be positive"
            )));
        }
        if self.check_interval_ms == 0 {
            return Err(StabilizerError::InvalidConfig(format!(
                "{name}.check_interval_ms must be positive"
            )));
        }
        Ok(())
    }
}

fn default_standard() -> TimingProfile {
    TimingProfile::new(30, 50, 0)
}

fn default_in_modal() -> TimingProfile {
    TimingProfile::new(50, 100, 300)
}

fn default_in_expanding_nav() -> TimingProfile {
    TimingProfile::new(60, 80, 400)
}

fn default_stable_samples() -> u32 {
    3
}

fn default_settled_samples() -> u32 {
    5
}

fn default_max_ancestor_hops() -> u8 {
    10
}

fn default_tolerance_px() -> f64 {
    DEVICE_PIXEL_TOLERANCE
}

fn default_true() -> bool {
    true
}

fn default_modal_selectors() -> Vec<String> {
    vec![
        "[role=\"dialog\"]".to_string(),
        "[aria-modal=\"true\"]".to_string(),
        ".modal".to_string(),
        "[data-portal]".to_string(),
    ]
}

fn default_nav_selectors() -> Vec<String> {
    vec![
        "nav".to_string(),
        "[role=\"navigation\"]".to_string(),
        "[role=\"menu\"]".to_string(),
        ".sidebar".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    #[serde(default = "default_standard")]
    pub standard: TimingProfile,

    #[serde(default = "default_in_modal")]
    pub in_modal: TimingProfile,

    #[serde(default = "default_in_expanding_nav")]
    pub in_expanding_nav: TimingProfile,

    /// Consecutive unchanged samples before the position is reported stable
    #[serde(default = "default_stable_samples")]
    pub stable_samples: u32,

    /// Consecutive unchanged samples before polling stops
    #[serde(default = "default_settled_samples")]
    pub settled_samples: u32,

    /// Parent links walked when looking for a visible ancestor
    #[serde(default = "default_max_ancestor_hops")]
    pub max_ancestor_hops: u8,

    /// Per-edge movement (px) still treated as unchanged
    #[serde(default = "default_tolerance_px")]
    pub tolerance_px: f64,

    /// Re-sample immediately on mutations of the target's subtree
    #[serde(default = "default_true")]
    pub observe_mutations: bool,

    #[serde(default = "default_modal_selectors")]
    pub modal_selectors: Vec<String>,

    #[serde(default = "default_nav_selectors")]
    pub nav_selectors: Vec<String>,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            standard: default_standard(),
            in_modal: default_in_modal(),
            in_expanding_nav: default_in_expanding_nav(),
            stable_samples: default_stable_samples(),
            settled_samples: default_settled_samples(),
            max_ancestor_hops: default_max_ancestor_hops(),
            tolerance_px: default_tolerance_px(),
            observe_mutations: true,
            modal_selectors: default_modal_selectors(),
            nav_selectors: default_nav_selectors(),
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<(), StabilizerError> {
        self.standard.validate("standard")?;
        self.in_modal.validate("in_modal")?;
        self.in_expanding_nav.validate("in_expanding_nav")?;

        if self.stable_samples == 0 {
            return Err(StabilizerError::InvalidConfig(
                "stable_samples must be positive".to_string(),
            ));
        }
        if self.settled_samples < self.stable_samples {
            return Err(StabilizerError::InvalidConfig(format!(
                "settled_samples ({}) must not be below stable_samples ({})",
                self.settled_samples, self.stable_samples
            )));
        }
        if !(self.tolerance_px >= 0.0) {
            return Err(StabilizerError::InvalidConfig(
                "tolerance_px must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
