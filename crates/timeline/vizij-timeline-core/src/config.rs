//! Core configuration for vizij-timeline-core.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::host::Timing;

/// Configuration for the anchor clock a timeline is built on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Timing of the anchor clock. It carries no keyframes, so only the
    /// iteration count matters: leave it unbounded so the anchor never finishes.
    pub anchor_timing: Timing,
    /// Rate applied to the anchor (and mirrored onto children) at construction.
    pub initial_playback_rate: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            anchor_timing: Timing {
                duration: 1000.0,
                iterations: None,
            },
            initial_playback_rate: 1.0,
        }
    }
}

impl TimelineConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| TimelineError::InvalidArgument {
            reason: format!("config error: {e}"),
        })
    }
}
