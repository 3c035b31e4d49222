//! Error types for the timeline.

use serde::{Deserialize, Serialize};

/// Timeline result type
pub type Result<T> = core::result::Result<T, TimelineError>;

/// Errors surfaced by timeline operations.
///
/// Every fallible operation either fully succeeds or fails before mutating
/// timeline state, so none of these carry a recovery path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimelineError {
    /// The host cannot create clocks; raised when building a timeline.
    #[error("Timeline requires clock support from the host: {reason}")]
    Precondition { reason: String },

    /// `call` was asked to run a callback before the current time.
    #[error("Timeline doesn't support calls in the past: {behind} before current time (when = {when})")]
    InvalidSchedule { when: f64, behind: f64 },

    /// Time argument was NaN or infinite.
    #[error("Invalid time value: {time}")]
    InvalidTime { time: f64 },

    /// `remove` was handed something that cannot be cancelled.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Final-state application could not resolve a target element.
    #[error("Can't resolve target for effect")]
    MissingTarget,

    /// Final-state application found an effect without keyframes.
    #[error("Effect has no keyframes")]
    NoKeyframes,

    /// The host failed to create or drive a clock.
    #[error("Host error: {reason}")]
    Host { reason: String },
}

impl TimelineError {
    /// Create a host error from any displayable reason.
    pub fn host(reason: impl Into<String>) -> Self {
        Self::Host {
            reason: reason.into(),
        }
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Precondition { .. } => "precondition",
            Self::InvalidSchedule { .. } | Self::InvalidTime { .. } => "schedule",
            Self::InvalidArgument { .. } => "argument",
            Self::MissingTarget | Self::NoKeyframes => "effect",
            Self::Host { .. } => "host",
        }
    }
}
