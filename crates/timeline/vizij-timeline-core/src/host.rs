//! Host contracts: the clock primitive the timeline is built on.
//!
//! A host hands out clocks on targets. Clocks are shared handles with their own
//! local time and rate; cloning one yields another handle to the same clock,
//! and [`Clock::same_clock`] compares identity the way script object identity
//! works. Hosts deliver "finish" notifications for watched clocks by calling
//! [`Timeline::notify_finished`](crate::Timeline::notify_finished).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single keyframe property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

/// One keyframe: property name -> value, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyframe(pub IndexMap<String, PropertyValue>);

impl Keyframe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property insert.
    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Timing of a clock, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub duration: f64,
    /// Number of iterations; `None` (or a non-finite count) repeats forever.
    #[serde(default = "one_iteration")]
    pub iterations: Option<f64>,
}

fn one_iteration() -> Option<f64> {
    Some(1.0)
}

impl Timing {
    /// Local time at which the clock finishes, if it ever does.
    pub fn end_time(&self) -> Option<f64> {
        match self.iterations {
            Some(n) if n.is_finite() => Some((self.duration * n).max(0.0)),
            _ => None,
        }
    }
}

/// A bare number is a single iteration of that duration.
impl From<f64> for Timing {
    fn from(duration: f64) -> Self {
        Self {
            duration,
            iterations: one_iteration(),
        }
    }
}

/// A host clock handle.
///
/// Methods take `&self`: clocks are shared with the host, which advances them
/// on its own.
pub trait Clock: Clone {
    /// Local time, or `None` while the host reports it as unresolved.
    fn current_time(&self) -> Option<f64>;
    fn set_current_time(&self, time: f64);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    /// Whether this handle supports [`Clock::cancel`].
    fn can_cancel(&self) -> bool {
        true
    }
    fn cancel(&self);
    /// Identity comparison between two handles.
    fn same_clock(&self, other: &Self) -> bool;
}

/// Environment that creates clocks on targets.
pub trait ClockHost {
    type Target: Clone;
    type Clock: Clock;

    /// False when the host cannot create clocks at all.
    fn supports_clocks(&self) -> bool;

    /// Target owned by the timeline, used for the anchor and call proxies.
    fn anchor_target(&mut self) -> Self::Target;

    /// Start a new clock running `steps` on `target`.
    fn create_clock(
        &mut self,
        target: &Self::Target,
        steps: &[Keyframe],
        timing: &Timing,
    ) -> Result<Self::Clock>;

    /// Arrange for a finish notification on `clock` to reach the timeline.
    fn watch_finish(&mut self, clock: &Self::Clock);

    /// Release whatever [`ClockHost::watch_finish`] set up for `clock`. Called
    /// once the timeline no longer needs its finish.
    fn unwatch(&mut self, _clock: &Self::Clock) {}
}
