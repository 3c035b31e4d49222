//! Vizij Timeline Core (engine-agnostic)
//!
//! A virtual clock that keeps many time-offset child players in step with one
//! anchor clock, and fires absolute-time callbacks in order, exactly once.
//!
//! The timeline never owns a timer. It drives host clocks through the
//! [`ClockHost`]/[`Clock`] seam and wakes up on seeks and on "finish"
//! notifications from zero-length proxy clocks. Adapters (wasm, tests) provide
//! the host; [`ManualHost`] is a deterministic in-memory one.

pub mod apply;
pub mod calls;
pub mod config;
pub mod error;
pub mod host;
pub mod manual;
pub mod timeline;

// Re-exports for consumers (adapters)
pub use apply::{final_state, Effect, FinalState, StyleSink};
pub use config::TimelineConfig;
pub use error::{Result, TimelineError};
pub use host::{Clock, ClockHost, Keyframe, PropertyValue, Timing};
pub use manual::{HostQuirks, ManualClock, ManualHost, ManualTarget};
pub use timeline::Timeline;
