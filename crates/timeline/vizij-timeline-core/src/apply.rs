//! Final-state application: resolve an effect tree to the style each target
//! ends on, then write it through a [`StyleSink`].
//!
//! Groups recurse depth-first. A keyframe effect contributes its last frame to
//! its own target; a bare keyframe list needs an explicit target. A target
//! filter restricts application to one element.

use crate::error::{Result, TimelineError};
use crate::host::{Keyframe, PropertyValue};

/// Keyframe entries that describe timing rather than style.
const TIMING_KEYS: [&str; 4] = ["offset", "computedOffset", "easing", "composite"];

/// Effect tree accepted by [`final_state`].
#[derive(Clone, Debug, PartialEq)]
pub enum Effect<T> {
    /// Keyframes without a target of their own.
    Keyframes(Vec<Keyframe>),
    /// Keyframes bound to a target.
    Keyframe { target: T, frames: Vec<Keyframe> },
    /// Group or sequence of child effects.
    Group(Vec<Effect<T>>),
}

/// Receives style writes for targets.
pub trait StyleSink<T> {
    fn set_property(&mut self, target: &T, name: &str, value: &PropertyValue);
}

/// Resolved final style per target, ready to apply.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalState<T> {
    writes: Vec<(T, Keyframe)>,
}

impl<T> FinalState<T> {
    /// Write every resolved property. `transform` is mirrored to
    /// `webkitTransform`.
    pub fn apply<S: StyleSink<T> + ?Sized>(&self, sink: &mut S) {
        for (target, frame) in &self.writes {
            for (name, value) in frame.iter() {
                if TIMING_KEYS.contains(&name) {
                    continue;
                }
                sink.set_property(target, name, value);
            }
            if let Some(transform) = frame.get("transform") {
                sink.set_property(target, "webkitTransform", transform);
            }
        }
    }

    /// Number of targets written by [`FinalState::apply`].
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Resolve the final state of `effect`, optionally restricted to `filter`.
pub fn final_state<T: Clone + PartialEq>(
    effect: &Effect<T>,
    filter: Option<&T>,
) -> Result<FinalState<T>> {
    let mut writes = Vec::new();
    collect(effect, filter, &mut writes)?;
    Ok(FinalState { writes })
}

fn collect<T: Clone + PartialEq>(
    effect: &Effect<T>,
    filter: Option<&T>,
    out: &mut Vec<(T, Keyframe)>,
) -> Result<()> {
    let (target, frames) = match effect {
        Effect::Group(children) => {
            for child in children {
                collect(child, filter, out)?;
            }
            return Ok(());
        }
        Effect::Keyframe { target, frames } => {
            if filter.is_some_and(|f| f != target) {
                return Ok(());
            }
            (target, frames)
        }
        Effect::Keyframes(frames) => (filter.ok_or(TimelineError::MissingTarget)?, frames),
    };

    let last = frames.last().ok_or(TimelineError::NoKeyframes)?;
    out.push((target.clone(), last.clone()));
    Ok(())
}
