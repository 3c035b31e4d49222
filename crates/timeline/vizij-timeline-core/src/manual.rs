//! Deterministic in-memory host.
//!
//! `ManualHost` steps its clocks only when told to (`advance`), which makes it
//! the host for tests and headless tools. Finite clocks queue a single finish
//! notification when their local time reaches the end in the direction of
//! play; seeking back before the end re-arms it. Local time is not clamped at
//! the end.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::error::Result;
use crate::host::{Clock, ClockHost, Keyframe, Timing};
use crate::timeline::Timeline;

/// Element stand-in: clocks run "on" a named target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ManualTarget(pub String);

impl From<&str> for ManualTarget {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Host behaviours seen in real animation implementations.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostQuirks {
    /// Report an unresolved time after a rate change until the next seek or step.
    pub invalidate_time_on_rate_change: bool,
}

#[derive(Debug)]
struct ClockState {
    id: u32,
    target: ManualTarget,
    steps: Vec<Keyframe>,
    timing: Timing,
    time: f64,
    unresolved: bool,
    rate: f64,
    cancellable: bool,
    cancelled: bool,
    watched: bool,
    finished: bool,
    finish_pending: bool,
    invalidate_on_rate_change: bool,
}

impl ClockState {
    fn seek(&mut self, time: f64) {
        self.time = time;
        self.unresolved = false;
        self.check_finish();
    }

    fn check_finish(&mut self) {
        let Some(end) = self.timing.end_time() else {
            return;
        };
        let done = if self.rate < 0.0 {
            self.time <= 0.0
        } else {
            self.time >= end
        };
        if !done {
            self.finished = false;
        } else if !self.finished {
            self.finished = true;
            self.finish_pending = self.watched;
        }
    }
}

/// Shared handle to a clock created by [`ManualHost`].
#[derive(Clone, Debug)]
pub struct ManualClock {
    inner: Rc<RefCell<ClockState>>,
}

impl ManualClock {
    pub fn id(&self) -> u32 {
        self.inner.borrow().id
    }

    pub fn target(&self) -> ManualTarget {
        self.inner.borrow().target.clone()
    }

    pub fn steps(&self) -> Vec<Keyframe> {
        self.inner.borrow().steps.clone()
    }

    pub fn timing(&self) -> Timing {
        self.inner.borrow().timing
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.borrow().cancelled
    }

    /// Whether finish notifications for this clock are being delivered.
    pub fn is_watched(&self) -> bool {
        self.inner.borrow().watched
    }

    /// Drop cancellation support from this handle, like a foreign object
    /// passed back from script.
    pub fn without_cancel(self) -> Self {
        self.inner.borrow_mut().cancellable = false;
        self
    }

    fn advance(&self, dt: f64) {
        let mut s = self.inner.borrow_mut();
        if s.cancelled {
            return;
        }
        let next = s.time + dt * s.rate;
        s.seek(next);
    }

    fn take_finish(&self) -> bool {
        let mut s = self.inner.borrow_mut();
        std::mem::take(&mut s.finish_pending)
    }
}

impl Clock for ManualClock {
    fn current_time(&self) -> Option<f64> {
        let s = self.inner.borrow();
        if s.cancelled || s.unresolved {
            None
        } else {
            Some(s.time)
        }
    }

    fn set_current_time(&self, time: f64) {
        let mut s = self.inner.borrow_mut();
        if !s.cancelled {
            s.seek(time);
        }
    }

    fn playback_rate(&self) -> f64 {
        self.inner.borrow().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut s = self.inner.borrow_mut();
        s.rate = rate;
        if s.invalidate_on_rate_change {
            s.unresolved = true;
        }
    }

    fn can_cancel(&self) -> bool {
        self.inner.borrow().cancellable
    }

    fn cancel(&self) {
        let mut s = self.inner.borrow_mut();
        s.cancelled = true;
        s.finish_pending = false;
    }

    fn same_clock(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// In-memory host stepped by hand.
#[derive(Debug)]
pub struct ManualHost {
    clocks: Vec<ManualClock>,
    next_id: u32,
    quirks: HostQuirks,
    supported: bool,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualHost {
    pub fn new() -> Self {
        Self::with_quirks(HostQuirks::default())
    }

    pub fn with_quirks(quirks: HostQuirks) -> Self {
        Self {
            clocks: Vec::new(),
            next_id: 0,
            quirks,
            supported: true,
        }
    }

    /// A host without clock support; building a timeline on it fails.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Live (not cancelled) clocks in creation order, the anchor first.
    pub fn clocks(&self) -> Vec<ManualClock> {
        self.clocks
            .iter()
            .filter(|c| !c.is_cancelled())
            .cloned()
            .collect()
    }

    /// Step every live clock by `dt` milliseconds of wall time, scaled by its rate.
    pub fn advance(&mut self, dt: f64) {
        self.clocks.retain(|c| !c.is_cancelled());
        for clock in &self.clocks {
            clock.advance(dt);
        }
    }

    /// Number of clocks, cancelled ones included, still watched for finish.
    pub fn watched_len(&self) -> usize {
        self.clocks.iter().filter(|c| c.is_watched()).count()
    }

    /// Watched clocks with a queued finish, in creation order.
    pub fn take_finished(&mut self) -> Vec<ManualClock> {
        self.clocks
            .iter()
            .filter(|c| c.take_finish())
            .cloned()
            .collect()
    }
}

impl ClockHost for ManualHost {
    type Target = ManualTarget;
    type Clock = ManualClock;

    fn supports_clocks(&self) -> bool {
        self.supported
    }

    fn anchor_target(&mut self) -> ManualTarget {
        ManualTarget::from("timeline-anchor")
    }

    fn create_clock(
        &mut self,
        target: &ManualTarget,
        steps: &[Keyframe],
        timing: &Timing,
    ) -> Result<ManualClock> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let clock = ManualClock {
            inner: Rc::new(RefCell::new(ClockState {
                id,
                target: target.clone(),
                steps: steps.to_vec(),
                timing: *timing,
                time: 0.0,
                unresolved: false,
                rate: 1.0,
                cancellable: true,
                cancelled: false,
                watched: false,
                finished: false,
                finish_pending: false,
                invalidate_on_rate_change: self.quirks.invalidate_time_on_rate_change,
            })),
        };
        clock.inner.borrow_mut().check_finish();
        self.clocks.push(clock.clone());
        Ok(clock)
    }

    fn watch_finish(&mut self, clock: &ManualClock) {
        let mut s = clock.inner.borrow_mut();
        s.watched = true;
        if s.finished {
            s.finish_pending = true;
        }
    }

    fn unwatch(&mut self, clock: &ManualClock) {
        let mut s = clock.inner.borrow_mut();
        s.watched = false;
        s.finish_pending = false;
    }
}

impl Timeline<ManualHost> {
    /// Let `dt` milliseconds pass on the host, then deliver finish
    /// notifications. Returns how many calls fired.
    pub fn advance(&mut self, dt: f64) -> usize {
        self.host_mut().advance(dt);
        self.deliver_finished()
    }

    /// Deliver queued finish notifications without stepping time.
    pub fn deliver_finished(&mut self) -> usize {
        let finished = self.host_mut().take_finished();
        trace!("delivering {} finish notifications", finished.len());
        finished
            .iter()
            .map(|clock| self.notify_finished(clock))
            .sum()
    }
}
