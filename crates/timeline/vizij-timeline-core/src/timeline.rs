//! Timeline: virtual clock + scheduler over a host anchor clock.
//!
//! Methods:
//! - current_time / set_current_time (seek; forward seeks sweep due calls)
//! - playback_rate / set_playback_rate (mirrored onto every child)
//! - schedule (offset child player), call (absolute-time callback), remove
//! - notify_finished (host wake-up from call proxies)

use std::cell::Cell;
use std::fmt;

use log::{debug, trace, warn};

use crate::calls::{CallKey, CallQueue};
use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::host::{Clock, ClockHost, Keyframe, Timing};

/// Callback fired once the timeline reaches its due time.
pub type Callback<H> = Box<dyn FnOnce(&mut Timeline<H>)>;

#[derive(Clone, Copy, Debug)]
enum ChildKind {
    Player,
    /// Zero-length clock that exists to finish at a pending call's due time.
    CallProxy(CallKey),
}

#[derive(Debug)]
struct Child<C> {
    /// Child local time = offset + timeline time.
    offset: f64,
    clock: C,
    kind: ChildKind,
}

/// A manager of many host clocks kept in step with one anchor clock, plus
/// callbacks at absolute timeline times.
pub struct Timeline<H: ClockHost> {
    host: H,
    cfg: TimelineConfig,
    anchor_target: H::Target,
    anchor: H::Clock,
    /// Last resolved anchor time; served while the anchor reports none.
    local_time: Cell<f64>,
    children: Vec<Child<H::Clock>>,
    calls: CallQueue<Callback<H>>,
}

impl<H: ClockHost> fmt::Debug for Timeline<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("current_time", &self.current_time())
            .field("playback_rate", &self.playback_rate())
            .field("children", &self.children.len())
            .field("pending_calls", &self.calls.len())
            .finish()
    }
}

fn ensure_finite(time: f64) -> Result<()> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(TimelineError::InvalidTime { time })
    }
}

impl<H: ClockHost> Timeline<H> {
    /// Create a timeline with the default anchor configuration.
    pub fn new(host: H) -> Result<Self> {
        Self::with_config(host, TimelineConfig::default())
    }

    /// Create a timeline, starting its anchor clock on the host.
    pub fn with_config(mut host: H, cfg: TimelineConfig) -> Result<Self> {
        if !host.supports_clocks() {
            return Err(TimelineError::Precondition {
                reason: "host cannot create clocks".into(),
            });
        }
        let anchor_target = host.anchor_target();
        let anchor = host.create_clock(&anchor_target, &[], &cfg.anchor_timing)?;
        if anchor.playback_rate() != cfg.initial_playback_rate {
            anchor.set_playback_rate(cfg.initial_playback_rate);
        }

        Ok(Self {
            host,
            cfg,
            anchor_target,
            anchor,
            local_time: Cell::new(0.0),
            children: Vec::new(),
            calls: CallQueue::new(),
        })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.cfg
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of live children, call proxies included.
    pub fn children_len(&self) -> usize {
        self.children.len()
    }

    pub fn pending_calls_len(&self) -> usize {
        self.calls.len()
    }

    /// Due times of pending calls, in firing order.
    pub fn pending_call_times(&self) -> Vec<f64> {
        self.calls.whens().collect()
    }

    /// Current timeline time. Falls back to the last resolved value while the
    /// anchor reports an unresolved time (some hosts do after a rate change).
    pub fn current_time(&self) -> f64 {
        match self.anchor.current_time() {
            Some(time) if !time.is_nan() => {
                self.local_time.set(time);
                time
            }
            _ => {
                let fallback = self.local_time.get();
                debug!("anchor time unresolved, using cached local time {fallback}");
                fallback
            }
        }
    }

    /// Seek the timeline. Every child moves to `offset + time`; only a forward
    /// seek runs due calls. Non-finite times are ignored.
    pub fn set_current_time(&mut self, time: f64) {
        if !time.is_finite() {
            warn!("ignoring seek to non-finite time {time}");
            return;
        }
        let seek_forward = time > self.current_time();

        self.anchor.set_current_time(time);
        self.local_time.set(time);
        for child in &self.children {
            child.clock.set_current_time(child.offset + time);
        }
        trace!(
            "seek to {time} ({} children, forward = {seek_forward})",
            self.children.len()
        );

        if seek_forward {
            self.sweep_due_calls();
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.anchor.playback_rate()
    }

    /// Change the rate of the anchor and every child.
    pub fn set_playback_rate(&mut self, rate: f64) {
        let now = self.current_time();
        self.local_time.set(now);

        self.anchor.set_playback_rate(rate);
        for child in &self.children {
            child.clock.set_playback_rate(rate);
        }
    }

    /// Schedule a player on `target` with local time `now - when`, which is
    /// also its fixed offset from timeline time. `when` may be in the past.
    /// Returns the clock so it can be removed later.
    pub fn schedule(
        &mut self,
        when: f64,
        target: &H::Target,
        steps: &[Keyframe],
        timing: impl Into<Timing>,
    ) -> Result<H::Clock> {
        ensure_finite(when)?;
        self.spawn_child(when, target, steps, &timing.into(), ChildKind::Player)
    }

    fn spawn_child(
        &mut self,
        when: f64,
        target: &H::Target,
        steps: &[Keyframe],
        timing: &Timing,
        kind: ChildKind,
    ) -> Result<H::Clock> {
        let now = self.current_time();
        let clock = self.host.create_clock(target, steps, timing)?;

        let offset = now - when;
        clock.set_playback_rate(self.anchor.playback_rate());
        clock.set_current_time(offset);

        self.children.push(Child {
            offset,
            clock: clock.clone(),
            kind,
        });
        Ok(clock)
    }

    /// Call `callback` once the timeline reaches `when`. `when` must not be
    /// before the current time, even if the playback rate is negative.
    pub fn call<F>(&mut self, when: f64, callback: F) -> Result<()>
    where
        F: FnOnce(&mut Timeline<H>) + 'static,
    {
        ensure_finite(when)?;
        let now = self.current_time();
        if when < now {
            return Err(TimelineError::InvalidSchedule {
                when,
                behind: now - when,
            });
        }

        // The proxy finishes at `when` and wakes the sweep.
        let key = CallKey {
            when,
            seq: self.calls.watermark(),
        };
        let target = self.anchor_target.clone();
        let proxy = self.spawn_child(
            when,
            &target,
            &[],
            &Timing::from(0.0),
            ChildKind::CallProxy(key),
        )?;
        self.host.watch_finish(&proxy);

        let inserted = self.calls.insert(when, Box::new(callback));
        debug_assert_eq!(inserted, key);
        Ok(())
    }

    /// Remove a player returned by [`Timeline::schedule`], or everything
    /// (players, proxies and pending calls) when `player` is `None`.
    pub fn remove(&mut self, player: Option<&H::Clock>) -> Result<()> {
        match player {
            Some(clock) => self.remove_player(clock),
            None => {
                self.remove_all();
                Ok(())
            }
        }
    }

    fn remove_player(&mut self, clock: &H::Clock) -> Result<()> {
        if !clock.can_cancel() {
            return Err(TimelineError::InvalidArgument {
                reason: "remove expects a cancellable player".into(),
            });
        }
        clock.cancel();

        match self.children.iter().position(|c| c.clock.same_clock(clock)) {
            Some(index) => {
                self.children.remove(index);
            }
            None => warn!("removed a player this timeline does not track"),
        }
        Ok(())
    }

    fn remove_all(&mut self) {
        for child in self.children.drain(..) {
            if matches!(child.kind, ChildKind::CallProxy(_)) {
                self.host.unwatch(&child.clock);
            }
            child.clock.cancel();
        }
        self.calls.clear();
    }

    /// Host entry point for a finish notification. Sweeps due calls when the
    /// clock is one of this timeline's call proxies; returns how many fired.
    pub fn notify_finished(&mut self, clock: &H::Clock) -> usize {
        let is_proxy = self
            .children
            .iter()
            .any(|c| matches!(c.kind, ChildKind::CallProxy(_)) && c.clock.same_clock(clock));
        if is_proxy {
            self.sweep_due_calls()
        } else {
            0
        }
    }

    /// Fire every pending call due at the current time, earliest first, each
    /// exactly once. Calls registered by a callback during the sweep wait for
    /// the next one. The time is re-read before each call, so a callback that
    /// seeks backward holds back the rest.
    pub fn sweep_due_calls(&mut self) -> usize {
        let watermark = self.calls.watermark();

        let mut fired = 0;
        loop {
            let now = self.current_time();
            let Some((key, callback)) = self.calls.pop_due(now, watermark) else {
                break;
            };
            trace!("firing call due at {} (seq {})", key.when, key.seq);
            callback(&mut *self);
            fired += 1;
        }
        if fired > 0 {
            self.retire_spent_proxies();
        }
        fired
    }

    /// Cancel and unwatch proxies whose call has fired or been cleared.
    fn retire_spent_proxies(&mut self) {
        let Self {
            host,
            calls,
            children,
            ..
        } = self;
        children.retain(|child| match child.kind {
            ChildKind::CallProxy(key) if !calls.contains(&key) => {
                host.unwatch(&child.clock);
                child.clock.cancel();
                false
            }
            _ => true,
        });
    }
}
