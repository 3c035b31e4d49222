//! Web Animations host: clocks are `Animation` objects created with
//! `Element.animate`, driven through `Reflect` so no DOM bindings are needed.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use js_sys::{Function, Object, Reflect};
use log::warn;
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use vizij_timeline_core::{Clock, ClockHost, Keyframe, Result, Timeline, TimelineError, Timing};

/// JS callbacks that came due, run once the timeline is no longer borrowed.
pub(crate) type ReadyCalls = Rc<RefCell<VecDeque<Function>>>;

pub(crate) fn prop(obj: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(obj, &JsValue::from_str(key)).ok()
}

pub(crate) fn method(obj: &JsValue, name: &str) -> Option<Function> {
    prop(obj, name)?.dyn_into::<Function>().ok()
}

/// Invoke ready callbacks in firing order, one at a time, so clearing the
/// queue from inside a callback stops the rest.
pub(crate) fn run_ready(ready: &ReadyCalls) {
    loop {
        let Some(f) = ready.borrow_mut().pop_front() else {
            break;
        };
        if let Err(e) = f.call0(&JsValue::UNDEFINED) {
            warn!("timeline callback threw: {e:?}");
        }
    }
}

pub(crate) fn set_prop(obj: &JsValue, key: &str, value: &JsValue) {
    if !matches!(Reflect::set(obj, &JsValue::from_str(key), value), Ok(true)) {
        warn!("could not set {key}");
    }
}

fn timing_to_js(timing: &Timing) -> JsValue {
    let options: JsValue = Object::new().into();
    let iterations = timing.iterations.unwrap_or(f64::INFINITY);
    set_prop(&options, "duration", &timing.duration.into());
    set_prop(&options, "iterations", &iterations.into());
    options
}

/// Handle to a script `Animation`.
#[derive(Clone, Debug)]
pub struct JsClock(pub JsValue);

impl Clock for JsClock {
    fn current_time(&self) -> Option<f64> {
        prop(&self.0, "currentTime").and_then(|v| v.as_f64())
    }

    fn set_current_time(&self, time: f64) {
        set_prop(&self.0, "currentTime", &time.into());
    }

    fn playback_rate(&self) -> f64 {
        prop(&self.0, "playbackRate")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0)
    }

    fn set_playback_rate(&self, rate: f64) {
        set_prop(&self.0, "playbackRate", &rate.into());
    }

    fn can_cancel(&self) -> bool {
        method(&self.0, "cancel").is_some()
    }

    fn cancel(&self) {
        match method(&self.0, "cancel").map(|cancel| cancel.call0(&self.0)) {
            Some(Ok(_)) => {}
            Some(Err(e)) => warn!("cancel threw: {e:?}"),
            None => warn!("animation has no cancel()"),
        }
    }

    fn same_clock(&self, other: &Self) -> bool {
        Object::is(&self.0, &other.0)
    }
}

type FinishListener = Closure<dyn FnMut()>;

/// Host backed by the page's Web Animations implementation.
pub struct JsHost {
    anchor: JsValue,
    owner: Weak<RefCell<Timeline<JsHost>>>,
    ready: ReadyCalls,
    /// Finish listeners of live call proxies.
    listeners: Vec<(JsClock, FinishListener)>,
    /// Detached listeners, dropped once no finish listener is running.
    spent: Vec<FinishListener>,
    /// Finish listeners currently on the stack.
    dispatching: Rc<Cell<u32>>,
}

impl JsHost {
    /// `anchor` is the element the timeline animates its anchor and proxies on.
    pub fn new(anchor: JsValue) -> Self {
        Self {
            anchor,
            owner: Weak::new(),
            ready: Rc::default(),
            listeners: Vec::new(),
            spent: Vec::new(),
            dispatching: Rc::default(),
        }
    }

    /// Point finish listeners at the shared timeline.
    pub(crate) fn bind(&mut self, owner: Weak<RefCell<Timeline<JsHost>>>) {
        self.owner = owner;
    }

    pub(crate) fn ready(&self) -> ReadyCalls {
        self.ready.clone()
    }

    /// Drop detached listeners unless one of them may still be executing.
    pub(crate) fn release_spent(&mut self) {
        if self.dispatching.get() == 0 {
            self.spent.clear();
        }
    }

    /// Number of finish listeners still attached to proxies.
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ClockHost for JsHost {
    type Target = JsValue;
    type Clock = JsClock;

    fn supports_clocks(&self) -> bool {
        method(&self.anchor, "animate").is_some()
    }

    fn anchor_target(&mut self) -> JsValue {
        self.anchor.clone()
    }

    fn create_clock(
        &mut self,
        target: &JsValue,
        steps: &[Keyframe],
        timing: &Timing,
    ) -> Result<JsClock> {
        let animate = method(target, "animate")
            .ok_or_else(|| TimelineError::host("target has no animate()"))?;
        let frames = steps
            .serialize(&swb::Serializer::json_compatible())
            .map_err(|e| TimelineError::host(format!("keyframes: {e}")))?;
        let anim = animate
            .call2(target, &frames, &timing_to_js(timing))
            .map_err(|e| TimelineError::host(format!("animate failed: {e:?}")))?;
        Ok(JsClock(anim))
    }

    fn watch_finish(&mut self, clock: &JsClock) {
        self.release_spent();

        let owner = self.owner.clone();
        let ready = self.ready.clone();
        let dispatching = self.dispatching.clone();
        let proxy = clock.clone();
        let on_finish = Closure::wrap(Box::new(move || {
            let Some(timeline) = owner.upgrade() else {
                return;
            };
            dispatching.set(dispatching.get() + 1);
            if let Ok(mut tl) = timeline.try_borrow_mut() {
                tl.notify_finished(&proxy);
            } else {
                warn!("finish delivered while the timeline was busy");
            }
            run_ready(&ready);
            dispatching.set(dispatching.get() - 1);
        }) as Box<dyn FnMut()>);

        match method(&clock.0, "addEventListener")
            .map(|add| add.call2(&clock.0, &"finish".into(), on_finish.as_ref()))
        {
            Some(Ok(_)) => {}
            Some(Err(e)) => warn!("addEventListener threw: {e:?}"),
            None => warn!("call proxy has no addEventListener()"),
        }
        self.listeners.push((clock.clone(), on_finish));
    }

    fn unwatch(&mut self, clock: &JsClock) {
        let Some(index) = self
            .listeners
            .iter()
            .position(|(proxy, _)| proxy.same_clock(clock))
        else {
            return;
        };
        let (proxy, on_finish) = self.listeners.swap_remove(index);
        if let Some(remove) = method(&proxy.0, "removeEventListener") {
            if let Err(e) = remove.call2(&proxy.0, &"finish".into(), on_finish.as_ref()) {
                warn!("removeEventListener threw: {e:?}");
            }
        }
        self.spent.push(on_finish);
        self.release_spent();
    }
}
