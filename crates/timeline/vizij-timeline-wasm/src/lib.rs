//! vizij-timeline-wasm: wasm-bindgen wrapper that runs the Vizij timeline on
//! the page's Web Animations objects.
//!
//! Callbacks registered with `call` run after the timeline operation that made
//! them due has returned, so they may freely read or drive the timeline.
//! `remove()` from inside one drops the callbacks still waiting to run.

mod effect;
mod host;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use vizij_timeline_core::{final_state, Timeline, TimelineConfig, TimelineError, Timing};

pub use crate::effect::{effect_from_js, keyframes_from_js, InlineStyle};
pub use crate::host::{JsClock, JsHost};
use crate::host::{run_ready, ReadyCalls};

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn to_js_error(e: TimelineError) -> JsError {
    JsError::new(&e.to_string())
}

/// A bare number is a duration; otherwise `{ duration, iterations }`.
fn timing_from_js(timing: JsValue) -> Result<Timing, JsError> {
    if jsvalue_is_undefined_or_null(&timing) {
        return Ok(Timing::from(0.0));
    }
    if let Some(duration) = timing.as_f64() {
        return Ok(Timing::from(duration));
    }
    swb::from_value(timing).map_err(|e| JsError::new(&format!("timing error: {e}")))
}

#[wasm_bindgen]
pub struct WebTimeline {
    inner: Rc<RefCell<Timeline<JsHost>>>,
    ready: ReadyCalls,
}

#[wasm_bindgen]
impl WebTimeline {
    /// Create a timeline anchored on `anchor` (an element supporting `animate`).
    /// Pass a JSON config object or undefined/null for defaults.
    /// Example:
    ///   new WebTimeline(document.createElement('div'), { initial_playback_rate: 2 })
    #[wasm_bindgen(constructor)]
    pub fn new(anchor: JsValue, config: JsValue) -> Result<WebTimeline, JsError> {
        console_error_panic_hook::set_once();

        let cfg: TimelineConfig = if jsvalue_is_undefined_or_null(&config) {
            TimelineConfig::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };

        let host = JsHost::new(anchor);
        let ready = host.ready();
        let timeline = Timeline::with_config(host, cfg).map_err(to_js_error)?;
        let inner = Rc::new(RefCell::new(timeline));
        inner.borrow_mut().host_mut().bind(Rc::downgrade(&inner));
        Ok(WebTimeline { inner, ready })
    }

    #[wasm_bindgen(getter = currentTime)]
    pub fn current_time(&self) -> f64 {
        self.inner.borrow().current_time()
    }

    #[wasm_bindgen(setter = currentTime)]
    pub fn set_current_time(&self, time: f64) {
        self.inner.borrow_mut().set_current_time(time);
        self.settle();
    }

    #[wasm_bindgen(getter = playbackRate)]
    pub fn playback_rate(&self) -> f64 {
        self.inner.borrow().playback_rate()
    }

    #[wasm_bindgen(setter = playbackRate)]
    pub fn set_playback_rate(&self, rate: f64) {
        self.inner.borrow_mut().set_playback_rate(rate);
    }

    /// Number of callbacks still waiting for their time.
    #[wasm_bindgen(getter = pendingCalls)]
    pub fn pending_calls(&self) -> u32 {
        self.inner.borrow().pending_calls_len() as u32
    }

    /// Number of finish listeners held for call proxies.
    #[wasm_bindgen(getter = finishListeners)]
    pub fn finish_listeners(&self) -> u32 {
        self.inner.borrow().host().listener_count() as u32
    }

    /// Schedule `steps` on `target` as if started at `when`. Returns the Animation.
    #[wasm_bindgen]
    pub fn schedule(
        &self,
        when: f64,
        target: JsValue,
        steps: JsValue,
        timing: JsValue,
    ) -> Result<JsValue, JsError> {
        let steps = keyframes_from_js(&steps)?;
        let timing = timing_from_js(timing)?;
        let clock = self
            .inner
            .borrow_mut()
            .schedule(when, &target, &steps, timing)
            .map_err(to_js_error)?;
        Ok(clock.0)
    }

    /// Call `callback` once the timeline reaches `when`, which must not be in the past.
    #[wasm_bindgen]
    pub fn call(&self, when: f64, callback: Function) -> Result<(), JsError> {
        let ready = self.ready.clone();
        self.inner
            .borrow_mut()
            .call(when, move |_| ready.borrow_mut().push_back(callback))
            .map_err(to_js_error)
    }

    /// Remove an Animation returned by `schedule`, or everything when undefined.
    #[wasm_bindgen]
    pub fn remove(&self, player: JsValue) -> Result<(), JsError> {
        let removed = if jsvalue_is_undefined_or_null(&player) {
            self.ready.borrow_mut().clear();
            self.inner.borrow_mut().remove(None)
        } else {
            self.inner.borrow_mut().remove(Some(&JsClock(player)))
        };
        if let Ok(mut tl) = self.inner.try_borrow_mut() {
            tl.host_mut().release_spent();
        }
        removed.map_err(to_js_error)
    }
}

impl WebTimeline {
    /// Run callbacks made due by the last operation, then free detached
    /// finish listeners.
    fn settle(&self) {
        run_ready(&self.ready);
        if let Ok(mut tl) = self.inner.try_borrow_mut() {
            tl.host_mut().release_spent();
        }
    }
}

/// Apply the final state of an effect (Animation, group, keyframe effect or
/// keyframe array) as inline style. `target` is required for bare keyframes
/// and otherwise restricts application to that element.
#[wasm_bindgen(js_name = applyFinalState)]
pub fn apply_final_state(effect: JsValue, target: JsValue) -> Result<(), JsError> {
    let effect = effect_from_js(&effect)?;
    let filter = if jsvalue_is_undefined_or_null(&target) {
        None
    } else {
        Some(&target)
    };
    let state = final_state(&effect, filter).map_err(to_js_error)?;
    state.apply(&mut InlineStyle);
    Ok(())
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
