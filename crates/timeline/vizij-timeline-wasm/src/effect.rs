//! Script-side effect trees and the inline-style sink.

use js_sys::{Array, Object};
use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use vizij_timeline_core::{Effect, Keyframe, PropertyValue, StyleSink};

use crate::host::{method, prop, set_prop};

fn is_present(v: &JsValue) -> bool {
    !(v.is_undefined() || v.is_null())
}

/// Keep string and number entries; drop nulls and nested objects.
fn keyframe_from_js(obj: &JsValue) -> Keyframe {
    let mut frame = Keyframe::new();
    let Some(obj) = obj.dyn_ref::<Object>() else {
        return frame;
    };
    for entry in Object::entries(obj).iter() {
        let pair = Array::from(&entry);
        let Some(name) = pair.get(0).as_string() else {
            continue;
        };
        let value = pair.get(1);
        if let Some(s) = value.as_string() {
            frame = frame.with(&name, s);
        } else if let Some(n) = value.as_f64() {
            frame = frame.with(&name, n);
        }
    }
    frame
}

/// Convert an array of keyframe objects.
pub fn keyframes_from_js(value: &JsValue) -> Result<Vec<Keyframe>, JsError> {
    if !is_present(value) {
        return Ok(Vec::new());
    }
    if !Array::is_array(value) {
        return Err(JsError::new("keyframes must be an array"));
    }
    Ok(Array::from(value).iter().map(|v| keyframe_from_js(&v)).collect())
}

/// Read an `Animation`, group/sequence effect, keyframe effect or keyframe array.
pub fn effect_from_js(value: &JsValue) -> Result<Effect<JsValue>, JsError> {
    if !is_present(value) {
        return Err(JsError::new("effect is null/undefined"));
    }
    if Array::is_array(value) {
        return Ok(Effect::Keyframes(keyframes_from_js(value)?));
    }

    // Animation: look through to its effect.
    if let Some(effect) = prop(value, "effect").filter(is_present) {
        return effect_from_js(&effect);
    }

    if let Some(children) = prop(value, "children").filter(|c| Array::is_array(c)) {
        let children = Array::from(&children)
            .iter()
            .map(|child| effect_from_js(&child))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Effect::Group(children));
    }

    let frames_fn = method(value, "getKeyframes").or_else(|| method(value, "getFrames"));
    if let Some(get_frames) = frames_fn {
        let raw = get_frames
            .call0(value)
            .map_err(|e| JsError::new(&format!("getKeyframes failed: {e:?}")))?;
        let frames = keyframes_from_js(&raw)?;
        return Ok(match prop(value, "target").filter(is_present) {
            Some(target) => Effect::Keyframe { target, frames },
            None => Effect::Keyframes(frames),
        });
    }

    Err(JsError::new("unsupported effect"))
}

/// Writes properties onto `target.style`.
pub struct InlineStyle;

impl StyleSink<JsValue> for InlineStyle {
    fn set_property(&mut self, target: &JsValue, name: &str, value: &PropertyValue) {
        match prop(target, "style").filter(is_present) {
            Some(style) => set_prop(&style, name, &JsValue::from_str(&value.to_string())),
            None => warn!("target has no style; skipped {name}"),
        }
    }
}
