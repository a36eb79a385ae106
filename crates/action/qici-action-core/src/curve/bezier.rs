//! Cubic-bezier keyframe curve.
//!
//! Model:
//! - Keys are sorted ascending by time (ties keep insertion order).
//! - Segment [Ki -> K(i+1)] is a cubic bezier on value with control points at
//!   1/3 of the interval: p1 = v0 + out0 * dt/3, p2 = v1 - in1 * dt/3.
//! - Outside [first.time, last.time] the time is remapped by the pre/post wrap
//!   mode before sampling.
//!
//! Persisted form: `[[time, value, in, out(, mode)], ..., [preWrap, postWrap]]`
//! with infinite tangents written as the strings `"Infinity"` / `"-Infinity"`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::curve::keyframe::{Keyframe, TangentMode};
use crate::error::ActionError;

/// Interpolated results at or beyond this magnitude are treated as blowups.
const MAX_MAGNITUDE: f64 = 2_147_483_647.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WrapMode {
    #[default]
    Clamp = 0,
    Loop = 1,
    PingPong = 2,
}

impl WrapMode {
    pub fn from_code(code: i64) -> WrapMode {
        match code {
            1 => WrapMode::Loop,
            2 => WrapMode::PingPong,
            _ => WrapMode::Clamp,
        }
    }

    #[inline]
    pub fn code(self) -> i64 {
        self as i64
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BezierCurve {
    keys: Vec<Keyframe>,
    pub pre_wrap_mode: WrapMode,
    pub post_wrap_mode: WrapMode,
}

/// Euclidean remainder that stays in [0, b) for negative `a`.
#[inline]
fn pos_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if m < 0.0 {
        m + b
    } else {
        m
    }
}

/// Cubic Bezier basis function
#[inline]
fn cubic_bezier(p0: f64, p1: f64, p2: f64, p3: f64, s: f64) -> f64 {
    let u = 1.0 - s;
    u * u * u * p0 + 3.0 * u * u * s * p1 + 3.0 * u * s * s * p2 + s * s * s * p3
}

#[inline]
fn cubic_bezier_derivative(p0: f64, p1: f64, p2: f64, p3: f64, s: f64) -> f64 {
    let u = 1.0 - s;
    3.0 * u * u * (p1 - p0) + 6.0 * u * s * (p2 - p1) + 3.0 * s * s * (p3 - p2)
}

#[inline]
fn secant(a: &Keyframe, b: &Keyframe) -> f64 {
    let dt = b.time - a.time;
    if dt == 0.0 {
        0.0
    } else {
        (b.value - a.value) / dt
    }
}

fn tangent_to_json(t: f64) -> Json {
    if t == f64::INFINITY {
        Json::String("Infinity".into())
    } else if t == f64::NEG_INFINITY {
        Json::String("-Infinity".into())
    } else {
        json!(t)
    }
}

fn tangent_from_json(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) if s == "Infinity" => Some(f64::INFINITY),
        Json::String(s) if s == "-Infinity" => Some(f64::NEG_INFINITY),
        Json::Null => Some(0.0),
        _ => None,
    }
}

impl BezierCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from keys in any order.
    pub fn from_keys(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            keys,
            ..Self::default()
        }
    }

    #[inline]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn key(&self, idx: usize) -> Option<&Keyframe> {
        self.keys.get(idx)
    }

    /// Time of the last key, 0 when empty.
    pub fn end_time(&self) -> f64 {
        self.keys.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Index of the first key at exactly `time`.
    pub fn find_key(&self, time: f64) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.time < time);
        match self.keys.get(idx) {
            Some(k) if k.time == time => Some(idx),
            _ => None,
        }
    }

    /// Insert a key, keeping time order. Missing tangents are computed from the
    /// neighbouring keys. Returns the insertion index.
    pub fn add_key(
        &mut self,
        time: f64,
        value: f64,
        in_tangent: Option<f64>,
        out_tangent: Option<f64>,
    ) -> usize {
        let idx = self.keys.partition_point(|k| k.time <= time);
        self.keys.insert(idx, Keyframe::new(time, value));
        match (in_tangent, out_tangent) {
            (Some(i), Some(o)) => {
                self.keys[idx] = Keyframe::with_tangents(time, value, i, o);
            }
            (i, o) => {
                self.make_keyframe_auto(idx);
                let key = &mut self.keys[idx];
                if let Some(i) = i {
                    key.in_tangent = i;
                    key.mode = TangentMode::Broken;
                }
                if let Some(o) = o {
                    key.out_tangent = o;
                    key.mode = TangentMode::Broken;
                }
            }
        }
        self.refresh_auto_neighbours(idx);
        idx
    }

    /// Insert a fully specified keyframe as-is.
    pub fn insert_keyframe(&mut self, key: Keyframe) -> usize {
        let idx = self.keys.partition_point(|k| k.time <= key.time);
        self.keys.insert(idx, key);
        idx
    }

    pub fn remove_key(&mut self, idx: usize) -> Option<Keyframe> {
        if idx >= self.keys.len() {
            return None;
        }
        let removed = self.keys.remove(idx);
        if idx > 0 {
            self.refresh_auto(idx - 1);
        }
        if idx < self.keys.len() {
            self.refresh_auto(idx);
        }
        Some(removed)
    }

    /// Change the value of an existing key, keeping its time and mode.
    pub fn set_key_value(&mut self, idx: usize, value: f64) -> bool {
        match self.keys.get_mut(idx) {
            Some(k) => {
                k.value = value;
                self.refresh_auto(idx);
                self.refresh_auto_neighbours(idx);
                true
            }
            None => false,
        }
    }

    pub fn set_tangents(&mut self, idx: usize, in_tangent: f64, out_tangent: f64) -> bool {
        match self.keys.get_mut(idx) {
            Some(k) => {
                *k = Keyframe::with_tangents(k.time, k.value, in_tangent, out_tangent);
                true
            }
            None => false,
        }
    }

    fn refresh_auto(&mut self, idx: usize) {
        if matches!(self.keys.get(idx), Some(k) if k.mode == TangentMode::Auto) {
            self.make_keyframe_auto(idx);
        }
    }

    fn refresh_auto_neighbours(&mut self, idx: usize) {
        if idx > 0 {
            self.refresh_auto(idx - 1);
        }
        self.refresh_auto(idx + 1);
    }

    /// Tangent = average of the incoming and outgoing secant slopes.
    pub fn make_keyframe_auto(&mut self, idx: usize) {
        let n = self.keys.len();
        if idx >= n {
            return;
        }
        let incoming = (idx > 0).then(|| secant(&self.keys[idx - 1], &self.keys[idx]));
        let outgoing = (idx + 1 < n).then(|| secant(&self.keys[idx], &self.keys[idx + 1]));
        let slope = match (incoming, outgoing) {
            (Some(a), Some(b)) => (a + b) * 0.5,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => 0.0,
        };
        let key = &mut self.keys[idx];
        key.in_tangent = slope;
        key.out_tangent = slope;
        key.mode = TangentMode::Auto;
    }

    /// Join the two tangents into one continuous slope.
    pub fn make_keyframe_smooth(&mut self, idx: usize) {
        if let Some(key) = self.keys.get_mut(idx) {
            let slope = match (key.in_tangent.is_finite(), key.out_tangent.is_finite()) {
                (true, true) => (key.in_tangent + key.out_tangent) * 0.5,
                (true, false) => key.in_tangent,
                (false, true) => key.out_tangent,
                (false, false) => 0.0,
            };
            key.in_tangent = slope;
            key.out_tangent = slope;
            key.mode = TangentMode::FreeSmooth;
        }
    }

    pub fn make_keyframe_flat(&mut self, idx: usize) {
        if let Some(key) = self.keys.get_mut(idx) {
            key.in_tangent = 0.0;
            key.out_tangent = 0.0;
            key.mode = TangentMode::Flat;
        }
    }

    /// Each side points straight at its neighbour; in and out may differ.
    pub fn make_keyframe_linear(&mut self, idx: usize) {
        let n = self.keys.len();
        if idx >= n {
            return;
        }
        let incoming = (idx > 0).then(|| secant(&self.keys[idx - 1], &self.keys[idx]));
        let outgoing = (idx + 1 < n).then(|| secant(&self.keys[idx], &self.keys[idx + 1]));
        let key = &mut self.keys[idx];
        key.in_tangent = incoming.or(outgoing).unwrap_or(0.0);
        key.out_tangent = outgoing.or(incoming).unwrap_or(0.0);
        key.mode = TangentMode::Linear;
    }

    /// Map `time` into the key range per the wrap modes. `Err` carries the
    /// clamped boundary value.
    fn wrap_time(&self, time: f64, pre: WrapMode, post: WrapMode) -> Result<f64, f64> {
        let first = &self.keys[0];
        let last = &self.keys[self.keys.len() - 1];
        let span = last.time - first.time;
        let mode = if time < first.time {
            pre
        } else if time > last.time {
            post
        } else {
            return Ok(time);
        };
        if span <= 0.0 {
            return Err(if time < first.time {
                first.value
            } else {
                last.value
            });
        }
        match mode {
            WrapMode::Clamp => Err(if time < first.time {
                first.value
            } else {
                last.value
            }),
            WrapMode::Loop => Ok(first.time + pos_mod(time - first.time, span)),
            WrapMode::PingPong => {
                let m = pos_mod(time - first.time, span * 2.0);
                if m <= span {
                    Ok(first.time + m)
                } else {
                    Ok(last.time - (m - span))
                }
            }
        }
    }

    /// Sample the curve. Empty curves yield NaN, single-key curves are constant.
    pub fn evaluate(&self, time: f64) -> f64 {
        self.evaluate_with(time, self.pre_wrap_mode, self.post_wrap_mode)
    }

    /// Sample with both wrap modes forced to `Loop`.
    pub fn evaluate_looping(&self, time: f64) -> f64 {
        self.evaluate_with(time, WrapMode::Loop, WrapMode::Loop)
    }

    fn evaluate_with(&self, time: f64, pre: WrapMode, post: WrapMode) -> f64 {
        match self.keys.len() {
            0 => f64::NAN,
            1 => self.keys[0].value,
            _ => match self.wrap_time(time, pre, post) {
                Ok(t) => self.evaluate_in_range(t),
                Err(boundary) => boundary,
            },
        }
    }

    fn segment_at(&self, time: f64) -> Option<(usize, usize)> {
        let n = self.keys.len();
        let idx = self.keys.partition_point(|k| k.time <= time);
        if idx == 0 {
            return None;
        }
        if idx >= n {
            return Some((n - 1, n - 1));
        }
        Some((idx - 1, idx))
    }

    fn evaluate_in_range(&self, time: f64) -> f64 {
        let (i0, i1) = match self.segment_at(time) {
            Some(seg) => seg,
            None => return self.keys[0].value,
        };
        if i0 == i1 {
            return self.keys[i0].value;
        }
        let k0 = &self.keys[i0];
        let k1 = &self.keys[i1];
        let dt = k1.time - k0.time;
        if dt <= 0.0 {
            return k1.value;
        }
        let s = (time - k0.time) / dt;
        let p1 = k0.value + k0.out_tangent * dt / 3.0;
        let p2 = k1.value - k1.in_tangent * dt / 3.0;
        let v = cubic_bezier(k0.value, p1, p2, k1.value, s);
        if !v.is_finite() || v.abs() >= MAX_MAGNITUDE {
            if s == 1.0 {
                k1.value
            } else {
                k0.value
            }
        } else {
            v
        }
    }

    /// Slope of the curve at `time` (value units per time unit). Not wrapped:
    /// NaN outside the key range.
    pub fn evaluate_derivative(&self, time: f64) -> f64 {
        let n = self.keys.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return 0.0;
        }
        if time < self.keys[0].time || time > self.keys[n - 1].time {
            return f64::NAN;
        }
        let (i0, i1) = match self.segment_at(time) {
            Some((a, b)) if a == b => (a - 1, b),
            Some(seg) => seg,
            None => return f64::NAN,
        };
        let k0 = &self.keys[i0];
        let k1 = &self.keys[i1];
        let dt = k1.time - k0.time;
        if dt <= 0.0 {
            return 0.0;
        }
        let s = (time - k0.time) / dt;
        let p1 = k0.value + k0.out_tangent * dt / 3.0;
        let p2 = k1.value - k1.in_tangent * dt / 3.0;
        let d = cubic_bezier_derivative(k0.value, p1, p2, k1.value, s) / dt;
        if d.is_finite() {
            d
        } else {
            0.0
        }
    }

    pub fn to_json(&self) -> Json {
        let mut out: Vec<Json> = Vec::with_capacity(self.keys.len() + 1);
        for k in &self.keys {
            let mut row = vec![
                json!(k.time),
                json!(k.value),
                tangent_to_json(k.in_tangent),
                tangent_to_json(k.out_tangent),
            ];
            if k.mode != TangentMode::FreeSmooth {
                row.push(json!(k.mode.code()));
            }
            out.push(Json::Array(row));
        }
        out.push(json!([self.pre_wrap_mode.code(), self.post_wrap_mode.code()]));
        Json::Array(out)
    }

    /// Restore from the persisted array form. Malformed key rows are skipped.
    pub fn from_json(v: &Json) -> Result<BezierCurve, ActionError> {
        let rows = v.as_array().ok_or_else(|| ActionError::Serialization {
            reason: "curve must be an array".into(),
        })?;
        let mut curve = BezierCurve::new();
        for row in rows {
            let Some(items) = row.as_array() else {
                log::warn!("skipping non-array curve row {row}");
                continue;
            };
            if items.len() == 2 {
                curve.pre_wrap_mode = WrapMode::from_code(items[0].as_i64().unwrap_or(0));
                curve.post_wrap_mode = WrapMode::from_code(items[1].as_i64().unwrap_or(0));
                continue;
            }
            let parsed = (
                items.first().and_then(Json::as_f64),
                items.get(1).and_then(Json::as_f64),
                items.get(2).and_then(tangent_from_json),
                items.get(3).and_then(tangent_from_json),
            );
            let (Some(time), Some(value), Some(in_t), Some(out_t)) = parsed else {
                log::warn!("skipping malformed curve key {row}");
                continue;
            };
            let mode = items
                .get(4)
                .and_then(Json::as_i64)
                .and_then(TangentMode::from_code)
                .unwrap_or(TangentMode::FreeSmooth);
            curve.insert_keyframe(Keyframe {
                time,
                value,
                in_tangent: in_t,
                out_tangent: out_t,
                mode,
            });
        }
        Ok(curve)
    }
}
