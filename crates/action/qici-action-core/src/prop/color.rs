//! Linearly interpolated RGBA property.

use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

use crate::binding::{ActionHost, TargetHandle};
use crate::error::ActionError;
use crate::registry::PropertyDef;
use crate::value::Value;

use super::{merge_times, unknown_attribute, AnimatedProp, Playhead};

type ColorKeys = Vec<(f64, [f32; 4])>;

#[derive(Clone, Debug, PartialEq)]
pub struct ColorLinearProp {
    info: PropertyDef,
    tracks: IndexMap<String, ColorKeys>,
}

fn find(keys: &ColorKeys, time: f64) -> Option<usize> {
    let idx = keys.partition_point(|k| k.0 < time);
    (keys.get(idx).map(|k| k.0) == Some(time)).then_some(idx)
}

/// Per-channel linear blend between the bracketing keys, clamped outside.
fn sample(keys: &ColorKeys, time: f64) -> Option<[f32; 4]> {
    let first = keys.first()?;
    let last = keys.last()?;
    if time <= first.0 {
        return Some(first.1);
    }
    if time >= last.0 {
        return Some(last.1);
    }
    let hi = keys.partition_point(|k| k.0 <= time);
    let (t0, c0) = keys[hi - 1];
    let (t1, c1) = keys[hi];
    let s = if t1 > t0 { ((time - t0) / (t1 - t0)) as f32 } else { 0.0 };
    let mut out = [0.0; 4];
    for i in 0..4 {
        out[i] = c0[i] + (c1[i] - c0[i]) * s;
    }
    Some(out)
}

impl ColorLinearProp {
    pub fn new(info: PropertyDef) -> Self {
        let tracks = info
            .attributes
            .iter()
            .map(|a| (a.attrib.clone(), ColorKeys::new()))
            .collect();
        Self { info, tracks }
    }

    /// Restore from `{ attrib: [[time, [r, g, b, a]], ...] }`.
    pub fn from_json(info: PropertyDef, json: &Json) -> Result<Self, ActionError> {
        let obj = json.as_object().ok_or_else(|| ActionError::Serialization {
            reason: format!("property {} must be an object", info.id),
        })?;
        let mut prop = ColorLinearProp::new(info);
        for (attrib, rows) in obj {
            if !prop.tracks.contains_key(attrib) {
                log::warn!("property {} has no attribute '{}'", prop.info.id, attrib);
                continue;
            }
            for row in rows.as_array().into_iter().flatten() {
                let parsed = row.as_array().and_then(|r| {
                    let time = r.first()?.as_f64()?;
                    let color = Value::from_json(r.get(1)?).as_color()?;
                    Some((time, color))
                });
                match parsed {
                    Some((time, color)) => {
                        prop.add_key(attrib, time, Value::Color(color))?;
                    }
                    None => log::warn!("skipping malformed color key {row} of '{attrib}'"),
                }
            }
        }
        Ok(prop)
    }
}

impl AnimatedProp for ColorLinearProp {
    fn info(&self) -> &PropertyDef {
        &self.info
    }

    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError> {
        let color = value.as_color().ok_or_else(|| ActionError::ValueTypeMismatch {
            attrib: attrib.to_string(),
            expected: "color".into(),
        })?;
        let info = &self.info;
        let keys = self
            .tracks
            .get_mut(attrib)
            .ok_or_else(|| unknown_attribute(info, attrib))?;
        if let Some(idx) = find(keys, time) {
            keys[idx].1 = color;
            return Ok(idx);
        }
        let idx = keys.partition_point(|k| k.0 <= time);
        keys.insert(idx, (time, color));
        Ok(idx)
    }

    fn delete_key(&mut self, attrib: &str, time: f64) -> bool {
        let Some(keys) = self.tracks.get_mut(attrib) else {
            return false;
        };
        match find(keys, time) {
            Some(idx) => {
                keys.remove(idx);
                true
            }
            None => false,
        }
    }

    fn key_times(&self, attrib: Option<&str>) -> Vec<f64> {
        let times = |k: &ColorKeys| k.iter().map(|k| k.0).collect::<Vec<_>>();
        match attrib {
            Some(name) => self.tracks.get(name).map(times).unwrap_or_default(),
            None => merge_times(self.tracks.values().flat_map(times).collect()),
        }
    }

    fn duration(&self) -> f64 {
        self.tracks
            .values()
            .filter_map(|k| k.last().map(|k| k.0))
            .fold(0.0, f64::max)
    }

    fn value_at(&self, attrib: &str, time: f64) -> Option<Value> {
        sample(self.tracks.get(attrib)?, time).map(Value::Color)
    }

    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value> {
        self.tracks.get(attrib)?.get(idx).map(|k| Value::Color(k.1))
    }

    fn is_key(&self, attrib: &str, time: f64) -> bool {
        self.tracks.get(attrib).is_some_and(|k| find(k, time).is_some())
    }

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead) {
        for (attrib, keys) in &self.tracks {
            if let Some(c) = sample(keys, head.elapsed) {
                host.set(target, attrib, Value::Color(c));
            }
        }
    }

    fn to_json(&self) -> Json {
        let mut out = Map::new();
        for (attrib, keys) in &self.tracks {
            if keys.is_empty() {
                continue;
            }
            let rows = keys.iter().map(|(t, c)| json!([t, c])).collect();
            out.insert(attrib.clone(), Json::Array(rows));
        }
        Json::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blends_between_keys_and_clamps_outside() {
        let keys: ColorKeys = vec![(0.0, [0.0, 0.0, 0.0, 1.0]), (10.0, [1.0, 0.5, 0.0, 1.0])];
        assert_eq!(sample(&keys, 5.0), Some([0.5, 0.25, 0.0, 1.0]));
        assert_eq!(sample(&keys, -3.0), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(sample(&keys, 30.0), Some([1.0, 0.5, 0.0, 1.0]));
        assert_eq!(sample(&Vec::new(), 1.0), None);
    }
}
