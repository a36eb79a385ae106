//! Step-keyed property (strings, booleans, sounds...).

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::binding::{ActionHost, TargetHandle};
use crate::error::ActionError;
use crate::registry::PropertyDef;
use crate::value::{Value, ValueKind};

use super::{merge_times, unknown_attribute, AnimatedProp, Playhead};

/// Sorted `(time, value)` list with a playback cursor.
///
/// `cursor` is the number of keys already applied in the current pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyTrack {
    keys: Vec<(f64, Value)>,
    cursor: usize,
}

impl KeyTrack {
    pub fn keys(&self) -> &[(f64, Value)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn end_time(&self) -> f64 {
        self.keys.last().map(|k| k.0).unwrap_or(0.0)
    }

    pub fn find(&self, time: f64) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.0 < time);
        (self.keys.get(idx).map(|k| k.0) == Some(time)).then_some(idx)
    }

    /// Insert or overwrite the key at `time`.
    pub fn insert(&mut self, time: f64, value: Value) -> usize {
        if let Some(idx) = self.find(time) {
            self.keys[idx].1 = value;
            return idx;
        }
        let idx = self.keys.partition_point(|k| k.0 <= time);
        self.keys.insert(idx, (time, value));
        if idx < self.cursor {
            self.cursor += 1;
        }
        idx
    }

    pub fn remove(&mut self, time: f64) -> bool {
        match self.find(time) {
            Some(idx) => {
                self.keys.remove(idx);
                if idx < self.cursor {
                    self.cursor -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// Step value at `time`: the latest key at or before it.
    pub fn value_at(&self, time: f64) -> Option<&Value> {
        let n = self.keys.partition_point(|k| k.0 <= time);
        n.checked_sub(1).map(|i| &self.keys[i].1)
    }

    /// Advance the cursor to `elapsed` and return the keys to apply, in order.
    ///
    /// Moving forward yields every key crossed since the last call. Moving
    /// backward yields the latest key at or before `elapsed`. `reapply`
    /// yields the current key even when nothing was crossed.
    pub fn advance(&mut self, elapsed: f64, is_begin: bool, reapply: bool) -> Vec<&Value> {
        if is_begin {
            self.cursor = 0;
        }
        let reached = self.keys.partition_point(|k| k.0 <= elapsed);
        let from = self.cursor;
        self.cursor = reached;
        if reached > from {
            self.keys[from..reached].iter().map(|k| &k.1).collect()
        } else if (reached < from || reapply) && reached > 0 {
            vec![&self.keys[reached - 1].1]
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyProp {
    info: PropertyDef,
    tracks: IndexMap<String, KeyTrack>,
}

impl KeyProp {
    pub fn new(info: PropertyDef) -> Self {
        let tracks = info
            .attributes
            .iter()
            .map(|a| (a.attrib.clone(), KeyTrack::default()))
            .collect();
        Self { info, tracks }
    }

    /// Restore from `{ attrib: [[time, value], ...] }`.
    pub fn from_json(info: PropertyDef, json: &Json) -> Result<Self, ActionError> {
        Self::from_json_with(info, json, |row| {
            let time = row.first()?.as_f64()?;
            Some((time, Value::from_json(row.get(1)?)))
        })
    }

    pub(crate) fn from_json_with(
        info: PropertyDef,
        json: &Json,
        parse_row: impl Fn(&[Json]) -> Option<(f64, Value)>,
    ) -> Result<Self, ActionError> {
        let obj = json.as_object().ok_or_else(|| ActionError::Serialization {
            reason: format!("property {} must be an object", info.id),
        })?;
        let mut prop = KeyProp::new(info);
        for (attrib, rows) in obj {
            let Some(track) = prop.tracks.get_mut(attrib) else {
                log::warn!("property {} has no attribute '{}'", prop.info.id, attrib);
                continue;
            };
            let Some(rows) = rows.as_array() else {
                log::warn!("keys of '{}' must be an array", attrib);
                continue;
            };
            for row in rows {
                match row.as_array().and_then(|r| parse_row(r)) {
                    Some((time, value)) => {
                        track.insert(time, value);
                    }
                    None => log::warn!("skipping malformed key {row} of '{attrib}'"),
                }
            }
        }
        Ok(prop)
    }

    pub(crate) fn to_json_with(&self, write_row: impl Fn(f64, &Value) -> Json) -> Json {
        let mut out = Map::new();
        for (attrib, track) in &self.tracks {
            if track.is_empty() {
                continue;
            }
            let rows = track.keys.iter().map(|(t, v)| write_row(*t, v)).collect();
            out.insert(attrib.clone(), Json::Array(rows));
        }
        Json::Object(out)
    }

    pub fn track(&self, attrib: &str) -> Option<&KeyTrack> {
        self.tracks.get(attrib)
    }

    pub(crate) fn tracks(&self) -> impl Iterator<Item = (&String, &KeyTrack)> {
        self.tracks.iter()
    }

    fn check_kind(&self, attrib: &str, value: &Value) -> Result<(), ActionError> {
        let def = self
            .info
            .attribute(attrib)
            .ok_or_else(|| unknown_attribute(&self.info, attrib))?;
        if value.kind() == def.ty || value.kind() == ValueKind::Null {
            return Ok(());
        }
        Err(ActionError::ValueTypeMismatch {
            attrib: attrib.to_string(),
            expected: format!("{:?}", def.ty).to_lowercase(),
        })
    }
}

impl AnimatedProp for KeyProp {
    fn info(&self) -> &PropertyDef {
        &self.info
    }

    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError> {
        self.check_kind(attrib, &value)?;
        let info = &self.info;
        let track = self
            .tracks
            .get_mut(attrib)
            .ok_or_else(|| unknown_attribute(info, attrib))?;
        Ok(track.insert(time, value))
    }

    fn delete_key(&mut self, attrib: &str, time: f64) -> bool {
        self.tracks.get_mut(attrib).is_some_and(|t| t.remove(time))
    }

    fn key_times(&self, attrib: Option<&str>) -> Vec<f64> {
        let times = |t: &KeyTrack| t.keys.iter().map(|k| k.0).collect::<Vec<_>>();
        match attrib {
            Some(name) => self.tracks.get(name).map(times).unwrap_or_default(),
            None => merge_times(self.tracks.values().flat_map(times).collect()),
        }
    }

    fn duration(&self) -> f64 {
        self.tracks.values().map(KeyTrack::end_time).fold(0.0, f64::max)
    }

    fn value_at(&self, attrib: &str, time: f64) -> Option<Value> {
        self.tracks.get(attrib)?.value_at(time).cloned()
    }

    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value> {
        self.tracks.get(attrib)?.keys.get(idx).map(|k| k.1.clone())
    }

    fn is_key(&self, attrib: &str, time: f64) -> bool {
        self.tracks.get(attrib).is_some_and(|t| t.find(time).is_some())
    }

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead) {
        let reapply = head.in_editor && (head.force_update || self.info.force_update);
        for (attrib, track) in self.tracks.iter_mut() {
            for value in track.advance(head.elapsed, head.is_begin, reapply) {
                host.set(target, attrib, value.clone());
            }
        }
    }

    fn to_json(&self) -> Json {
        self.to_json_with(|t, v| Json::Array(vec![serde_json::json!(t), v.to_json()]))
    }
}
