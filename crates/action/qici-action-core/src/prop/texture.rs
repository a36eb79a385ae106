//! Step-keyed texture swaps. Persisted as `[time, atlas, frame]` rows.

use serde_json::{json, Value as Json};

use crate::binding::{ActionHost, TargetHandle};
use crate::error::ActionError;
use crate::registry::PropertyDef;
use crate::value::Value;

use super::{AnimatedProp, KeyProp, Playhead};

#[derive(Clone, Debug, PartialEq)]
pub struct TextureKeyProp {
    keys: KeyProp,
}

impl TextureKeyProp {
    pub fn new(info: PropertyDef) -> Self {
        Self {
            keys: KeyProp::new(info),
        }
    }

    pub fn from_json(info: PropertyDef, json: &Json) -> Result<Self, ActionError> {
        let keys = KeyProp::from_json_with(info, json, |row| {
            let time = row.first()?.as_f64()?;
            let atlas = row.get(1)?.as_str()?.to_string();
            let frame = row.get(2).and_then(Json::as_str).map(str::to_string);
            Some((time, Value::Texture { atlas, frame }))
        })?;
        Ok(Self { keys })
    }

    /// Distinct atlases referenced by any key, in first-use order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (_, track) in self.keys.tracks() {
            for (_, value) in track.keys() {
                if let Value::Texture { atlas, .. } = value {
                    if !out.contains(atlas) {
                        out.push(atlas.clone());
                    }
                }
            }
        }
        out
    }
}

impl AnimatedProp for TextureKeyProp {
    fn info(&self) -> &PropertyDef {
        self.keys.info()
    }

    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError> {
        self.keys.add_key(attrib, time, value)
    }

    fn delete_key(&mut self, attrib: &str, time: f64) -> bool {
        self.keys.delete_key(attrib, time)
    }

    fn key_times(&self, attrib: Option<&str>) -> Vec<f64> {
        self.keys.key_times(attrib)
    }

    fn duration(&self) -> f64 {
        self.keys.duration()
    }

    fn value_at(&self, attrib: &str, time: f64) -> Option<Value> {
        self.keys.value_at(attrib, time)
    }

    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value> {
        self.keys.value_by_index(attrib, idx)
    }

    fn is_key(&self, attrib: &str, time: f64) -> bool {
        self.keys.is_key(attrib, time)
    }

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead) {
        self.keys.update(host, target, head)
    }

    fn to_json(&self) -> Json {
        self.keys.to_json_with(|t, v| match v {
            Value::Texture { atlas, frame } => json!([t, atlas, frame]),
            other => json!([t, other.to_json()]),
        })
    }
}
