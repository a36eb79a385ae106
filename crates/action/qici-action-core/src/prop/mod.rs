//! Animated properties.
//!
//! A Prop owns one timeline per attribute of a registry entry and writes the
//! sampled values onto a target during `update()`. Four variants share the
//! `AnimatedProp` contract:
//! - `CurveProp`: bezier curves with absolute/relative/tween application
//! - `KeyProp`: step keys (strings, booleans...)
//! - `TextureKeyProp`: step keys carrying texture handles
//! - `ColorLinearProp`: per-channel linear color keys

pub mod color;
pub mod curve;
pub mod key;
pub mod texture;

use std::fmt;

use serde_json::Value as Json;

use crate::binding::{ActionHost, TargetHandle};
use crate::error::ActionError;
use crate::registry::{PropClass, PropertyDef};
use crate::value::Value;

pub use color::ColorLinearProp;
pub use curve::{CurveAttrib, CurveProp, CurveType};
pub use key::KeyProp;
pub use texture::TextureKeyProp;

/// Composite key of a Prop inside an action: target path plus property id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropKey {
    /// Child path relative to the action's target ("" = the target itself).
    pub path: String,
    pub property_id: u32,
}

impl PropKey {
    pub fn new(path: impl Into<String>, property_id: u32) -> Self {
        Self {
            path: path.into(),
            property_id,
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.property_id)
    }
}

/// Per-tick playback flags handed down from the action.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Playhead {
    /// Elapsed time in frames.
    pub elapsed: f64,
    /// First tick after (re)start: cursors reset, relative origins recaptured.
    pub is_begin: bool,
    pub in_editor: bool,
    pub force_update: bool,
}

pub trait AnimatedProp {
    fn info(&self) -> &PropertyDef;

    /// Add (or overwrite) the key of `attrib` at `time`. Returns its index.
    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError>;
    fn delete_key(&mut self, attrib: &str, time: f64) -> bool;
    /// Key times of one attribute, or of all attributes merged when `None`.
    fn key_times(&self, attrib: Option<&str>) -> Vec<f64>;
    /// Time of the last key across all attributes.
    fn duration(&self) -> f64;
    /// Timeline value (before any relative/tween mapping) at `time`.
    fn value_at(&self, attrib: &str, time: f64) -> Option<Value>;
    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value>;
    /// Overwrite the key at `time`, creating it when absent.
    fn set_value(&mut self, attrib: &str, time: f64, value: Value) -> Result<(), ActionError> {
        self.add_key(attrib, time, value).map(|_| ())
    }
    fn is_key(&self, attrib: &str, time: f64) -> bool;

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead);

    fn to_json(&self) -> Json;
}

/// Merge sorted key-time lists, dropping duplicates.
pub(crate) fn merge_times(mut all: Vec<f64>) -> Vec<f64> {
    all.sort_by(|a, b| a.total_cmp(b));
    all.dedup();
    all
}

pub(crate) fn unknown_attribute(info: &PropertyDef, attrib: &str) -> ActionError {
    ActionError::UnknownAttribute {
        key: info.id.to_string(),
        attrib: attrib.to_string(),
    }
}

/// Tagged union over the Prop variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Prop {
    Curve(CurveProp),
    Key(KeyProp),
    TextureKey(TextureKeyProp),
    ColorLinear(ColorLinearProp),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Prop::Curve($p) => $body,
            Prop::Key($p) => $body,
            Prop::TextureKey($p) => $body,
            Prop::ColorLinear($p) => $body,
        }
    };
}

impl Prop {
    /// Empty prop of the variant the registry entry asks for.
    pub fn new(info: &PropertyDef) -> Prop {
        match info.class {
            PropClass::Curve => Prop::Curve(CurveProp::new(info.clone())),
            PropClass::Key => Prop::Key(KeyProp::new(info.clone())),
            PropClass::TextureKey => Prop::TextureKey(TextureKeyProp::new(info.clone())),
            PropClass::ColorLinear => Prop::ColorLinear(ColorLinearProp::new(info.clone())),
        }
    }

    /// Restore from the persisted form of the matching variant.
    pub fn from_json(info: &PropertyDef, json: &Json) -> Result<Prop, ActionError> {
        Ok(match info.class {
            PropClass::Curve => Prop::Curve(CurveProp::from_json(info.clone(), json)?),
            PropClass::Key => Prop::Key(KeyProp::from_json(info.clone(), json)?),
            PropClass::TextureKey => {
                Prop::TextureKey(TextureKeyProp::from_json(info.clone(), json)?)
            }
            PropClass::ColorLinear => {
                Prop::ColorLinear(ColorLinearProp::from_json(info.clone(), json)?)
            }
        })
    }

    pub fn as_curve(&self) -> Option<&CurveProp> {
        match self {
            Prop::Curve(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_curve_mut(&mut self) -> Option<&mut CurveProp> {
        match self {
            Prop::Curve(p) => Some(p),
            _ => None,
        }
    }

    /// Texture atlases referenced by the keys (for preloading).
    pub fn dependencies(&self) -> Vec<String> {
        match self {
            Prop::TextureKey(p) => p.dependencies(),
            _ => Vec::new(),
        }
    }
}

impl AnimatedProp for Prop {
    fn info(&self) -> &PropertyDef {
        dispatch!(self, p => p.info())
    }

    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError> {
        dispatch!(self, p => p.add_key(attrib, time, value))
    }

    fn delete_key(&mut self, attrib: &str, time: f64) -> bool {
        dispatch!(self, p => p.delete_key(attrib, time))
    }

    fn key_times(&self, attrib: Option<&str>) -> Vec<f64> {
        dispatch!(self, p => p.key_times(attrib))
    }

    fn duration(&self) -> f64 {
        dispatch!(self, p => p.duration())
    }

    fn value_at(&self, attrib: &str, time: f64) -> Option<Value> {
        dispatch!(self, p => p.value_at(attrib, time))
    }

    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value> {
        dispatch!(self, p => p.value_by_index(attrib, idx))
    }

    fn set_value(&mut self, attrib: &str, time: f64, value: Value) -> Result<(), ActionError> {
        dispatch!(self, p => p.set_value(attrib, time, value))
    }

    fn is_key(&self, attrib: &str, time: f64) -> bool {
        dispatch!(self, p => p.is_key(attrib, time))
    }

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead) {
        dispatch!(self, p => p.update(host, target, head))
    }

    fn to_json(&self) -> Json {
        dispatch!(self, p => p.to_json())
    }
}
