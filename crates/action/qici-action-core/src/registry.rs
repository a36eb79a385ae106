//! Property registry: maps integer property ids to the attributes they animate
//! and the Prop variant that drives them.
//!
//! The registry is an explicit object built once at startup
//! (`PropertyRegistry::builtin()`) and extended by hosts with `extend()`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::value::{Value, ValueKind};

/// Built-in property ids (stable; persisted in bundles).
pub mod property_ids {
    pub const POSITION: u32 = 1;
    pub const ANCHORED_POSITION: u32 = 2;
    pub const ROTATION: u32 = 3;
    pub const ALPHA: u32 = 4;
    pub const SCALE: u32 = 5;
    pub const COLOR_TINT: u32 = 6;
    pub const VISIBLE: u32 = 7;
    pub const SIZE: u32 = 8;
    pub const PIVOT: u32 = 9;
    pub const SKEW: u32 = 10;
    pub const TEXTURE: u32 = 11;
    pub const ANIMATION: u32 = 12;
    pub const COLOR: u32 = 13;
    pub const TEXT: u32 = 14;
    pub const TOGGLE_ON: u32 = 15;
    pub const SCROLL_BAR_VALUE: u32 = 16;
    pub const SCROLL_VIEW_POSITION: u32 = 17;
    pub const PROGRESS_BAR_VALUE: u32 = 18;
    pub const SLIDER_VALUE: u32 = 19;
    pub const SOUND: u32 = 20;
    pub const DOM_INNER_HTML: u32 = 21;
    pub const TILEMAP_POSITION: u32 = 22;
}

/// Which Prop variant animates a property.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropClass {
    Curve,
    Key,
    TextureKey,
    ColorLinear,
}

impl PropClass {
    /// Default variant for a value type.
    pub fn for_kind(kind: ValueKind) -> PropClass {
        match kind {
            ValueKind::Number => PropClass::Curve,
            ValueKind::Texture => PropClass::TextureKey,
            ValueKind::Color => PropClass::ColorLinear,
            _ => PropClass::Key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub attrib: String,
    pub ty: ValueKind,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl AttributeDef {
    fn new(attrib: &str, ty: ValueKind) -> Self {
        Self {
            attrib: attrib.to_string(),
            ty,
            default: None,
            min: None,
            max: None,
        }
    }

    fn number(attrib: &str, default: f64) -> Self {
        Self {
            default: Some(Value::Number(default)),
            ..Self::new(attrib, ValueKind::Number)
        }
    }

    fn ranged(attrib: &str, default: f64, min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::number(attrib, default)
        }
    }

    /// Clamp a numeric value into [min, max] where bounds are set.
    pub fn clamp(&self, v: f64) -> f64 {
        let v = self.min.map_or(v, |m| v.max(m));
        self.max.map_or(v, |m| v.min(m))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub id: u32,
    pub name: String,
    pub class: PropClass,
    /// Reapply the current key while scrubbing in an editor even when no new key was crossed.
    #[serde(default)]
    pub force_update: bool,
    /// Host class the property belongs to (custom properties only).
    #[serde(default)]
    pub class_name: Option<String>,
    pub attributes: Vec<AttributeDef>,
}

impl PropertyDef {
    pub fn attribute(&self, attrib: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.attrib == attrib)
    }
}

/// Host-registered property: one attribute of a host class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomProperty {
    pub class_name: String,
    pub property_id: u32,
    pub attrib: String,
    pub value_type: ValueKind,
}

#[derive(Clone, Debug, Default)]
pub struct PropertyRegistry {
    defs: IndexMap<u32, PropertyDef>,
}

impl PropertyRegistry {
    /// Empty registry (no built-ins).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the shipped property table.
    pub fn builtin() -> Self {
        use property_ids::*;
        use AttributeDef as A;
        let mut reg = Self::new();
        let mut add = |id: u32, name: &str, class: PropClass, force: bool, attrs: Vec<A>| {
            reg.register(PropertyDef {
                id,
                name: name.to_string(),
                class,
                force_update: force,
                class_name: None,
                attributes: attrs,
            });
        };
        add(POSITION, "Position", PropClass::Curve, false, vec![A::number("x", 0.0), A::number("y", 0.0)]);
        add(
            ANCHORED_POSITION,
            "AnchoredPosition",
            PropClass::Curve,
            false,
            vec![A::number("anchoredX", 0.0), A::number("anchoredY", 0.0)],
        );
        add(ROTATION, "Rotation", PropClass::Curve, false, vec![A::number("rotation", 0.0)]);
        add(ALPHA, "Alpha", PropClass::Curve, false, vec![A::ranged("alpha", 1.0, 0.0, 1.0)]);
        add(SCALE, "Scale", PropClass::Curve, false, vec![A::number("scaleX", 1.0), A::number("scaleY", 1.0)]);
        add(
            COLOR_TINT,
            "ColorTint",
            PropClass::ColorLinear,
            false,
            vec![A::new("colorTint", ValueKind::Color)],
        );
        add(VISIBLE, "Visible", PropClass::Key, true, vec![A::new("visible", ValueKind::Bool)]);
        add(SIZE, "Size", PropClass::Curve, false, vec![A::number("width", 0.0), A::number("height", 0.0)]);
        add(PIVOT, "Pivot", PropClass::Curve, false, vec![A::number("pivotX", 0.0), A::number("pivotY", 0.0)]);
        add(SKEW, "Skew", PropClass::Curve, false, vec![A::number("skewX", 0.0), A::number("skewY", 0.0)]);
        add(TEXTURE, "Texture", PropClass::TextureKey, true, vec![A::new("texture", ValueKind::Texture)]);
        add(ANIMATION, "Animation", PropClass::Key, false, vec![A::new("animation", ValueKind::Text)]);
        add(COLOR, "Color", PropClass::ColorLinear, false, vec![A::new("color", ValueKind::Color)]);
        add(TEXT, "Text", PropClass::Key, true, vec![A::new("text", ValueKind::Text)]);
        add(TOGGLE_ON, "ToggleOn", PropClass::Key, true, vec![A::new("on", ValueKind::Bool)]);
        add(
            SCROLL_BAR_VALUE,
            "ScrollBarValue",
            PropClass::Curve,
            false,
            vec![A::ranged("value", 0.0, 0.0, 1.0)],
        );
        add(
            SCROLL_VIEW_POSITION,
            "ScrollViewPosition",
            PropClass::Curve,
            false,
            vec![
                A::ranged("horizontalNormalizedPosition", 0.0, 0.0, 1.0),
                A::ranged("verticalNormalizedPosition", 0.0, 0.0, 1.0),
            ],
        );
        add(
            PROGRESS_BAR_VALUE,
            "ProgressBarValue",
            PropClass::Curve,
            false,
            vec![A::ranged("value", 0.0, 0.0, 1.0)],
        );
        add(SLIDER_VALUE, "SliderValue", PropClass::Curve, false, vec![A::number("value", 0.0)]);
        add(SOUND, "Sound", PropClass::Key, false, vec![A::new("audio", ValueKind::Text)]);
        add(
            DOM_INNER_HTML,
            "DomInnerHTML",
            PropClass::Key,
            true,
            vec![A::new("innerHTML", ValueKind::Text)],
        );
        add(
            TILEMAP_POSITION,
            "TilemapPosition",
            PropClass::Curve,
            false,
            vec![A::number("scrollX", 0.0), A::number("scrollY", 0.0)],
        );
        reg
    }

    /// Insert or replace a definition.
    ///
    /// # Panics
    /// When an attribute declares `min > max`.
    pub fn register(&mut self, def: PropertyDef) {
        for a in &def.attributes {
            if let (Some(min), Some(max)) = (a.min, a.max) {
                assert!(
                    min <= max,
                    "attribute '{}' of property {} has min {} > max {}",
                    a.attrib,
                    def.id,
                    min,
                    max
                );
            }
        }
        self.defs.insert(def.id, def);
    }

    /// Register a host-defined property, picking the Prop variant from its value type.
    pub fn extend(&mut self, custom: CustomProperty) -> Result<(), ActionError> {
        if self.defs.contains_key(&custom.property_id) {
            return Err(ActionError::DuplicateProperty {
                key: custom.property_id.to_string(),
            });
        }
        let class = PropClass::for_kind(custom.value_type);
        log::debug!(
            "registering custom property {} ({}.{}) as {:?}",
            custom.property_id,
            custom.class_name,
            custom.attrib,
            class
        );
        self.register(PropertyDef {
            id: custom.property_id,
            name: custom.attrib.clone(),
            class,
            force_update: class != PropClass::Curve && class != PropClass::ColorLinear,
            class_name: Some(custom.class_name),
            attributes: vec![AttributeDef::new(&custom.attrib, custom.value_type)],
        });
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&PropertyDef> {
        self.defs.get(&id)
    }

    pub fn lookup(&self, id: u32) -> Result<&PropertyDef, ActionError> {
        self.get(id)
            .ok_or(ActionError::UnknownProperty { property_id: id })
    }

    pub fn by_name(&self, name: &str) -> Option<&PropertyDef> {
        self.defs.values().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
