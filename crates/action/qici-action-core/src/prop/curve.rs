//! Bezier-driven numeric property.

use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

use crate::binding::{ActionHost, TargetHandle};
use crate::curve::BezierCurve;
use crate::error::ActionError;
use crate::registry::PropertyDef;
use crate::value::Value;

use super::{merge_times, unknown_attribute, AnimatedProp, Playhead};

/// How the sampled curve value is mapped onto the target attribute.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CurveType {
    /// `curve(t)`
    #[default]
    Absolute,
    /// `from + curve(t)`
    Relative,
    /// `from + curve(t) * to`
    TweenRelative,
    /// `from + curve(t) * (to - from)`
    TweenAbsolute,
}

impl CurveType {
    /// Persisted code. Unknown codes fall back to `TweenRelative`, the catch-all branch.
    pub fn from_code(code: i64) -> CurveType {
        match code {
            0 => CurveType::Absolute,
            1 => CurveType::Relative,
            3 => CurveType::TweenAbsolute,
            _ => CurveType::TweenRelative,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            CurveType::Absolute => 0,
            CurveType::Relative => 1,
            CurveType::TweenRelative => 2,
            CurveType::TweenAbsolute => 3,
        }
    }
}

/// Timeline of one attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveAttrib {
    pub curve: BezierCurve,
    pub curve_type: CurveType,
    /// Fixed origin; when `None` the origin is captured from the target.
    pub from: Option<f64>,
    pub to: Option<f64>,
    captured_from: Option<f64>,
}

impl CurveAttrib {
    pub fn new(curve: BezierCurve) -> Self {
        Self {
            curve,
            ..Self::default()
        }
    }

    /// Origin captured at the last playback start, if any.
    pub fn captured_from(&self) -> Option<f64> {
        self.captured_from
    }

    fn from_value(
        &mut self,
        host: &dyn ActionHost,
        target: &TargetHandle,
        attrib: &str,
        fallback: f64,
    ) -> f64 {
        if let Some(f) = self.from {
            return f;
        }
        *self.captured_from.get_or_insert_with(|| {
            host.get(target, attrib)
                .and_then(|v| v.as_number())
                .unwrap_or(fallback)
        })
    }

    fn map(&self, raw: f64, from: f64) -> f64 {
        match self.curve_type {
            CurveType::Absolute => raw,
            CurveType::Relative => from + raw,
            CurveType::TweenRelative => from + raw * self.to.unwrap_or(0.0),
            CurveType::TweenAbsolute => from + raw * (self.to.unwrap_or(from) - from),
        }
    }

    fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("curve".into(), self.curve.to_json());
        out.insert("curveType".into(), json!(self.curve_type.code()));
        if let Some(f) = self.from {
            out.insert("from".into(), json!(f));
        }
        if let Some(t) = self.to {
            out.insert("to".into(), json!(t));
        }
        Json::Object(out)
    }

    fn from_json(v: &Json) -> Result<CurveAttrib, ActionError> {
        // A bare array is a curve with the default mapping.
        if v.is_array() {
            return Ok(CurveAttrib::new(BezierCurve::from_json(v)?));
        }
        let obj = v.as_object().ok_or_else(|| ActionError::Serialization {
            reason: format!("curve attribute must be an object or array, got {v}"),
        })?;
        let curve = match obj.get("curve") {
            Some(c) => BezierCurve::from_json(c)?,
            None => BezierCurve::new(),
        };
        Ok(CurveAttrib {
            curve,
            curve_type: obj
                .get("curveType")
                .and_then(Json::as_i64)
                .map(CurveType::from_code)
                .unwrap_or_default(),
            from: obj.get("from").and_then(Json::as_f64),
            to: obj.get("to").and_then(Json::as_f64),
            captured_from: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurveProp {
    info: PropertyDef,
    attribs: IndexMap<String, CurveAttrib>,
}

impl CurveProp {
    pub fn new(info: PropertyDef) -> Self {
        let attribs = info
            .attributes
            .iter()
            .map(|a| (a.attrib.clone(), CurveAttrib::default()))
            .collect();
        Self { info, attribs }
    }

    /// Restore from `{ attrib: { curve, curveType, from?, to? } }`.
    /// Attributes the property does not declare are dropped with a warning.
    pub fn from_json(info: PropertyDef, json: &Json) -> Result<Self, ActionError> {
        let obj = json.as_object().ok_or_else(|| ActionError::Serialization {
            reason: format!("property {} must be an object", info.id),
        })?;
        let mut prop = CurveProp::new(info);
        for (attrib, v) in obj {
            let Some(slot) = prop.attribs.get_mut(attrib) else {
                log::warn!("property {} has no attribute '{}'", prop.info.id, attrib);
                continue;
            };
            *slot = CurveAttrib::from_json(v)?;
        }
        Ok(prop)
    }

    pub fn attrib(&self, attrib: &str) -> Option<&CurveAttrib> {
        self.attribs.get(attrib)
    }

    pub fn attrib_mut(&mut self, attrib: &str) -> Option<&mut CurveAttrib> {
        self.attribs.get_mut(attrib)
    }

    pub fn curve(&self, attrib: &str) -> Option<&BezierCurve> {
        self.attribs.get(attrib).map(|a| &a.curve)
    }

    pub fn curve_mut(&mut self, attrib: &str) -> Option<&mut BezierCurve> {
        self.attribs.get_mut(attrib).map(|a| &mut a.curve)
    }

    pub fn set_curve_type(&mut self, attrib: &str, curve_type: CurveType) -> Result<(), ActionError> {
        let info = &self.info;
        let slot = self
            .attribs
            .get_mut(attrib)
            .ok_or_else(|| unknown_attribute(info, attrib))?;
        slot.curve_type = curve_type;
        Ok(())
    }

    /// Fix (or clear, with `None`) the origin and tween target of an attribute.
    pub fn set_range(
        &mut self,
        attrib: &str,
        from: Option<f64>,
        to: Option<f64>,
    ) -> Result<(), ActionError> {
        let info = &self.info;
        let slot = self
            .attribs
            .get_mut(attrib)
            .ok_or_else(|| unknown_attribute(info, attrib))?;
        slot.from = from;
        slot.to = to;
        slot.captured_from = None;
        Ok(())
    }

    fn number(&self, attrib: &str, value: &Value) -> Result<f64, ActionError> {
        value.as_number().ok_or_else(|| ActionError::ValueTypeMismatch {
            attrib: attrib.to_string(),
            expected: "number".into(),
        })
    }
}

impl AnimatedProp for CurveProp {
    fn info(&self) -> &PropertyDef {
        &self.info
    }

    fn add_key(&mut self, attrib: &str, time: f64, value: Value) -> Result<usize, ActionError> {
        let v = self.number(attrib, &value)?;
        let info = &self.info;
        let curve = &mut self
            .attribs
            .get_mut(attrib)
            .ok_or_else(|| unknown_attribute(info, attrib))?
            .curve;
        match curve.find_key(time) {
            Some(idx) => {
                curve.set_key_value(idx, v);
                Ok(idx)
            }
            None => Ok(curve.add_key(time, v, None, None)),
        }
    }

    fn delete_key(&mut self, attrib: &str, time: f64) -> bool {
        let Some(curve) = self.curve_mut(attrib) else {
            return false;
        };
        match curve.find_key(time) {
            Some(idx) => curve.remove_key(idx).is_some(),
            None => false,
        }
    }

    fn key_times(&self, attrib: Option<&str>) -> Vec<f64> {
        let times = |a: &CurveAttrib| a.curve.keys().iter().map(|k| k.time).collect::<Vec<_>>();
        match attrib {
            Some(name) => self.attribs.get(name).map(times).unwrap_or_default(),
            None => merge_times(self.attribs.values().flat_map(times).collect()),
        }
    }

    fn duration(&self) -> f64 {
        self.attribs
            .values()
            .map(|a| a.curve.end_time())
            .fold(0.0, f64::max)
    }

    fn value_at(&self, attrib: &str, time: f64) -> Option<Value> {
        let curve = self.curve(attrib)?;
        (!curve.is_empty()).then(|| Value::Number(curve.evaluate(time)))
    }

    fn value_by_index(&self, attrib: &str, idx: usize) -> Option<Value> {
        self.curve(attrib)?.key(idx).map(|k| Value::Number(k.value))
    }

    fn is_key(&self, attrib: &str, time: f64) -> bool {
        self.curve(attrib)
            .is_some_and(|c| c.find_key(time).is_some())
    }

    fn update(&mut self, host: &mut dyn ActionHost, target: &TargetHandle, head: Playhead) {
        for (attrib, entry) in self.attribs.iter_mut() {
            if entry.curve.is_empty() {
                continue;
            }
            if head.is_begin {
                entry.captured_from = None;
            }
            let raw = entry.curve.evaluate(head.elapsed);
            if raw.is_nan() {
                continue;
            }
            let def = self.info.attribute(attrib);
            let value = if entry.curve_type == CurveType::Absolute {
                raw
            } else {
                let fallback = def
                    .and_then(|d| d.default.as_ref())
                    .and_then(Value::as_number)
                    .unwrap_or(0.0);
                let from = entry.from_value(&*host, target, attrib, fallback);
                entry.map(raw, from)
            };
            let value = def.map_or(value, |d| d.clamp(value));
            host.set(target, attrib, Value::Number(value));
        }
    }

    fn to_json(&self) -> Json {
        let mut out = Map::new();
        for (attrib, entry) in &self.attribs {
            if entry.curve.is_empty() && entry.from.is_none() && entry.to.is_none() {
                continue;
            }
            out.insert(attrib.clone(), entry.to_json());
        }
        Json::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_curve_type_code_falls_back_to_tween_relative() {
        assert_eq!(CurveType::from_code(7), CurveType::TweenRelative);
        assert_eq!(CurveType::from_code(CurveType::TweenAbsolute.code()), CurveType::TweenAbsolute);
    }

    #[test]
    fn tween_mappings() {
        let mut a = CurveAttrib::new(BezierCurve::new());
        a.to = Some(10.0);
        a.curve_type = CurveType::TweenRelative;
        assert_eq!(a.map(0.5, 2.0), 7.0);
        a.curve_type = CurveType::TweenAbsolute;
        assert_eq!(a.map(0.5, 2.0), 6.0);
        a.curve_type = CurveType::Relative;
        assert_eq!(a.map(0.5, 2.0), 2.5);
    }
}
