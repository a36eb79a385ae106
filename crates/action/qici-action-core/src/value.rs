//! Attribute values read from and written to targets.
//!
//! Targets expose heterogeneous attributes addressed by name; every value that
//! crosses the host boundary is one of these variants.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Bool,
    Text,
    Color,
    Texture,
    Null,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar (positions, angles, alpha, slider values...)
    Number(f64),
    /// Step-only boolean
    Bool(bool),
    /// Step-only string
    Text(String),
    /// RGBA color, components in 0..1
    Color([f32; 4]),
    /// Texture handle: atlas key plus optional frame name
    Texture { atlas: String, frame: Option<String> },
    Null,
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::Color(_) => ValueKind::Color,
            Value::Texture { .. } => ValueKind::Texture,
            Value::Null => ValueKind::Null,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    #[inline]
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Script-style truthiness: `0`, `NaN`, `false`, `""` and `Null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Text(s) => !s.is_empty(),
            Value::Color(_) | Value::Texture { .. } => true,
            Value::Null => false,
        }
    }

    /// Key used to match a script return value against event-trigger transitions.
    pub fn trigger_key(&self) -> String {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
            Value::Color(c) => format!("{:?}", c),
            Value::Texture { atlas, frame } => match frame {
                Some(f) => format!("{atlas}:{f}"),
                None => atlas.clone(),
            },
            Value::Null => String::new(),
        }
    }

    /// Convert a loosely typed JSON scalar (as stored in key lists) into a Value.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) if items.len() == 4 => {
                let mut c = [0.0f32; 4];
                for (slot, item) in c.iter_mut().zip(items) {
                    *slot = item.as_f64().unwrap_or(0.0) as f32;
                }
                Value::Color(c)
            }
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => serde_json::json!(n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Color(c) => serde_json::json!([c[0], c[1], c[2], c[3]]),
            Value::Texture { atlas, frame } => serde_json::json!([atlas, frame]),
            Value::Null => serde_json::Value::Null,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_script_rules() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Number(-2.0).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Text("open".into()).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn trigger_keys_are_stable() {
        assert_eq!(Value::Number(3.0).trigger_key(), "3");
        assert_eq!(Value::Text("hit".into()).trigger_key(), "hit");
        assert_eq!(Value::Bool(true).trigger_key(), "true");
    }
}
