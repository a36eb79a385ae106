//! Single curve sample.

use serde::{Deserialize, Serialize};

/// How a keyframe's tangents were produced. Only `Auto` keys are recomputed
/// when their neighbours change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TangentMode {
    #[default]
    Auto = 0,
    FreeSmooth = 1,
    Flat = 2,
    Broken = 3,
    Linear = 4,
}

impl TangentMode {
    pub fn from_code(code: i64) -> Option<TangentMode> {
        match code {
            0 => Some(TangentMode::Auto),
            1 => Some(TangentMode::FreeSmooth),
            2 => Some(TangentMode::Flat),
            3 => Some(TangentMode::Broken),
            4 => Some(TangentMode::Linear),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// A (time, value) sample with slopes on either side.
///
/// Tangents are slopes in value units per time unit. An infinite tangent marks
/// a vertical (stepped) segment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f64,
    pub value: f64,
    pub in_tangent: f64,
    pub out_tangent: f64,
    pub mode: TangentMode,
}

impl Keyframe {
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            mode: TangentMode::Auto,
        }
    }

    pub fn with_tangents(time: f64, value: f64, in_tangent: f64, out_tangent: f64) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
            mode: if in_tangent == out_tangent {
                TangentMode::FreeSmooth
            } else {
                TangentMode::Broken
            },
        }
    }

    /// Stepped segments use an infinite out tangent.
    #[inline]
    pub fn is_stepped(&self) -> bool {
        self.out_tangent.is_infinite()
    }
}
