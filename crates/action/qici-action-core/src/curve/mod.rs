//! Keyframe curves.
//!
//! - `Keyframe`: one sample with in/out tangents
//! - `BezierCurve`: sorted keyframes, cubic-bezier evaluation, wrap modes,
//!   tangent policies and the persisted array form

pub mod bezier;
pub mod keyframe;

pub use bezier::{BezierCurve, WrapMode};
pub use keyframe::{Keyframe, TangentMode};
