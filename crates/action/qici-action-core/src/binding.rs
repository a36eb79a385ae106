//! Host capability traits.
//!
//! The action core never sees concrete scene objects. Targets are addressed by
//! an opaque handle and every read, write, script call and clock query goes
//! through these traits. Adapters implement them and pass a single
//! `&mut dyn ActionHost` into `update()`.

use serde_json::Value as Json;

use crate::value::Value;

/// Opaque target handle (object uuid).
pub type TargetHandle = String;

/// Resolve persisted references and child paths into live handles.
pub trait TargetResolver {
    /// Look up a live object by its persisted uuid.
    fn lookup(&self, uuid: &str) -> Option<TargetHandle>;
    /// Resolve a `/`-separated child path below `root`. The empty path is `root`.
    fn find_child(&self, root: &TargetHandle, path: &str) -> Option<TargetHandle>;
}

/// Reflective attribute access on targets.
pub trait AttributeAccess {
    fn get(&self, target: &TargetHandle, attrib: &str) -> Option<Value>;
    fn set(&mut self, target: &TargetHandle, attrib: &str, value: Value);
}

/// Named-function dispatch on the scripts attached to a target.
pub trait ScriptDispatch {
    /// Probe the target's scripts for `func` and call it with `args`.
    ///
    /// Returns `None` when no script defines `func`. Otherwise returns the
    /// first truthy result, or the last result when none is truthy.
    fn invoke(&mut self, target: &TargetHandle, func: &str, args: &[Json]) -> Option<Value>;
}

/// Monotonic clock of the host game loop, in milliseconds.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
    /// Duration of the current frame.
    fn frame_delta_ms(&self) -> f64;
}

/// Everything an action needs from its host.
pub trait ActionHost: TargetResolver + AttributeAccess + ScriptDispatch + TimeSource {}

impl<T> ActionHost for T where T: TargetResolver + AttributeAccess + ScriptDispatch + TimeSource {}

/// Coerce stored event/transition parameters to an argument list: a bare
/// string becomes a one-element list, an array is kept, anything else is empty.
pub fn coerce_args(para: &Json) -> Vec<Json> {
    match para {
        Json::String(_) => vec![para.clone()],
        Json::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_coercion() {
        assert_eq!(coerce_args(&json!("door")), vec![json!("door")]);
        assert_eq!(coerce_args(&json!([1, "a"])), vec![json!(1), json!("a")]);
        assert!(coerce_args(&json!(5)).is_empty());
        assert!(coerce_args(&Json::Null).is_empty());
    }
}
