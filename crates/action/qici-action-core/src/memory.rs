//! In-memory host: a flat object table with attribute maps, child paths,
//! scripted functions and a manual clock.
//!
//! Used by tests, benches and headless tools; real adapters implement the
//! traits in `binding` against their own scene graph.

use std::fmt;

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::binding::{AttributeAccess, ScriptDispatch, TargetHandle, TargetResolver, TimeSource};
use crate::value::Value;

pub type ScriptFn = Box<dyn FnMut(&[Json]) -> Value>;

/// A script attached to an object: a bag of named functions.
#[derive(Default)]
pub struct MemoryScript {
    pub name: String,
    functions: HashMap<String, ScriptFn>,
}

impl MemoryScript {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    pub fn with_fn(
        mut self,
        func: impl Into<String>,
        f: impl FnMut(&[Json]) -> Value + 'static,
    ) -> Self {
        self.functions.insert(func.into(), Box::new(f));
        self
    }
}

impl fmt::Debug for MemoryScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScript")
            .field("name", &self.name)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct MemoryObject {
    pub attributes: IndexMap<String, Value>,
    pub children: HashMap<String, TargetHandle>,
    pub scripts: Vec<MemoryScript>,
}

/// One recorded script invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptCall {
    pub target: TargetHandle,
    pub func: String,
    pub args: Vec<Json>,
}

#[derive(Debug)]
pub struct MemoryHost {
    objects: HashMap<TargetHandle, MemoryObject>,
    now_ms: f64,
    frame_delta_ms: f64,
    /// Every attribute write in order: (target, attrib, value).
    pub writes: Vec<(TargetHandle, String, Value)>,
    /// Every script function that was found and called.
    pub calls: Vec<ScriptCall>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            now_ms: 0.0,
            frame_delta_ms: 1000.0 / 60.0,
            writes: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) an object.
    pub fn add_object(&mut self, handle: impl Into<TargetHandle>) -> &mut MemoryObject {
        let slot = self.objects.entry(handle.into()).or_default();
        *slot = MemoryObject::default();
        slot
    }

    pub fn object(&self, handle: &str) -> Option<&MemoryObject> {
        self.objects.get(handle)
    }

    pub fn object_mut(&mut self, handle: &str) -> Option<&mut MemoryObject> {
        self.objects.get_mut(handle)
    }

    /// Register `child` under `parent` with the given segment name.
    pub fn add_child(&mut self, parent: &str, name: impl Into<String>, child: impl Into<String>) {
        let child = child.into();
        if !self.objects.contains_key(&child) {
            self.add_object(child.clone());
        }
        if let Some(p) = self.objects.get_mut(parent) {
            p.children.insert(name.into(), child);
        }
    }

    pub fn set_attr(&mut self, handle: &str, attrib: &str, value: impl Into<Value>) {
        if let Some(o) = self.objects.get_mut(handle) {
            o.attributes.insert(attrib.to_string(), value.into());
        }
    }

    pub fn attr(&self, handle: &str, attrib: &str) -> Option<&Value> {
        self.objects.get(handle)?.attributes.get(attrib)
    }

    pub fn number(&self, handle: &str, attrib: &str) -> Option<f64> {
        self.attr(handle, attrib).and_then(Value::as_number)
    }

    pub fn attach_script(&mut self, handle: &str, script: MemoryScript) {
        if let Some(o) = self.objects.get_mut(handle) {
            o.scripts.push(script);
        }
    }

    /// Advance the clock by one frame of `dt_ms`.
    pub fn advance(&mut self, dt_ms: f64) {
        self.frame_delta_ms = dt_ms;
        self.now_ms += dt_ms;
    }

    pub fn set_now(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    /// Values written to one attribute, in write order.
    pub fn writes_to(&self, handle: &str, attrib: &str) -> Vec<Value> {
        self.writes
            .iter()
            .filter(|(t, a, _)| t == handle && a == attrib)
            .map(|(_, _, v)| v.clone())
            .collect()
    }
}

impl TargetResolver for MemoryHost {
    fn lookup(&self, uuid: &str) -> Option<TargetHandle> {
        self.objects.contains_key(uuid).then(|| uuid.to_string())
    }

    fn find_child(&self, root: &TargetHandle, path: &str) -> Option<TargetHandle> {
        let mut current = root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.objects.get(&current)?.children.get(segment)?.clone();
        }
        self.objects.contains_key(&current).then_some(current)
    }
}

impl AttributeAccess for MemoryHost {
    fn get(&self, target: &TargetHandle, attrib: &str) -> Option<Value> {
        self.attr(target, attrib).cloned()
    }

    fn set(&mut self, target: &TargetHandle, attrib: &str, value: Value) {
        if let Some(o) = self.objects.get_mut(target) {
            o.attributes.insert(attrib.to_string(), value.clone());
            self.writes.push((target.clone(), attrib.to_string(), value));
        }
    }
}

impl ScriptDispatch for MemoryHost {
    fn invoke(&mut self, target: &TargetHandle, func: &str, args: &[Json]) -> Option<Value> {
        let object = self.objects.get_mut(target)?;
        let mut result = None;
        for script in object.scripts.iter_mut() {
            if let Some(f) = script.functions.get_mut(func) {
                self.calls.push(ScriptCall {
                    target: target.clone(),
                    func: func.to_string(),
                    args: args.to_vec(),
                });
                let ret = f(args);
                let truthy = ret.is_truthy();
                result = Some(ret);
                if truthy {
                    break;
                }
            }
        }
        result
    }
}

impl TimeSource for MemoryHost {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn frame_delta_ms(&self) -> f64 {
        self.frame_delta_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_resolve_through_segments() {
        let mut host = MemoryHost::new();
        host.add_object("root");
        host.add_child("root", "arm", "arm-1");
        host.add_child("arm-1", "hand", "hand-1");
        let root = "root".to_string();
        assert_eq!(host.find_child(&root, ""), Some("root".into()));
        assert_eq!(host.find_child(&root, "arm/hand"), Some("hand-1".into()));
        assert_eq!(host.find_child(&root, "arm/foot"), None);
    }

    #[test]
    fn first_truthy_script_result_wins() {
        let mut host = MemoryHost::new();
        host.add_object("o");
        host.attach_script("o", MemoryScript::new("a").with_fn("hit", |_| Value::Null));
        host.attach_script(
            "o",
            MemoryScript::new("b").with_fn("hit", |_| Value::Text("boom".into())),
        );
        host.attach_script(
            "o",
            MemoryScript::new("c").with_fn("hit", |_| Value::Text("late".into())),
        );
        let ret = host.invoke(&"o".to_string(), "hit", &[]);
        assert_eq!(ret, Some(Value::Text("boom".into())));
        assert_eq!(host.calls.len(), 2);
        assert_eq!(host.invoke(&"o".to_string(), "missing", &[]), None);
    }
}
