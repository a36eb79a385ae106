//! A single timeline: animated properties plus time-stamped script events.
//!
//! Time inside an action is counted in frames (`samples` per second). Each
//! `update()` advances the elapsed frame count from the host clock, writes
//! every bound property onto its target and fires the events crossed since
//! the previous tick. The returned `Trigger` drives manager transitions.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::binding::{coerce_args, ActionHost, TargetHandle, TargetResolver};
use crate::config::Config;
use crate::error::ActionError;
use crate::ids::ActionId;
use crate::prop::{AnimatedProp, Playhead, Prop, PropKey};
use crate::registry::PropertyRegistry;
use crate::signals::{Outbox, Signal};
use crate::transition::Trigger;
use crate::value::Value;

/// Script call scheduled at a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub func: String,
    /// Stored parameter, coerced to an argument list when fired.
    pub para: Json,
}

#[derive(Debug)]
pub struct Action {
    pub(crate) id: ActionId,
    uuid: String,
    pub name: String,
    /// Persisted reference of the target (object uuid).
    pub(crate) target_ref: Option<String>,
    target: Option<TargetHandle>,
    /// When set, `play_action` keeps the current target.
    pub target_locked: bool,
    samples: u32,
    properties: IndexMap<PropKey, Prop>,
    /// Resolved (prop, target) pairs, rebuilt when stale.
    bindings: Option<Vec<(PropKey, TargetHandle)>>,
    events: Vec<Event>,
    duration: f64,
    start_time: f64,
    elapsed: f64,
    pub looping: bool,
    pub play_event_in_editor: bool,
    running: bool,
    outbox: Outbox,
}

impl Action {
    pub fn new(name: impl Into<String>, config: &Config) -> Self {
        Self {
            id: ActionId(0),
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            target_ref: None,
            target: None,
            target_locked: false,
            samples: config.default_samples.max(1),
            properties: IndexMap::new(),
            bindings: None,
            events: Vec::new(),
            duration: 0.0,
            start_time: 0.0,
            elapsed: 0.0,
            looping: config.default_loop,
            play_event_in_editor: config.play_event_in_editor,
            running: false,
            outbox: Outbox::with_capacity(config.max_signals_per_tick),
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub(crate) fn set_uuid(&mut self, uuid: String) {
        self.uuid = uuid;
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Frame rate basis. Zero is treated as one.
    pub fn set_samples(&mut self, samples: u32) {
        self.samples = samples.max(1);
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_frame(&self) -> f64 {
        self.elapsed
    }

    pub fn target(&self) -> Option<&TargetHandle> {
        self.target.as_ref()
    }

    pub fn target_ref(&self) -> Option<&str> {
        self.target_ref.as_deref()
    }

    /// Bind a live target. Property bindings are rebuilt on the next tick.
    pub fn set_target(&mut self, target: Option<TargetHandle>) {
        if self.target != target {
            self.target_ref = target.clone().or(self.target_ref.take());
            self.target = target;
            self.bindings = None;
        }
    }

    /// Resolve the persisted target reference and bind all properties.
    pub fn awake<R: TargetResolver + ?Sized>(&mut self, resolver: &R) {
        if self.target.is_none() {
            if let Some(r) = &self.target_ref {
                self.target = resolver.lookup(r);
                if self.target.is_none() {
                    log::warn!("action '{}': target {} not found", self.name, r);
                }
            }
        }
        self.bindings = None;
        self.ensure_bound(resolver);
    }

    fn ensure_bound<R: TargetResolver + ?Sized>(&mut self, resolver: &R) {
        if self.bindings.is_some() {
            return;
        }
        let Some(root) = &self.target else {
            return;
        };
        let mut bound = Vec::with_capacity(self.properties.len());
        for key in self.properties.keys() {
            match resolver.find_child(root, &key.path) {
                Some(handle) => bound.push((key.clone(), handle)),
                None => log::warn!("action '{}': path '{}' not found under {}", self.name, key.path, root),
            }
        }
        self.bindings = Some(bound);
    }

    // ---- properties ----

    /// Add an empty property for `(path, property_id)`.
    pub fn add_property(
        &mut self,
        registry: &PropertyRegistry,
        path: &str,
        property_id: u32,
    ) -> Result<&mut Prop, ActionError> {
        let key = PropKey::new(path, property_id);
        if self.properties.contains_key(&key) {
            log::error!("action '{}': property {} already exists", self.name, key);
            return Err(ActionError::DuplicateProperty { key: key.to_string() });
        }
        let info = registry.lookup(property_id).map_err(|e| {
            log::error!("action '{}': {}", self.name, e);
            e
        })?;
        self.bindings = None;
        Ok(self.properties.entry(key).or_insert_with(|| Prop::new(info)))
    }

    /// Insert a ready-made property, replacing any previous one under the same key.
    pub fn insert_property(&mut self, key: PropKey, prop: Prop) {
        self.extend_duration(prop.duration());
        self.properties.insert(key, prop);
        self.bindings = None;
    }

    pub fn delete_property(&mut self, path: &str, property_id: u32) -> Result<Prop, ActionError> {
        let key = PropKey::new(path, property_id);
        let prop = self.properties.shift_remove(&key).ok_or_else(|| {
            log::error!("action '{}': property {} not found", self.name, key);
            ActionError::MissingProperty { key: key.to_string() }
        })?;
        self.bindings = None;
        Ok(prop)
    }

    pub fn property(&self, path: &str, property_id: u32) -> Option<&Prop> {
        self.properties.get(&PropKey::new(path, property_id))
    }

    /// Direct access to a property. Key edits made through it do not extend the
    /// duration; call `get_duration(true)` afterwards.
    pub fn property_mut(&mut self, path: &str, property_id: u32) -> Option<&mut Prop> {
        self.properties.get_mut(&PropKey::new(path, property_id))
    }

    pub fn properties(&self) -> impl Iterator<Item = (&PropKey, &Prop)> {
        self.properties.iter()
    }

    fn prop_or_missing(&mut self, path: &str, property_id: u32) -> Result<&mut Prop, ActionError> {
        let key = PropKey::new(path, property_id);
        self.properties
            .get_mut(&key)
            .ok_or(ActionError::MissingProperty { key: key.to_string() })
    }

    /// Add a key to a property and extend the duration to cover it.
    pub fn add_key(
        &mut self,
        path: &str,
        property_id: u32,
        attrib: &str,
        time: f64,
        value: impl Into<Value>,
    ) -> Result<usize, ActionError> {
        let idx = self
            .prop_or_missing(path, property_id)?
            .add_key(attrib, time, value.into())?;
        self.extend_duration(time);
        Ok(idx)
    }

    pub fn set_value(
        &mut self,
        path: &str,
        property_id: u32,
        attrib: &str,
        time: f64,
        value: impl Into<Value>,
    ) -> Result<(), ActionError> {
        self.prop_or_missing(path, property_id)?
            .set_value(attrib, time, value.into())?;
        self.extend_duration(time);
        Ok(())
    }

    pub fn delete_key(
        &mut self,
        path: &str,
        property_id: u32,
        attrib: &str,
        time: f64,
    ) -> Result<bool, ActionError> {
        Ok(self.prop_or_missing(path, property_id)?.delete_key(attrib, time))
    }

    // ---- events ----

    /// Schedule `func` at `time`; events at equal times keep insertion order.
    pub fn add_event(&mut self, time: f64, func: impl Into<String>, para: Json) -> usize {
        let idx = self.events.partition_point(|e| e.time <= time);
        self.events.insert(
            idx,
            Event {
                time,
                func: func.into(),
                para,
            },
        );
        self.extend_duration(time);
        idx
    }

    /// Remove the first event at `time` (optionally only one calling `func`).
    pub fn delete_event(&mut self, time: f64, func: Option<&str>) -> Option<Event> {
        let idx = self
            .events
            .iter()
            .position(|e| e.time == time && func.map_or(true, |f| e.func == f))?;
        Some(self.events.remove(idx))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn set_events(&mut self, mut events: Vec<Event>) {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        for e in &events {
            self.extend_duration(e.time);
        }
        self.events = events;
    }

    // ---- duration ----

    fn extend_duration(&mut self, time: f64) {
        if time > self.duration {
            self.duration = time;
        }
    }

    /// Current duration in frames. With `recompute`, rebuilt from the last key
    /// of every property and the last event.
    pub fn get_duration(&mut self, recompute: bool) -> f64 {
        if recompute {
            let props = self.properties.values().map(|p| p.duration());
            let events = self.events.last().map(|e| e.time);
            self.duration = props.chain(events).fold(0.0, f64::max);
        }
        self.duration
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Override the duration; it never drops below the last key or event.
    pub fn set_duration(&mut self, duration: f64) {
        let floor = self.get_duration(true);
        self.duration = duration.max(floor);
    }

    // ---- playback ----

    pub fn reset(&mut self, now_ms: f64) {
        self.elapsed = 0.0;
        self.start_time = now_ms;
    }

    /// Start playing on `target` (ignored while the target is locked) and
    /// apply the first frame immediately.
    pub fn play_action(
        &mut self,
        host: &mut dyn ActionHost,
        target: Option<TargetHandle>,
        from_begin: bool,
    ) -> Option<Trigger> {
        if !self.target_locked && target.is_some() {
            self.set_target(target);
        }
        if self.target.is_none() && self.target_ref.is_some() {
            self.awake(&*host);
        }
        self.running = true;
        let begin = from_begin || self.elapsed <= 0.0;
        let now = host.now_ms();
        if begin {
            self.reset(now);
        } else {
            self.start_time = now;
        }
        log::debug!("action '{}' started (from_begin={})", self.name, begin);
        self.outbox.push(Signal::Started {
            timeline: self.uuid.clone(),
        });
        self.update(host, None, begin, false, false)
    }

    /// Pause playback; state is kept so `play_action(.., false)` resumes.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("action '{}' stopped at frame {}", self.name, self.elapsed);
        }
        self.running = false;
    }

    /// Release all properties, events and queued signals.
    pub fn destroy(&mut self) {
        self.running = false;
        self.properties.clear();
        self.events.clear();
        self.bindings = None;
        self.outbox.clear();
        self.duration = 0.0;
    }

    /// Advance by `delta_ms` (the host frame delta when `None`).
    pub fn update(
        &mut self,
        host: &mut dyn ActionHost,
        delta_ms: Option<f64>,
        is_begin: bool,
        in_editor: bool,
        force_update: bool,
    ) -> Option<Trigger> {
        if !self.running && !in_editor {
            return None;
        }
        let now = host.now_ms();
        let mut is_begin = is_begin;
        let mut delta_ms = delta_ms;
        if !is_begin && !in_editor && self.elapsed >= self.duration {
            if !self.looping {
                self.running = false;
                log::debug!("action '{}' finished", self.name);
                self.outbox.push(Signal::Finished {
                    timeline: self.uuid.clone(),
                });
                return Some(Trigger::Finish);
            }
            let overshoot = (self.elapsed - self.duration) / self.samples as f64 * 1000.0;
            log::trace!("action '{}' looped (overshoot {}ms)", self.name, overshoot);
            self.outbox.push(Signal::LoopFinished {
                timeline: self.uuid.clone(),
            });
            self.reset(now);
            self.start_time = now - overshoot;
            delta_ms = Some(overshoot);
            is_begin = true;
        }

        let mut delta = delta_ms
            .filter(|d| d.is_finite())
            .unwrap_or_else(|| host.frame_delta_ms());
        if now == self.start_time {
            delta = 0.0;
        }
        let pre_elapsed = if is_begin { -1.0 } else { self.elapsed };
        self.elapsed += delta * self.samples as f64 / 1000.0;

        self.apply(
            host,
            Playhead {
                elapsed: self.elapsed,
                is_begin,
                in_editor,
                force_update,
            },
        );

        if in_editor && !self.play_event_in_editor {
            return None;
        }
        self.fire_events(host, pre_elapsed)
    }

    /// Jump to `frame` and force-apply every property, without firing events.
    pub fn seek(&mut self, host: &mut dyn ActionHost, frame: f64) {
        self.elapsed = frame.max(0.0);
        self.apply(
            host,
            Playhead {
                elapsed: self.elapsed,
                is_begin: false,
                in_editor: true,
                force_update: true,
            },
        );
    }

    fn apply(&mut self, host: &mut dyn ActionHost, head: Playhead) {
        self.ensure_bound(&*host);
        let Some(bindings) = &self.bindings else {
            return;
        };
        for (key, handle) in bindings {
            if let Some(prop) = self.properties.get_mut(key) {
                prop.update(host, handle, head);
            }
        }
    }

    fn fire_events(&mut self, host: &mut dyn ActionHost, pre_elapsed: f64) -> Option<Trigger> {
        let (first, last) = (self.events.first()?, self.events.last()?);
        if self.elapsed < first.time || pre_elapsed > last.time {
            return None;
        }
        let target = self.target.clone()?;
        let start = self.events.partition_point(|e| e.time <= pre_elapsed);
        for ev in &self.events[start..] {
            if ev.time > self.elapsed {
                break;
            }
            let ret = host.invoke(&target, &ev.func, &coerce_args(&ev.para));
            let trigger = ret.filter(Value::is_truthy).map(|v| v.trigger_key());
            log::trace!("action '{}' event {} at {} -> {:?}", self.name, ev.func, ev.time, trigger);
            self.outbox.push(Signal::EventFired {
                timeline: self.uuid.clone(),
                func: ev.func.clone(),
                time: ev.time,
                trigger: trigger.clone(),
            });
            if let Some(key) = trigger {
                return Some(Trigger::Event(key));
            }
        }
        None
    }

    pub fn take_signals(&mut self) -> Vec<Signal> {
        self.outbox.take()
    }
}
