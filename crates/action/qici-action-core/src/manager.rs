//! Graph scheduler over actions (and nested managers).
//!
//! Nodes are timelines plus the synthetic Entry/Exit nodes; edges are
//! transitions guarded by a condition. Several timelines may be active at
//! once. Each active node is an independent token that moves along the
//! edges its triggers match. A node is active at most once: reaching an
//! already active node restarts it in place.

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::action::Action;
use crate::binding::{coerce_args, ActionHost, TargetHandle, TargetResolver};
use crate::config::Config;
use crate::error::ActionError;
use crate::ids::{ActionId, IdAllocator, NodeId, TransitionId};
use crate::signals::{Outbox, Signal};
use crate::transition::{Condition, Transition, Trigger};

/// A node of the graph: a plain action or a nested manager.
#[derive(Debug)]
pub enum Timeline {
    Action(Action),
    Manager(Box<ActionManager>),
}

impl From<Action> for Timeline {
    fn from(a: Action) -> Self {
        Timeline::Action(a)
    }
}

impl From<ActionManager> for Timeline {
    fn from(m: ActionManager) -> Self {
        Timeline::Manager(Box::new(m))
    }
}

impl Timeline {
    pub fn id(&self) -> ActionId {
        match self {
            Timeline::Action(a) => a.id,
            Timeline::Manager(m) => m.id,
        }
    }

    fn set_id(&mut self, id: ActionId) {
        match self {
            Timeline::Action(a) => a.id = id,
            Timeline::Manager(m) => m.id = id,
        }
    }

    pub fn uuid(&self) -> &str {
        match self {
            Timeline::Action(a) => a.uuid(),
            Timeline::Manager(m) => m.uuid(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Timeline::Action(a) => &a.name,
            Timeline::Manager(m) => &m.name,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Timeline::Action(a) => Some(a),
            Timeline::Manager(_) => None,
        }
    }

    pub fn as_action_mut(&mut self) -> Option<&mut Action> {
        match self {
            Timeline::Action(a) => Some(a),
            Timeline::Manager(_) => None,
        }
    }

    pub fn as_manager(&self) -> Option<&ActionManager> {
        match self {
            Timeline::Manager(m) => Some(m),
            Timeline::Action(_) => None,
        }
    }

    pub fn as_manager_mut(&mut self) -> Option<&mut ActionManager> {
        match self {
            Timeline::Manager(m) => Some(m),
            Timeline::Action(_) => None,
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            Timeline::Action(a) => a.is_running(),
            Timeline::Manager(m) => m.is_running(),
        }
    }

    pub fn play(
        &mut self,
        host: &mut dyn ActionHost,
        target: Option<TargetHandle>,
        from_begin: bool,
    ) -> Result<Option<Trigger>, ActionError> {
        match self {
            Timeline::Action(a) => Ok(a.play_action(host, target, from_begin)),
            Timeline::Manager(m) => m.play_action(host, target, from_begin).map(|_| None),
        }
    }

    pub fn update(&mut self, host: &mut dyn ActionHost, delta_ms: Option<f64>) -> Option<Trigger> {
        match self {
            Timeline::Action(a) => a.update(host, delta_ms, false, false, false),
            Timeline::Manager(m) => m.update(host, delta_ms),
        }
    }

    pub fn awake<R: TargetResolver + ?Sized>(&mut self, resolver: &R) {
        match self {
            Timeline::Action(a) => a.awake(resolver),
            Timeline::Manager(m) => m.awake(resolver),
        }
    }

    pub fn stop(&mut self) {
        match self {
            Timeline::Action(a) => a.stop(),
            Timeline::Manager(m) => m.stop(),
        }
    }

    pub fn destroy(&mut self) {
        match self {
            Timeline::Action(a) => a.destroy(),
            Timeline::Manager(m) => m.destroy(),
        }
    }

    pub fn take_signals(&mut self) -> Vec<Signal> {
        match self {
            Timeline::Action(a) => a.take_signals(),
            Timeline::Manager(m) => m.take_signals(),
        }
    }
}

#[derive(Debug)]
pub struct ActionManager {
    pub(crate) id: ActionId,
    uuid: String,
    pub name: String,
    pub(crate) target_ref: Option<String>,
    target: Option<TargetHandle>,
    pub target_locked: bool,
    /// Script descriptors attached to the manager, kept opaque.
    pub scripts: Json,
    timelines: IndexMap<ActionId, Timeline>,
    active: Vec<ActionId>,
    /// Triggers reported by first frames, resolved at the start of the next pass.
    pending: Vec<(ActionId, Trigger)>,
    transitions: IndexMap<TransitionId, Transition>,
    outgoing: HashMap<NodeId, Vec<TransitionId>>,
    incoming: HashMap<NodeId, Vec<TransitionId>>,
    ids: IdAllocator,
    running: bool,
    finished: bool,
    outbox: Outbox,
}

impl ActionManager {
    pub fn new(name: impl Into<String>, config: &Config) -> Self {
        Self {
            id: ActionId(0),
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            target_ref: None,
            target: None,
            target_locked: false,
            scripts: Json::Null,
            timelines: IndexMap::new(),
            active: Vec::new(),
            pending: Vec::new(),
            transitions: IndexMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            ids: IdAllocator::new(),
            running: false,
            finished: false,
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

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True once the manager reached Exit (until it is played again).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn target(&self) -> Option<&TargetHandle> {
        self.target.as_ref()
    }

    pub fn target_ref(&self) -> Option<&str> {
        self.target_ref.as_deref()
    }

    pub fn set_target(&mut self, target: Option<TargetHandle>) {
        self.target_ref = target.clone().or(self.target_ref.take());
        self.target = target;
    }

    /// Resolve the persisted target and wake every child.
    pub fn awake<R: TargetResolver + ?Sized>(&mut self, resolver: &R) {
        if self.target.is_none() {
            if let Some(r) = &self.target_ref {
                self.target = resolver.lookup(r);
                if self.target.is_none() {
                    log::warn!("manager '{}': target {} not found", self.name, r);
                }
            }
        }
        for tl in self.timelines.values_mut() {
            tl.awake(resolver);
        }
    }

    // ---- graph editing ----

    /// Add a timeline and give it a fresh id.
    pub fn add_action(&mut self, timeline: impl Into<Timeline>) -> ActionId {
        let id = self.ids.alloc_action();
        let mut timeline = timeline.into();
        timeline.set_id(id);
        self.timelines.insert(id, timeline);
        id
    }

    /// Insert a timeline under a persisted id.
    pub(crate) fn insert_action_with_id(&mut self, id: ActionId, timeline: impl Into<Timeline>) {
        self.ids.observe(id.0);
        let mut timeline = timeline.into();
        timeline.set_id(id);
        self.timelines.insert(id, timeline);
    }

    /// Remove a timeline together with every transition touching it.
    pub fn delete_action(&mut self, id: ActionId) -> Result<Timeline, ActionError> {
        let mut timeline = self
            .timelines
            .shift_remove(&id)
            .ok_or(ActionError::UnknownAction { id: id.0 })?;
        let node = NodeId::Action(id);
        let touching: Vec<TransitionId> = self
            .outgoing
            .get(&node)
            .into_iter()
            .chain(self.incoming.get(&node))
            .flatten()
            .copied()
            .collect();
        for tid in touching {
            self.unlink(tid);
        }
        self.outgoing.remove(&node);
        self.incoming.remove(&node);
        self.active.retain(|a| *a != id);
        self.pending.retain(|(a, _)| *a != id);
        timeline.stop();
        log::debug!("manager '{}': deleted action {}", self.name, id);
        Ok(timeline)
    }

    pub fn action(&self, id: ActionId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut Timeline> {
        self.timelines.get_mut(&id)
    }

    pub fn actions(&self) -> impl Iterator<Item = (&ActionId, &Timeline)> {
        self.timelines.iter()
    }

    fn check_endpoints(&self, from: NodeId, to: NodeId) -> Result<(), ActionError> {
        let known = |n: NodeId| match n {
            NodeId::Action(id) => self.timelines.contains_key(&id),
            _ => true,
        };
        if from == NodeId::Exit || to == NodeId::Entry || !known(from) || !known(to) {
            return Err(ActionError::InvalidTransition {
                from: from.to_raw(),
                to: to.to_raw(),
            });
        }
        Ok(())
    }

    pub fn add_transition(
        &mut self,
        from: NodeId,
        to: NodeId,
        condition: Condition,
    ) -> Result<TransitionId, ActionError> {
        self.check_endpoints(from, to)?;
        let id = self.ids.alloc_transition();
        self.link(Transition::new(id, from, to, condition));
        Ok(id)
    }

    /// Insert a fully specified transition, keeping its id.
    pub fn insert_transition(&mut self, transition: Transition) -> Result<(), ActionError> {
        self.check_endpoints(transition.from, transition.to)?;
        self.ids.observe(transition.id.0);
        if self.transitions.contains_key(&transition.id) {
            self.unlink(transition.id);
        }
        self.link(transition);
        Ok(())
    }

    pub fn delete_transition(&mut self, id: TransitionId) -> Result<Transition, ActionError> {
        self.unlink(id).ok_or(ActionError::UnknownTransition { id: id.0 })
    }

    fn link(&mut self, t: Transition) {
        self.outgoing.entry(t.from).or_default().push(t.id);
        self.incoming.entry(t.to).or_default().push(t.id);
        self.transitions.insert(t.id, t);
    }

    fn unlink(&mut self, id: TransitionId) -> Option<Transition> {
        let t = self.transitions.shift_remove(&id)?;
        if let Some(v) = self.outgoing.get_mut(&t.from) {
            v.retain(|x| *x != id);
        }
        if let Some(v) = self.incoming.get_mut(&t.to) {
            v.retain(|x| *x != id);
        }
        Some(t)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(&id)
    }

    pub fn transition_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.transitions.get_mut(&id)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn transitions_from(&self, node: NodeId) -> Vec<&Transition> {
        self.edges(self.outgoing.get(&node))
    }

    /// Incoming edges of a node, in insertion order.
    pub fn transitions_to(&self, node: NodeId) -> Vec<&Transition> {
        self.edges(self.incoming.get(&node))
    }

    fn edges(&self, ids: Option<&Vec<TransitionId>>) -> Vec<&Transition> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.transitions.get(id))
            .collect()
    }

    /// Ids of the currently active timelines, in tick order.
    pub fn active_actions(&self) -> &[ActionId] {
        &self.active
    }

    // ---- playback ----

    /// Start from Entry when nothing is active or `from_begin` is set.
    pub fn play_action(
        &mut self,
        host: &mut dyn ActionHost,
        target: Option<TargetHandle>,
        from_begin: bool,
    ) -> Result<(), ActionError> {
        if !self.target_locked && target.is_some() {
            self.set_target(target);
        }
        if self.target.is_none() && self.target_ref.is_some() {
            self.awake(&*host);
        }
        if !self.active.is_empty() && !from_begin {
            self.running = true;
            return Ok(());
        }
        let entries: Vec<TransitionId> = self.outgoing.get(&NodeId::Entry).cloned().unwrap_or_default();
        if entries.is_empty() {
            log::error!("manager '{}': no entry transition", self.name);
            return Err(ActionError::NoEntryTransition {
                manager: self.name.clone(),
            });
        }
        self.halt_active();
        self.running = true;
        self.finished = false;
        log::debug!("manager '{}' started", self.name);
        self.outbox.push(Signal::Started {
            timeline: self.uuid.clone(),
        });
        for tid in entries {
            self.take_transition(host, tid);
        }
        Ok(())
    }

    /// Follow a transition: run its transfer function, then (re)start the destination.
    /// A trigger reported by the destination's first frame is queued in `pending`.
    fn take_transition(&mut self, host: &mut dyn ActionHost, tid: TransitionId) -> Option<ActionId> {
        let t = self.transitions.get(&tid)?;
        let (from, to) = (t.from, t.to);
        log::debug!("manager '{}': transition {} {} -> {}", self.name, tid, from, to);
        if let (Some(func), Some(target)) = (&t.func_name, &self.target) {
            if host.invoke(target, func, &coerce_args(&t.func_para)).is_none() {
                log::warn!("manager '{}': transfer function '{}' not found", self.name, func);
            }
        }
        self.outbox.push(Signal::TransitionTaken {
            manager: self.uuid.clone(),
            transition: tid,
            from,
            to,
        });
        let id = to.action()?;
        let target = self.target.clone();
        let tl = self.timelines.get_mut(&id)?;
        let first = match tl.play(host, target, true) {
            Ok(trigger) => trigger,
            Err(e) => {
                log::error!("manager '{}': cannot start {}: {}", self.name, id, e);
                return None;
            }
        };
        let signals = tl.take_signals();
        self.outbox.extend(signals);
        self.pending.retain(|(a, _)| *a != id);
        if let Some(trigger) = first {
            self.pending.push((id, trigger));
        }
        if !self.active.contains(&id) {
            self.active.push(id);
        }
        Some(id)
    }

    /// Tick every active timeline and move tokens along matching edges.
    ///
    /// Triggers queued by first frames since the last pass are followed first.
    /// Every active timeline is then ticked in order, even when one of them
    /// reaches Exit; the manager stops once the pass is complete.
    pub fn update(&mut self, host: &mut dyn ActionHost, delta_ms: Option<f64>) -> Option<Trigger> {
        if !self.running {
            return None;
        }
        let mut finished: Vec<ActionId> = Vec::new();
        let mut started: Vec<ActionId> = Vec::new();
        let mut exit = false;

        for (id, trigger) in std::mem::take(&mut self.pending) {
            if self.active.contains(&id) {
                exit |= self.follow(host, id, &trigger, &mut finished, &mut started);
            }
        }

        let snapshot = self.active.clone();
        for id in snapshot {
            // started this pass (restart in place) or removed by a transfer function
            if started.contains(&id) || !self.active.contains(&id) {
                continue;
            }
            let Some(tl) = self.timelines.get_mut(&id) else {
                continue;
            };
            let trigger = tl.update(host, delta_ms);
            let signals = tl.take_signals();
            self.outbox.extend(signals);
            if let Some(trigger) = trigger {
                exit |= self.follow(host, id, &trigger, &mut finished, &mut started);
            }
        }

        if exit {
            self.finish();
            return Some(Trigger::Finish);
        }
        self.active.retain(|a| !finished.contains(a));
        if self.active.is_empty() {
            log::debug!("manager '{}': no active timeline left", self.name);
            self.finish();
            return Some(Trigger::Finish);
        }
        None
    }

    /// Take every edge of `id` matching `trigger`. Returns true when one led to Exit.
    fn follow(
        &mut self,
        host: &mut dyn ActionHost,
        id: ActionId,
        trigger: &Trigger,
        finished: &mut Vec<ActionId>,
        started: &mut Vec<ActionId>,
    ) -> bool {
        if *trigger == Trigger::Finish {
            finished.push(id);
        }
        let matching: Vec<TransitionId> = self
            .transitions_from(NodeId::Action(id))
            .into_iter()
            .filter(|t| t.condition.matches(trigger))
            .map(|t| t.id)
            .collect();
        if matching.is_empty() {
            if let Trigger::Event(key) = trigger {
                log::warn!("manager '{}': event '{}' of {} matches no transition", self.name, key, id);
            }
        }
        let mut exit = false;
        for tid in matching {
            if self.transitions.get(&tid).is_some_and(Transition::is_exit) {
                self.take_transition(host, tid);
                exit = true;
            } else if let Some(dest) = self.take_transition(host, tid) {
                finished.retain(|f| *f != dest);
                started.push(dest);
            }
        }
        exit
    }

    fn finish(&mut self) {
        self.halt_active();
        self.running = false;
        self.finished = true;
        log::debug!("manager '{}' finished", self.name);
        self.outbox.push(Signal::ManagerFinished {
            manager: self.uuid.clone(),
        });
    }

    fn halt_active(&mut self) {
        self.pending.clear();
        for id in std::mem::take(&mut self.active) {
            if let Some(tl) = self.timelines.get_mut(&id) {
                tl.stop();
            }
        }
    }

    pub fn stop(&mut self) {
        self.halt_active();
        self.running = false;
    }

    pub fn destroy(&mut self) {
        self.stop();
        for tl in self.timelines.values_mut() {
            tl.destroy();
        }
        self.timelines.clear();
        self.transitions.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.outbox.clear();
    }

    pub fn take_signals(&mut self) -> Vec<Signal> {
        self.outbox.take()
    }
}
