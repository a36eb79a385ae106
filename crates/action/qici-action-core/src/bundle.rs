//! Persisted bundle format and restoration.
//!
//! Bundles are parsed with serde first, then converted into runtime types.
//! Conversion tolerates bad data below the top-level document: a malformed
//! property, event list, dependency or transition is logged and skipped so
//! the rest of the bundle still loads. Scalar fields of the wrong type fall
//! back to their default, and a library entry that is not a bundle at all is
//! dropped from the library.
//!
//! Restore order for a manager: scripts, timelines (recursively), transitions,
//! target reference, then `awake()` when a resolver is supplied.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value as Json};

use crate::action::{Action, Event};
use crate::binding::TargetResolver;
use crate::config::Config;
use crate::error::ActionError;
use crate::ids::{ActionId, NodeId, TransitionId};
use crate::manager::{ActionManager, Timeline};
use crate::prop::{AnimatedProp, Prop, PropKey};
use crate::registry::PropertyRegistry;
use crate::transition::{Condition, Transition};

/// Deserialize a field, falling back to its default when the stored value has the wrong shape.
fn lenient<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Json::deserialize(de)?;
    Ok(serde_json::from_value(raw).unwrap_or_else(|e| {
        log::error!("ignoring malformed bundle field: {}", e);
        T::default()
    }))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBundle {
    #[serde(default, deserialize_with = "lenient")]
    pub id: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub uuid: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Target object uuid.
    #[serde(default, deserialize_with = "lenient")]
    pub target_object: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub target_locked: bool,
    #[serde(default, deserialize_with = "lenient", rename = "loop")]
    pub looping: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub samples: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub play_event_in_editor: Option<bool>,
    /// `path -> propertyId -> prop json`
    #[serde(default, deserialize_with = "lenient")]
    pub property_list: IndexMap<String, IndexMap<String, Json>>,
    /// JSON-encoded `[[time, funcName, para], ...]`.
    #[serde(default, deserialize_with = "lenient")]
    pub event_list: String,
}

/// One persisted edge. Endpoints and condition are checked on restore, so a
/// bad row only loses that transition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBundle {
    /// 0 = Entry
    #[serde(default, deserialize_with = "lenient")]
    pub from_action: Option<i64>,
    /// -1 = Exit
    #[serde(default, deserialize_with = "lenient")]
    pub to_action: Option<i64>,
    /// Tagged object, `"FinishTrigger"`, or an event key. See [`Condition::from_json`].
    #[serde(default)]
    pub condition: Json,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub func_name: Option<String>,
    #[serde(default)]
    pub func_para: Json,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerBundle {
    #[serde(default, deserialize_with = "lenient")]
    pub id: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub uuid: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub target_object: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub target_locked: bool,
    #[serde(default)]
    pub scripts: Json,
    /// `action id -> timeline uuid`, resolved through a [`BundleLibrary`].
    #[serde(default, deserialize_with = "lenient")]
    pub action_list: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    pub transition_list: IndexMap<String, TransitionBundle>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum TimelineBundle {
    #[serde(rename = "Action")]
    Action(ActionBundle),
    #[serde(rename = "ActionManager")]
    Manager(ManagerBundle),
}

impl TimelineBundle {
    pub fn uuid(&self) -> &str {
        match self {
            TimelineBundle::Action(b) => &b.uuid,
            TimelineBundle::Manager(b) => &b.uuid,
        }
    }
}

/// Source of bundles referenced by uuid.
pub trait BundleLibrary {
    fn bundle(&self, uuid: &str) -> Option<&TimelineBundle>;
}

impl BundleLibrary for hashbrown::HashMap<String, TimelineBundle> {
    fn bundle(&self, uuid: &str) -> Option<&TimelineBundle> {
        self.get(uuid)
    }
}

impl BundleLibrary for std::collections::HashMap<String, TimelineBundle> {
    fn bundle(&self, uuid: &str) -> Option<&TimelineBundle> {
        self.get(uuid)
    }
}

fn parse_bundle(item: Json, at: &str) -> Option<TimelineBundle> {
    serde_json::from_value(item)
        .map_err(|e| log::error!("skipping library entry {}: {}", at, e))
        .ok()
}

/// Parse a library document: either an array of bundles or a `uuid -> bundle` map.
///
/// Only a document that is not valid JSON, or not an array or object, is an
/// error. Entries that do not parse as bundles are logged and left out.
pub fn library_from_json(s: &str) -> Result<hashbrown::HashMap<String, TimelineBundle>, ActionError> {
    let doc: Json = serde_json::from_str(s)?;
    let mut lib = hashbrown::HashMap::new();
    match doc {
        Json::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                let Some(b) = parse_bundle(item, &format!("#{i}")) else {
                    continue;
                };
                lib.insert(b.uuid().to_string(), b);
            }
        }
        Json::Object(map) => {
            for (uuid, item) in map {
                let Some(mut b) = parse_bundle(item, &uuid) else {
                    continue;
                };
                if b.uuid().is_empty() {
                    match &mut b {
                        TimelineBundle::Action(a) => a.uuid = uuid.clone(),
                        TimelineBundle::Manager(m) => m.uuid = uuid.clone(),
                    }
                }
                lib.insert(uuid, b);
            }
        }
        other => {
            return Err(ActionError::Serialization {
                reason: format!("bundle library must be an array or object, got {other}"),
            })
        }
    }
    Ok(lib)
}

fn parse_events(raw: &str, name: &str) -> Vec<Event> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let rows: Vec<Json> = match serde_json::from_str(raw) {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("action '{}': malformed eventList: {}", name, e);
            return Vec::new();
        }
    };
    rows.iter()
        .filter_map(|row| {
            let parsed = row.as_array().and_then(|r| {
                Some(Event {
                    time: r.first()?.as_f64()?,
                    func: r.get(1)?.as_str()?.to_string(),
                    para: r.get(2).cloned().unwrap_or(Json::Null),
                })
            });
            if parsed.is_none() {
                log::error!("action '{}': skipping malformed event {}", name, row);
            }
            parsed
        })
        .collect()
}

/// Build an action from its bundle. Target resolution is left to `awake()`.
pub fn restore_action(bundle: &ActionBundle, registry: &PropertyRegistry, config: &Config) -> Action {
    let mut action = Action::new(bundle.name.clone().unwrap_or_default(), config);
    if !bundle.uuid.is_empty() {
        action.set_uuid(bundle.uuid.clone());
    }
    action.id = ActionId(bundle.id);
    action.target_locked = bundle.target_locked;
    action.looping = bundle.looping;
    if let Some(s) = bundle.samples {
        action.set_samples(s);
    }
    if let Some(p) = bundle.play_event_in_editor {
        action.play_event_in_editor = p;
    }

    for (path, props) in &bundle.property_list {
        for (pid, json) in props {
            let Ok(property_id) = pid.parse::<u32>() else {
                log::error!("action '{}': bad property id '{}'", action.name, pid);
                continue;
            };
            let info = match registry.lookup(property_id) {
                Ok(info) => info,
                Err(e) => {
                    log::error!("action '{}': {}", action.name, e);
                    continue;
                }
            };
            match Prop::from_json(info, json) {
                Ok(prop) => action.insert_property(PropKey::new(path.clone(), property_id), prop),
                Err(e) => log::error!("action '{}': property {}:{}: {}", action.name, path, pid, e),
            }
        }
    }
    let events = parse_events(&bundle.event_list, &action.name);
    action.set_events(events);
    action.target_ref = bundle.target_object.clone();
    action
}

/// Build a manager and, recursively, every timeline it references.
pub fn restore_manager(
    bundle: &ManagerBundle,
    library: &dyn BundleLibrary,
    registry: &PropertyRegistry,
    config: &Config,
) -> ActionManager {
    let mut stack = Vec::new();
    restore_manager_inner(bundle, library, registry, config, &mut stack)
}

fn restore_manager_inner(
    bundle: &ManagerBundle,
    library: &dyn BundleLibrary,
    registry: &PropertyRegistry,
    config: &Config,
    stack: &mut Vec<String>,
) -> ActionManager {
    let mut m = ActionManager::new(bundle.name.clone().unwrap_or_default(), config);
    if !bundle.uuid.is_empty() {
        m.set_uuid(bundle.uuid.clone());
    }
    m.id = ActionId(bundle.id);
    m.target_locked = bundle.target_locked;
    m.scripts = bundle.scripts.clone();
    stack.push(m.uuid().to_string());

    for (raw_id, uuid) in &bundle.action_list {
        let id = match raw_id.parse::<u32>() {
            Ok(id) if id > 0 => ActionId(id),
            _ => {
                log::error!("manager '{}': bad action id '{}'", m.name, raw_id);
                continue;
            }
        };
        if stack.contains(uuid) {
            log::error!("manager '{}': {} references itself", m.name, uuid);
            continue;
        }
        match library.bundle(uuid) {
            Some(TimelineBundle::Action(b)) => {
                m.insert_action_with_id(id, restore_action(b, registry, config));
            }
            Some(TimelineBundle::Manager(b)) => {
                let child = restore_manager_inner(b, library, registry, config, stack);
                m.insert_action_with_id(id, child);
            }
            None => log::error!(
                "manager '{}': {}",
                m.name,
                ActionError::UnresolvedDependency { uuid: uuid.clone() }
            ),
        }
    }
    stack.pop();

    for (raw_id, t) in &bundle.transition_list {
        let endpoints = (
            t.from_action.and_then(NodeId::from_raw),
            t.to_action.and_then(NodeId::from_raw),
        );
        let (Ok(id), (Some(from), Some(to))) = (raw_id.parse::<u32>(), endpoints) else {
            log::error!("manager '{}': bad transition '{}'", m.name, raw_id);
            continue;
        };
        let Some(condition) = Condition::from_json(&t.condition) else {
            log::error!(
                "manager '{}': transition {} has malformed condition {}",
                m.name,
                raw_id,
                t.condition
            );
            continue;
        };
        let transition = Transition {
            id: TransitionId(id),
            from,
            to,
            condition,
            func_name: t.func_name.clone(),
            func_para: t.func_para.clone(),
        };
        if let Err(e) = m.insert_transition(transition) {
            log::error!("manager '{}': transition {}: {}", m.name, raw_id, e);
        }
    }
    m.target_ref = bundle.target_object.clone();
    m
}

/// Restore the timeline stored under `uuid`, waking it when a resolver is given.
pub fn restore(
    uuid: &str,
    library: &dyn BundleLibrary,
    registry: &PropertyRegistry,
    config: &Config,
    resolver: Option<&dyn TargetResolver>,
) -> Result<Timeline, ActionError> {
    let bundle = library
        .bundle(uuid)
        .ok_or_else(|| ActionError::UnresolvedDependency { uuid: uuid.to_string() })?;
    let mut timeline = match bundle {
        TimelineBundle::Action(b) => Timeline::Action(restore_action(b, registry, config)),
        TimelineBundle::Manager(b) => restore_manager(b, library, registry, config).into(),
    };
    if let Some(r) = resolver {
        timeline.awake(r);
    }
    Ok(timeline)
}

impl Action {
    pub fn to_bundle(&self) -> ActionBundle {
        let mut property_list: IndexMap<String, IndexMap<String, Json>> = IndexMap::new();
        for (key, prop) in self.properties() {
            property_list
                .entry(key.path.clone())
                .or_default()
                .insert(key.property_id.to_string(), prop.to_json());
        }
        let events: Vec<Json> = self
            .events()
            .iter()
            .map(|e| json!([e.time, e.func, e.para]))
            .collect();
        ActionBundle {
            id: self.id().0,
            uuid: self.uuid().to_string(),
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            target_object: self.target_ref().map(str::to_string),
            target_locked: self.target_locked,
            looping: self.looping,
            samples: Some(self.samples()),
            play_event_in_editor: Some(self.play_event_in_editor),
            property_list,
            event_list: if events.is_empty() {
                String::new()
            } else {
                Json::Array(events).to_string()
            },
        }
    }
}

impl ActionManager {
    pub fn to_bundle(&self) -> ManagerBundle {
        ManagerBundle {
            id: self.id().0,
            uuid: self.uuid().to_string(),
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            target_object: self.target_ref().map(str::to_string),
            target_locked: self.target_locked,
            scripts: self.scripts.clone(),
            action_list: self
                .actions()
                .map(|(id, tl)| (id.to_string(), tl.uuid().to_string()))
                .collect(),
            transition_list: self
                .transitions()
                .map(|t| {
                    (
                        t.id.to_string(),
                        TransitionBundle {
                            from_action: Some(t.from.to_raw()),
                            to_action: Some(t.to.to_raw()),
                            condition: t.condition.to_json(),
                            func_name: t.func_name.clone(),
                            func_para: t.func_para.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Write this manager and every nested timeline into `library`.
    pub fn export(&self, library: &mut hashbrown::HashMap<String, TimelineBundle>) {
        library.insert(self.uuid().to_string(), TimelineBundle::Manager(self.to_bundle()));
        for (_, tl) in self.actions() {
            match tl {
                Timeline::Action(a) => {
                    library.insert(a.uuid().to_string(), TimelineBundle::Action(a.to_bundle()));
                }
                Timeline::Manager(m) => m.export(library),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_event_rows_are_skipped() {
        let events = parse_events(r#"[[5, "open", "door"], ["x"], [2, "close"]]"#, "t");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].func, "open");
        assert_eq!(events[1].para, Json::Null);
        assert!(parse_events("not json", "t").is_empty());
        assert!(parse_events("", "t").is_empty());
    }
}
