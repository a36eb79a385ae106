//! Graph edges between timelines and the triggers that fire them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::ids::{NodeId, TransitionId};
use crate::value::Value;

/// What a timeline reports back to its manager on a tick.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The timeline ran to completion.
    Finish,
    /// A timeline event returned a truthy value; carries its key.
    Event(String),
}

/// Guard of a transition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "lowercase")]
pub enum Condition {
    Finish,
    Event(String),
}

impl Condition {
    pub fn matches(&self, trigger: &Trigger) -> bool {
        match (self, trigger) {
            (Condition::Finish, Trigger::Finish) => true,
            (Condition::Event(want), Trigger::Event(got)) => want == got,
            _ => false,
        }
    }

    /// Read a persisted condition.
    ///
    /// Accepts the tagged object form as well as a bare scalar: `"FinishTrigger"`
    /// (or `"finish"`) for Finish, any other string or number as an event key.
    /// Returns `None` for anything else.
    pub fn from_json(raw: &Json) -> Option<Condition> {
        match raw {
            Json::String(s) if s.is_empty() => None,
            Json::String(s) if s == "FinishTrigger" || s == "finish" => Some(Condition::Finish),
            Json::String(s) => Some(Condition::Event(s.clone())),
            Json::Number(_) => Some(Condition::Event(Value::from_json(raw).trigger_key())),
            Json::Object(_) => serde_json::from_value(raw.clone()).ok(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Condition::Finish => json!({ "type": "finish" }),
            Condition::Event(key) => json!({ "type": "event", "key": key }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    pub from: NodeId,
    pub to: NodeId,
    pub condition: Condition,
    /// Transfer function invoked on the manager target's scripts when taken.
    pub func_name: Option<String>,
    pub func_para: Json,
}

impl Transition {
    pub fn new(id: TransitionId, from: NodeId, to: NodeId, condition: Condition) -> Self {
        Self {
            id,
            from,
            to,
            condition,
            func_name: None,
            func_para: Json::Null,
        }
    }

    pub fn with_func(mut self, name: impl Into<String>, para: Json) -> Self {
        self.func_name = Some(name.into());
        self.func_para = para;
        self
    }

    #[inline]
    pub fn is_exit(&self) -> bool {
        self.to == NodeId::Exit
    }
}
