//! Identifiers for actions, transitions and graph nodes, plus the per-manager
//! id allocator ("cookie").

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ActionId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransitionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a manager's transition graph.
///
/// Persisted bundles encode the synthetic nodes as `0` (Entry) and `-1` (Exit);
/// real actions always have ids `>= 1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeId {
    Entry,
    Exit,
    Action(ActionId),
}

impl NodeId {
    pub fn from_raw(raw: i64) -> Option<NodeId> {
        match raw {
            0 => Some(NodeId::Entry),
            -1 => Some(NodeId::Exit),
            n if n > 0 && n <= u32::MAX as i64 => Some(NodeId::Action(ActionId(n as u32))),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i64 {
        match self {
            NodeId::Entry => 0,
            NodeId::Exit => -1,
            NodeId::Action(id) => id.0 as i64,
        }
    }

    #[inline]
    pub fn action(self) -> Option<ActionId> {
        match self {
            NodeId::Action(id) => Some(id),
            _ => None,
        }
    }
}

impl From<ActionId> for NodeId {
    fn from(id: ActionId) -> Self {
        NodeId::Action(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Entry => f.write_str("Entry"),
            NodeId::Exit => f.write_str("Exit"),
            NodeId::Action(id) => write!(f, "Action({id})"),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(self.to_raw())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(d)?;
        NodeId::from_raw(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid graph node id {raw}")))
    }
}

/// Monotonic id source shared by actions and transitions of one manager.
/// Starts at 1 so ids never collide with the Entry/Exit encodings.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    cookie: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { cookie: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn next(&mut self) -> u32 {
        let id = self.cookie;
        self.cookie = self.cookie.saturating_add(1);
        id
    }

    #[inline]
    pub fn alloc_action(&mut self) -> ActionId {
        ActionId(self.next())
    }

    #[inline]
    pub fn alloc_transition(&mut self) -> TransitionId {
        TransitionId(self.next())
    }

    /// Make sure future ids are strictly greater than `used` (restored ids).
    #[inline]
    pub fn observe(&mut self, used: u32) {
        if used >= self.cookie {
            self.cookie = used.saturating_add(1);
        }
    }

    #[inline]
    pub fn peek(&self) -> u32 {
        self.cookie
    }
}
