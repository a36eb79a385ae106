//! Error types for the action system

use serde::{Deserialize, Serialize};

/// Errors reported by the action core.
///
/// Apart from the panics documented on the registry, nothing in this crate
/// aborts on bad data: APIs return one of these and leave state untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActionError {
    /// Property id has no registry entry
    #[error("Unknown property id: {property_id}")]
    UnknownProperty { property_id: u32 },

    /// Property already present on the action
    #[error("Property already exists: {key}")]
    DuplicateProperty { key: String },

    /// Property not present on the action
    #[error("Property not found: {key}")]
    MissingProperty { key: String },

    /// Attribute not owned by the property
    #[error("Attribute '{attrib}' not found in property {key}")]
    UnknownAttribute { key: String, attrib: String },

    /// Value kind not accepted by the property variant
    #[error("Value type mismatch for '{attrib}': expected {expected}")]
    ValueTypeMismatch { attrib: String, expected: String },

    /// Action id not present in the manager
    #[error("Action not found: {id}")]
    UnknownAction { id: u32 },

    /// Transition id not present in the manager
    #[error("Transition not found: {id}")]
    UnknownTransition { id: u32 },

    /// Transition endpoints are not allowed (leaving Exit, entering Entry, unknown node)
    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition { from: i64, to: i64 },

    /// Manager has nothing leaving the Entry node
    #[error("No entry transition defined for manager '{manager}'")]
    NoEntryTransition { manager: String },

    /// Bundle references a dependency that cannot be found (or forms a cycle)
    #[error("Unresolved bundle dependency: {uuid}")]
    UnresolvedDependency { uuid: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// Generic action error
    #[error("Action error: {message}")]
    Generic { message: String },
}

impl ActionError {
    /// Create a new generic error
    pub fn new(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownProperty { .. }
            | Self::DuplicateProperty { .. }
            | Self::MissingProperty { .. }
            | Self::UnknownAttribute { .. }
            | Self::ValueTypeMismatch { .. } => "config",
            Self::UnknownAction { .. }
            | Self::UnknownTransition { .. }
            | Self::InvalidTransition { .. }
            | Self::NoEntryTransition { .. } => "graph",
            Self::UnresolvedDependency { .. } | Self::Serialization { .. } => "serialization",
            Self::Generic { .. } => "generic",
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = ActionError::DuplicateProperty {
            key: "child:1".into(),
        };
        assert_eq!(err.category(), "config");
        let err = ActionError::NoEntryTransition {
            manager: "door".into(),
        };
        assert_eq!(err.category(), "graph");
        let err: ActionError = serde_json::from_str::<u32>("oops").unwrap_err().into();
        assert_eq!(err.category(), "serialization");
    }

    #[test]
    fn test_serialization() {
        let error = ActionError::new("test");
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: ActionError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
