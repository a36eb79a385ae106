//! Core configuration for qici-action-core.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// Defaults applied to actions created at runtime and bounds on per-tick output.
/// Keep this minimal; bundles carry their own per-action settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Frame-rate basis (frames per second) for new actions.
    pub default_samples: u32,
    /// Whether new actions fire timeline events while driven by an editor.
    pub play_event_in_editor: bool,
    /// Loop flag for new actions.
    pub default_loop: bool,
    /// Signals queued per timeline between drains; later ones are dropped.
    pub max_signals_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_samples: 60,
            play_event_in_editor: false,
            default_loop: false,
            max_signals_per_tick: 1024,
        }
    }
}

impl Config {
    /// Parse host overrides; absent fields keep their defaults.
    pub fn from_json(s: &str) -> Result<Self, ActionError> {
        let cfg: Config = serde_json::from_str(s)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg = Config::from_json(r#"{ "defaultSamples": 30 }"#).unwrap();
        assert_eq!(cfg.default_samples, 30);
        assert_eq!(cfg.max_signals_per_tick, 1024);
        assert!(!cfg.default_loop);
    }
}
