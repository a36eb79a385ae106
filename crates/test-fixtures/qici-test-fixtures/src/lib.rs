//! JSON bundles shared by the action crate's tests and benches.
//!
//! `fixtures/manifest.json` names each file: `actions` are single timeline
//! bundles, `libraries` are whole bundle documents plus the uuid to restore.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Deserialize)]
struct Manifest {
    actions: HashMap<String, String>,
    libraries: HashMap<String, Library>,
}

#[derive(Deserialize)]
struct Library {
    path: String,
    root: String,
}

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../fixtures/manifest.json"))
        .expect("fixtures manifest should parse")
});

fn read(rel: &str) -> Result<String> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures").join(rel);
    std::fs::read_to_string(&path).with_context(|| format!("reading fixture {}", path.display()))
}

fn entry<'a, T>(map: &'a HashMap<String, T>, name: &str) -> Result<&'a T> {
    map.get(name).ok_or_else(|| anyhow!("no fixture named '{name}'"))
}

pub mod actions {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.actions.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read(entry(&MANIFEST.actions, name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let text = json(name)?;
        serde_json::from_str(&text).with_context(|| format!("parsing action fixture '{name}'"))
    }
}

pub mod libraries {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.libraries.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read(&entry(&MANIFEST.libraries, name)?.path)
    }

    /// Uuid of the timeline to restore from this library.
    pub fn root(name: &str) -> Result<String> {
        Ok(entry(&MANIFEST.libraries, name)?.root.clone())
    }
}
