use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    timelines: HashMap<String, String>,
    projects: HashMap<String, String>,
}

/// A timeline fixture: the elements it animates plus the timeline itself.
///
/// Generic so this crate stays independent of the engine's model types.
#[derive(Debug, Deserialize)]
pub struct TimelineFixture<E, T> {
    pub elements: E,
    pub timeline: T,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod timelines {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.timelines.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.timelines, "timeline", name)?)
    }

    /// Load the fixture as `{ elements, timeline }`.
    pub fn load<E: DeserializeOwned, T: DeserializeOwned>(
        name: &str,
    ) -> Result<TimelineFixture<E, T>> {
        super::load_json(lookup(&MANIFEST.timelines, "timeline", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.timelines, "timeline", name)?))
    }
}

pub mod projects {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.projects.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.projects, "project", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(&MANIFEST.projects, "project", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.projects, "project", name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_resolves() {
        for name in timelines::keys() {
            let value: TimelineFixture<serde_json::Value, serde_json::Value> =
                timelines::load(&name).unwrap();
            assert!(value.elements.is_array(), "{name} elements");
            assert!(value.timeline.get("duration").is_some(), "{name} duration");
        }
        for name in projects::keys() {
            let value: serde_json::Value = projects::load(&name).unwrap();
            assert!(value.get("schemaVersion").is_some(), "{name}");
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(timelines::json("nope").is_err());
    }
}
