//! Per-project current-build pointers.
//!
//! `builds/current_<project>.json` names the artifact that is live for a
//! project. Project names are lowercased so the pointer path is stable
//! however callers spell the project. Writes are full replacements; there is
//! no merging.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::{json, lease, StateLayout};

/// Pointer to the currently published build of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentBuild {
    pub project: String,
    pub path: String,
    pub executable: String,
    pub build_commit: String,
    pub utc: String,
    pub build_id: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CurrentBuild {
    pub fn new(
        project: &str,
        path: String,
        executable: String,
        build_commit: String,
        build_id: String,
        request_id: String,
        notes: Option<String>,
    ) -> Self {
        Self {
            project: project.to_lowercase(),
            path,
            executable,
            build_commit,
            utc: lease::utc_iso(lease::utc_now()),
            build_id,
            request_id,
            notes,
        }
    }
}

/// The pointer files under `builds/`.
#[derive(Debug, Clone)]
pub struct CurrentBuildStore {
    dir: PathBuf,
}

impl CurrentBuildStore {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            dir: layout.builds_dir(),
        }
    }

    fn path(&self, project: &str) -> PathBuf {
        self.dir.join(format!("current_{}.json", project.to_lowercase()))
    }

    pub fn write(&self, pointer: &CurrentBuild) -> Result<()> {
        json::write_json_atomic(&self.path(&pointer.project), pointer)
    }

    /// Read the raw pointer record so callers can project arbitrary fields,
    /// including ones written by newer producers.
    pub fn read(&self, project: &str) -> Option<Map<String, Value>> {
        match json::read_json::<Value>(&self.path(project))? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}
