//! Per-request build outcomes.
//!
//! One record per request id under `ops/results/`, fully replaced on write.
//! The coordinator records outcomes; it does not check that the writer still
//! holds a live claim. That policy belongs to the caller.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{json, lease, StateLayout};

/// The outcome of one rebuild request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub id: String,
    pub status: String,
    pub utc: String,
    pub published_build_path: String,
    pub build_commit: String,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildResult {
    pub fn new(
        id: String,
        status: String,
        published_build_path: String,
        build_commit: String,
        logs: Vec<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            id,
            status,
            utc: lease::utc_iso(lease::utc_now()),
            published_build_path,
            build_commit,
            logs,
            error,
        }
    }
}

/// The result files under `ops/results/`.
#[derive(Debug, Clone)]
pub struct ResultSink {
    dir: PathBuf,
}

impl ResultSink {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            dir: layout.results_dir(),
        }
    }

    pub fn write(&self, result: &BuildResult) -> Result<()> {
        json::write_json_atomic(&self.dir.join(format!("{}.json", result.id)), result)
    }

    pub fn read(&self, id: &str) -> Option<BuildResult> {
        json::read_json(&self.dir.join(format!("{id}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let temp = TempDir::new().unwrap();
        let layout = StateLayout::new(temp.path());
        layout.init().unwrap();
        let sink = ResultSink::new(&layout);

        let result = BuildResult::new(
            "r-1".to_string(),
            "ok".to_string(),
            "/builds/1".to_string(),
            "abcd".to_string(),
            vec!["configure".to_string(), "compile".to_string()],
            None,
        );
        sink.write(&result).unwrap();
        assert_eq!(sink.read("r-1"), Some(result));
    }

    #[test]
    fn error_field_is_omitted_when_absent() {
        let result = BuildResult::new(
            "r-1".to_string(),
            "ok".to_string(),
            "/builds/1".to_string(),
            "abcd".to_string(),
            Vec::new(),
            None,
        );
        let raw = json::to_canonical_string(&result).unwrap();
        assert!(!raw.contains("error"));
        assert!(raw.contains(r#""logs":[]"#));

        let failed = BuildResult::new(
            "r-2".to_string(),
            "failed".to_string(),
            "/builds/2".to_string(),
            "ef01".to_string(),
            Vec::new(),
            Some("link error".to_string()),
        );
        let raw = json::to_canonical_string(&failed).unwrap();
        assert!(raw.contains(r#""error":"link error""#));
    }
}
