//! On-disk state layout and record storage.
//!
//! All coordination state lives as small JSON documents under a single state
//! directory, typically on a network filesystem shared by every agent. This
//! module owns the directory layout; the submodules each own one record
//! class and the file discipline around it.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::OpsError;

pub mod build_lock;
pub mod claims;
pub mod current_build;
pub mod heartbeat;
pub mod json;
pub mod lease;
pub mod queue;
pub mod results;

pub use build_lock::{BuildLock, BuildLockFile};
pub use claims::{Claim, ClaimRegistry};
pub use current_build::{CurrentBuild, CurrentBuildStore};
pub use heartbeat::{Heartbeat, HeartbeatSink};
pub use queue::RequestQueue;
pub use results::{BuildResult, ResultSink};

/// Environment variable naming the state directory when `--state-dir` is absent.
pub const STATE_DIR_ENV: &str = "TRI_STATE_DIR";

const OPS_SUBDIRS: [&str; 7] = [
    "heartbeats",
    "requests",
    "claims",
    "results",
    "locks",
    "archive/requests",
    "archive/claims",
];

/// The state directory and every well-known path inside it.
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state directory from an explicit argument, falling back to
    /// `TRI_STATE_DIR`. An empty value counts as unset.
    pub fn resolve(state_dir: Option<PathBuf>) -> Result<Self, OpsError> {
        let root = state_dir
            .or_else(|| {
                env::var_os(STATE_DIR_ENV)
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from)
            })
            .ok_or_else(|| {
                OpsError::Input(format!("{STATE_DIR_ENV} is required (or use --state-dir)"))
            })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ops_dir(&self) -> PathBuf {
        self.root.join("ops")
    }

    pub fn heartbeats_dir(&self) -> PathBuf {
        self.ops_dir().join("heartbeats")
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.ops_dir().join("requests")
    }

    pub fn claims_dir(&self) -> PathBuf {
        self.ops_dir().join("claims")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.ops_dir().join("results")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.ops_dir().join("locks")
    }

    pub fn archive_requests_dir(&self) -> PathBuf {
        self.ops_dir().join("archive/requests")
    }

    pub fn archive_claims_dir(&self) -> PathBuf {
        self.ops_dir().join("archive/claims")
    }

    pub fn builds_dir(&self) -> PathBuf {
        self.root.join("builds")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn request_path(&self, id: &str) -> PathBuf {
        self.requests_dir().join(format!("{id}.json"))
    }

    pub fn claim_path(&self, id: &str) -> PathBuf {
        self.claims_dir().join(format!("{id}.json"))
    }

    pub fn result_path(&self, id: &str) -> PathBuf {
        self.results_dir().join(format!("{id}.json"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.locks_dir().join("build.lock")
    }

    /// Create the directory tree, idempotently.
    ///
    /// Safe to call from every command and from concurrent processes;
    /// existing directories are not an error.
    pub fn init(&self) -> Result<()> {
        for sub in OPS_SUBDIRS {
            let dir = self.ops_dir().join(sub);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        for dir in [
            self.builds_dir().join("inbox"),
            self.builds_dir().join("inbox_archive"),
            self.runs_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
