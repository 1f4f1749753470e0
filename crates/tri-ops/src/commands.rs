//! Command execution logic for all CLI operations.
//!
//! `CommandExecutor` binds the state directory layout to the per-concern
//! storage managers. Every method re-reads state from disk; there is no
//! cache to invalidate, because the filesystem is the single source of truth
//! across hosts. Each method also runs the layout initializer first, so any
//! command can be the one that bootstraps a fresh state directory.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{Priority, Request};
use crate::errors::OpsError;
use crate::storage::{
    BuildLock, BuildLockFile, BuildResult, Claim, ClaimRegistry, CurrentBuild, CurrentBuildStore,
    Heartbeat, HeartbeatSink, RequestQueue, ResultSink, StateLayout,
};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;

/// Inputs for enqueueing a rebuild request.
#[derive(Debug, Clone, Default)]
pub struct EnqueueArgs {
    pub id: Option<String>,
    pub request_type: String,
    /// Individually supplied project names.
    pub projects: Vec<String>,
    /// Additional comma-separated project list.
    pub projects_csv: Option<String>,
    pub reason: String,
    pub requested_by: String,
    pub priority: String,
    pub desired_build_commit: Option<String>,
    pub notes: Option<String>,
}

/// A claimed request as emitted by `claim_next --json`.
#[derive(Debug, Serialize)]
pub struct ClaimedRequest {
    pub id: String,
    pub request: Request,
    #[serde(skip)]
    pub claim: Claim,
}

/// Counts of records removed by one garbage-collection pass.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct GcSummary {
    pub locks: usize,
    pub claims: usize,
}

pub struct CommandExecutor {
    layout: StateLayout,
}

impl CommandExecutor {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Create the state directory tree.
    pub fn init(&self) -> Result<()> {
        self.layout.init()
    }

    /// Publish this agent's heartbeat, last writer wins.
    pub fn heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.layout.init()?;
        HeartbeatSink::new(&self.layout).write(heartbeat)
    }

    /// Enqueue a rebuild request and return its id.
    pub fn request_rebuild(&self, args: EnqueueArgs) -> Result<String> {
        self.layout.init()?;

        let mut projects: Vec<String> = args
            .projects
            .iter()
            .map(|project| project.trim().to_string())
            .filter(|project| !project.is_empty())
            .collect();
        if let Some(csv) = &args.projects_csv {
            projects.extend(
                csv.split(',')
                    .map(|project| project.trim().to_string())
                    .filter(|project| !project.is_empty()),
            );
        }
        if projects.is_empty() {
            return Err(
                OpsError::Input("request_rebuild requires at least one project".to_string())
                    .into(),
            );
        }

        let id = args
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(RequestQueue::mint_id);

        let mut request = Request::new(id.clone(), args.request_type, projects);
        request.reason = args.reason;
        request.requested_by = args.requested_by;
        request.priority = Some(Priority::Text(args.priority));
        request.desired_build_commit = args.desired_build_commit;
        request.notes = args.notes;

        RequestQueue::new(&self.layout).enqueue(&request)?;
        Ok(id)
    }

    /// Claim the best available request, or `None` when the queue is drained.
    pub fn claim_next(&self, agent: &str, lease_seconds: u64) -> Result<Option<ClaimedRequest>> {
        self.layout.init()?;
        let claimed = RequestQueue::new(&self.layout).claim_next(agent, lease_seconds)?;
        Ok(claimed.map(|(request, claim)| ClaimedRequest {
            id: request.id.clone(),
            request,
            claim,
        }))
    }

    /// Renew the claim on `id`, enforcing ownership unless forced.
    pub fn renew_claim(
        &self,
        id: &str,
        agent: &str,
        lease_seconds: u64,
        force: bool,
    ) -> Result<Claim> {
        self.layout.init()?;
        ClaimRegistry::new(&self.layout).renew(id, agent, lease_seconds, force)
    }

    /// Acquire or refresh the build lock.
    pub fn lock_build(
        &self,
        owner: &str,
        request_id: &str,
        lease_seconds: u64,
        force: bool,
    ) -> Result<BuildLock> {
        self.layout.init()?;
        BuildLockFile::new(&self.layout).acquire(owner, request_id, lease_seconds, force)
    }

    /// Release the build lock.
    pub fn unlock_build(&self, owner: &str, request_id: Option<&str>, force: bool) -> Result<()> {
        self.layout.init()?;
        BuildLockFile::new(&self.layout).release(owner, request_id, force)
    }

    /// The live build lock, if any.
    pub fn lock_status(&self) -> Result<Option<BuildLock>> {
        self.layout.init()?;
        Ok(BuildLockFile::new(&self.layout).status())
    }

    /// Sweep expired leases: always the lock, claims only when asked.
    pub fn gc_stale_leases(&self, prune_claims: bool) -> Result<GcSummary> {
        self.layout.init()?;
        let mut summary = GcSummary::default();
        if BuildLockFile::new(&self.layout).sweep_expired()? {
            summary.locks += 1;
        }
        if prune_claims {
            summary.claims = ClaimRegistry::new(&self.layout).prune_expired()?;
        }
        Ok(summary)
    }

    /// Record the outcome of a request.
    pub fn write_result(&self, result: &BuildResult) -> Result<()> {
        self.layout.init()?;
        ResultSink::new(&self.layout).write(result)
    }

    /// Publish the current-build pointer for a project.
    pub fn write_current(&self, pointer: &CurrentBuild) -> Result<()> {
        self.layout.init()?;
        CurrentBuildStore::new(&self.layout).write(pointer)
    }

    /// Read the current-build pointer for a project.
    pub fn current_build(&self, project: &str) -> Result<Option<Map<String, Value>>> {
        self.layout.init()?;
        Ok(CurrentBuildStore::new(&self.layout).read(project))
    }

    /// Move a finished request (and its claim, if any) into the archive.
    pub fn archive_request(&self, id: &str) -> Result<()> {
        self.layout.init()?;

        let source = self.layout.request_path(id);
        let target = self.layout.archive_requests_dir().join(format!("{id}.json"));
        match fs::rename(&source, &target) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(OpsError::Input(format!("request {id} not found")).into());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to archive {}", source.display()));
            }
        }

        ClaimRegistry::new(&self.layout).archive(id)?;
        Ok(())
    }
}
