//! Command-line interface definitions using clap.
//!
//! Subcommand names keep their historical snake_case spelling because fleet
//! automation scripts call them by name.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tri-ops")]
#[command(about = "Filesystem-backed rebuild coordination for build agents", long_about = None)]
pub struct Cli {
    /// State directory root (overrides TRI_STATE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the state directory layout
    Init,

    /// Publish this agent's presence and current phase
    Heartbeat {
        #[arg(long)]
        agent: String,

        #[arg(long)]
        phase: String,

        #[arg(long, default_value = "")]
        current_task: String,

        #[arg(long, default_value_t = 0)]
        cycle: i64,

        #[arg(long, default_value = "1")]
        version: String,

        /// Defaults to the detected hostname
        #[arg(long)]
        host: Option<String>,
    },

    /// Enqueue a rebuild request and print its id
    #[command(name = "request_rebuild")]
    RequestRebuild {
        /// Request id (UUIDv4 if omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long = "type", default_value = "rebuild")]
        request_type: String,

        /// Project to rebuild (repeatable)
        #[arg(long = "project")]
        project: Vec<String>,

        /// Comma-separated projects, appended to --project
        #[arg(long)]
        projects: Option<String>,

        #[arg(long, default_value = "")]
        reason: String,

        #[arg(long)]
        requested_by: String,

        /// Integer, numeric string, or tier name (tier0, tier1, tier2,
        /// high, normal, medium, task, low)
        #[arg(long, default_value = "normal")]
        priority: String,

        #[arg(long)]
        desired_build_commit: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Claim the highest-priority available request
    #[command(name = "claim_next")]
    ClaimNext {
        #[arg(long)]
        agent: String,

        #[arg(long, default_value_t = 900)]
        lease_seconds: u64,

        /// Emit {"id":…,"request":…} instead of the bare id
        #[arg(long)]
        json: bool,
    },

    /// Extend the lease on a claimed request
    #[command(name = "renew_claim")]
    RenewClaim {
        #[arg(long)]
        id: String,

        #[arg(long)]
        agent: String,

        #[arg(long, default_value_t = 900)]
        lease_seconds: u64,

        /// Skip the ownership check (administrative reassignment)
        #[arg(long)]
        force: bool,
    },

    /// Acquire the exclusive build lock
    #[command(name = "lock_build")]
    LockBuild {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        request_id: String,

        #[arg(long, default_value_t = 900)]
        lease_seconds: u64,

        /// Steal a live lock held by someone else
        #[arg(long)]
        force: bool,
    },

    /// Refresh the build lock lease (same semantics as lock_build)
    #[command(name = "renew_lock")]
    RenewLock {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        request_id: String,

        #[arg(long, default_value_t = 900)]
        lease_seconds: u64,

        #[arg(long)]
        force: bool,
    },

    /// Release the build lock
    #[command(name = "unlock_build")]
    UnlockBuild {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        request_id: Option<String>,

        #[arg(long)]
        force: bool,
    },

    /// Report whether an unexpired build lock exists
    #[command(name = "lock_status")]
    LockStatus {
        /// Dump the lock record as compact JSON
        #[arg(long)]
        json: bool,
    },

    /// Sweep expired leases
    #[command(name = "gc_stale_leases")]
    GcStaleLeases {
        /// Also delete claim files whose lease has expired
        #[arg(long)]
        prune_claims: bool,

        /// Print {"locks":N,"claims":M}
        #[arg(long)]
        json: bool,
    },

    /// Record the outcome of a request
    #[command(name = "write_result")]
    WriteResult {
        #[arg(long)]
        id: String,

        #[arg(long)]
        status: String,

        #[arg(long)]
        published_build_path: String,

        #[arg(long)]
        build_commit: String,

        /// Log pointer (repeatable)
        #[arg(long = "log")]
        log: Vec<String>,

        #[arg(long)]
        error: Option<String>,
    },

    /// Print the current-build pointer for a project
    #[command(name = "current_build")]
    CurrentBuild {
        #[arg(long)]
        project: String,

        /// Print a single field instead of the whole record
        #[arg(long)]
        field: Option<String>,
    },

    /// Publish the current-build pointer for a project
    #[command(name = "write_current")]
    WriteCurrent {
        #[arg(long)]
        project: String,

        #[arg(long)]
        path: String,

        #[arg(long)]
        executable: String,

        #[arg(long)]
        build_commit: String,

        #[arg(long)]
        build_id: String,

        #[arg(long)]
        request_id: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Move a finished request and its claim into the archive
    #[command(name = "archive_request")]
    ArchiveRequest {
        #[arg(long)]
        id: String,
    },
}
