//! Filesystem-backed rebuild coordination.
//!
//! This library implements the coordination protocol behind the `tri-ops`
//! binary: a small fleet of independent agents negotiating rebuild work
//! through JSON records in a shared state directory, with no broker, daemon,
//! or database. Correctness rests on three disciplines enforced here:
//!
//! - every mutation is an atomic same-directory temp-file-and-rename;
//! - every timestamp is UTC truncated to whole seconds, and a lease whose
//!   expiry is missing or damaged counts as expired;
//! - readers treat unparseable records as absent, so one corrupt file never
//!   halts the fleet.

pub mod cli;
pub mod commands;
pub mod domain;
pub mod errors;
pub mod output;
pub mod storage;

// Re-export commonly used types
pub use commands::{ClaimedRequest, CommandExecutor, EnqueueArgs, GcSummary};
pub use domain::{Priority, Request};
pub use errors::OpsError;
pub use output::ExitCode;
pub use storage::{
    BuildLock, BuildResult, Claim, CurrentBuild, Heartbeat, StateLayout,
};
