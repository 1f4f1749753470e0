//! Exit codes and machine-readable stdout helpers.
//!
//! Output discipline is machine-first: ids and record dumps go to stdout in
//! the same canonical compact JSON used on disk, diagnostics go to stderr,
//! and the exit code carries the verdict.

use anyhow::Result;
use serde::Serialize;

use crate::storage::json;

/// Process exit codes shared by every subcommand.
///
/// 0 success; 1 negative query result (a free lock) or an unclassified
/// failure; 2 input error or nothing-to-return; 3 ownership/lease conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Negative = 1,
    InputError = 2,
    Conflict = 3,
}

impl ExitCode {
    /// Numeric value passed to `std::process::exit`.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Print a record to stdout as one line of compact canonical JSON.
pub fn print_compact<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", json::to_canonical_string(value)?);
    Ok(())
}
