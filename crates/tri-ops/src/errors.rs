//! Typed coordination errors.
//!
//! The binary downcasts to [`OpsError`] to choose an exit code: missing or
//! unusable input exits 2, an ownership or lease conflict exits 3, and
//! everything else (filesystem failures, serialization bugs) falls through to
//! the generic exit 1. Each variant renders as the one-line stderr diagnostic
//! callers script against.

use thiserror::Error;

use crate::output::ExitCode;

#[derive(Debug, Error)]
pub enum OpsError {
    /// Missing or unusable caller input.
    #[error("{0}")]
    Input(String),

    /// A renewal attempted against a claim held by another agent.
    #[error("claim owner mismatch: {id} is held by {claimed_by}")]
    ClaimOwnerMismatch { id: String, claimed_by: String },

    /// The build lock is live and belongs to someone else.
    #[error("build lock is held by another owner ({owner}, request {request_id})")]
    LockHeld { owner: String, request_id: String },

    /// An unlock attempted by a non-owner.
    #[error("build lock owner mismatch: held by {owner}")]
    LockOwnerMismatch { owner: String },

    /// An unlock named a request id the lock was not taken for.
    #[error("build lock request mismatch: held for {request_id}")]
    LockRequestMismatch { request_id: String },
}

impl OpsError {
    /// Exit code this error maps to at the process boundary.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            OpsError::Input(_) => ExitCode::InputError,
            OpsError::ClaimOwnerMismatch { .. }
            | OpsError::LockHeld { .. }
            | OpsError::LockOwnerMismatch { .. }
            | OpsError::LockRequestMismatch { .. } => ExitCode::Conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_exit_two() {
        let err = OpsError::Input("state dir missing".to_string());
        assert_eq!(err.exit_code(), ExitCode::InputError);
        assert_eq!(err.to_string(), "state dir missing");
    }

    #[test]
    fn conflicts_exit_three() {
        let err = OpsError::ClaimOwnerMismatch {
            id: "r-1".to_string(),
            claimed_by: "w2".to_string(),
        };
        assert_eq!(err.exit_code(), ExitCode::Conflict);
        assert!(err.to_string().contains("claim owner mismatch"));

        let err = OpsError::LockHeld {
            owner: "a".to_string(),
            request_id: "r-1".to_string(),
        };
        assert_eq!(err.exit_code(), ExitCode::Conflict);
    }
}
