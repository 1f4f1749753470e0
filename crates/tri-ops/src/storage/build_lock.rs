//! The exclusive build lock.
//!
//! One well-known record, `ops/locks/build.lock`, grants the builder role.
//! The lock is advisory: it excludes cooperating callers that acquire before
//! building and release after, and nothing more. Expiry doubles as crash
//! recovery, so a holder must renew on its own cadence or lose the lock.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{json, lease, StateLayout};
use crate::errors::OpsError;

/// The singleton lock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLock {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub utc: String,
    #[serde(default)]
    pub lease_seconds: u64,
    #[serde(default)]
    pub lease_expires_utc: String,
}

impl BuildLock {
    pub fn new(owner: &str, request_id: &str, lease_seconds: u64) -> Self {
        Self {
            owner: owner.to_string(),
            request_id: request_id.to_string(),
            utc: lease::utc_iso(lease::utc_now()),
            lease_seconds,
            lease_expires_utc: lease::utc_iso(lease::lease_expiry(lease_seconds)),
        }
    }

    pub fn is_expired(&self) -> bool {
        lease::is_expired(Some(&self.lease_expires_utc))
    }

    fn is_held_by(&self, owner: &str, request_id: &str) -> bool {
        self.owner == owner && self.request_id == request_id
    }
}

/// Manager for the lock file.
#[derive(Debug, Clone)]
pub struct BuildLockFile {
    path: PathBuf,
}

impl BuildLockFile {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            path: layout.lock_path(),
        }
    }

    /// Load the lock record; damaged records read as absent.
    pub fn read(&self) -> Option<BuildLock> {
        json::read_json(&self.path)
    }

    /// Take, refresh, or steal the lock.
    ///
    /// A free or expired lock is taken. A live lock held by the same
    /// `(owner, request_id)` is refreshed with a new lease, so acquisition
    /// and renewal are the same operation. Anyone else is rejected unless
    /// `force`.
    pub fn acquire(
        &self,
        owner: &str,
        request_id: &str,
        lease_seconds: u64,
        force: bool,
    ) -> Result<BuildLock> {
        if let Some(existing) = self.read() {
            if !existing.is_expired() && !existing.is_held_by(owner, request_id) && !force {
                return Err(OpsError::LockHeld {
                    owner: existing.owner,
                    request_id: existing.request_id,
                }
                .into());
            }
        }
        let lock = BuildLock::new(owner, request_id, lease_seconds);
        json::write_json_atomic(&self.path, &lock)?;
        Ok(lock)
    }

    /// Release the lock.
    ///
    /// Absent lock is a successful no-op. Unless `force`, the caller must be
    /// the recorded owner, and a supplied `request_id` must match the one the
    /// lock was taken for. A concurrent deletion is tolerated.
    pub fn release(&self, owner: &str, request_id: Option<&str>, force: bool) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        if let Some(existing) = self.read() {
            if !force {
                if existing.owner != owner {
                    return Err(OpsError::LockOwnerMismatch {
                        owner: existing.owner,
                    }
                    .into());
                }
                if let Some(request_id) = request_id {
                    if existing.request_id != request_id {
                        return Err(OpsError::LockRequestMismatch {
                            request_id: existing.request_id,
                        }
                        .into());
                    }
                }
            }
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }

    /// The live lock, if any. An expired record reads as absent but is left
    /// on disk for the garbage collector.
    pub fn status(&self) -> Option<BuildLock> {
        self.read().filter(|lock| !lock.is_expired())
    }

    /// Delete the lock file if its lease has expired; true if removed.
    pub fn sweep_expired(&self) -> Result<bool> {
        match self.read() {
            Some(lock) if lock.is_expired() => match fs::remove_file(&self.path) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
                Err(err) => {
                    Err(err).with_context(|| format!("failed to remove {}", self.path.display()))
                }
            },
            _ => Ok(false),
        }
    }
}
