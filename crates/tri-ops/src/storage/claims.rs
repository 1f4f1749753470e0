//! Per-request claim records.
//!
//! A claim is a worker's exclusive, time-limited promise to handle one
//! request. There is at most one claim file per request id; renewal simply
//! rewrites it with a fresh lease. Two workers racing for a free request can
//! both write the file, in which case the last writer holds the claim and the
//! loser finds out at its next renewal. That check, not the acquisition walk,
//! is what enforces at-most-one-holder.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{json, lease, StateLayout};
use crate::errors::OpsError;

/// A time-bounded assertion of exclusive right to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub claimed_by: String,
    #[serde(default)]
    pub utc: String,
    #[serde(default)]
    pub lease_seconds: u64,
    #[serde(default)]
    pub lease_expires_utc: String,
}

impl Claim {
    /// A fresh claim for `id` held by `agent`, starting now.
    pub fn new(id: &str, agent: &str, lease_seconds: u64) -> Self {
        Self {
            id: id.to_string(),
            claimed_by: agent.to_string(),
            utc: lease::utc_iso(lease::utc_now()),
            lease_seconds,
            lease_expires_utc: lease::utc_iso(lease::lease_expiry(lease_seconds)),
        }
    }

    pub fn is_expired(&self) -> bool {
        lease::is_expired(Some(&self.lease_expires_utc))
    }
}

/// The claim files under `ops/claims/`.
#[derive(Debug, Clone)]
pub struct ClaimRegistry {
    dir: PathBuf,
    archive_dir: PathBuf,
}

impl ClaimRegistry {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            dir: layout.claims_dir(),
            archive_dir: layout.archive_claims_dir(),
        }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Load the claim for a request; damaged records read as absent.
    pub fn load(&self, id: &str) -> Option<Claim> {
        json::read_json(&self.path(id))
    }

    pub fn write(&self, claim: &Claim) -> Result<()> {
        json::write_json_atomic(&self.path(&claim.id), claim)
    }

    /// Renew (or administratively reassign) the claim on `id`.
    ///
    /// Without `force`, an existing claim must already belong to `agent`;
    /// a mismatch is the moment a worker that lost the acquisition race
    /// learns about it. The record is then rewritten unconditionally with a
    /// fresh lease.
    pub fn renew(&self, id: &str, agent: &str, lease_seconds: u64, force: bool) -> Result<Claim> {
        if !force {
            if let Some(existing) = self.load(id) {
                if existing.claimed_by != agent {
                    return Err(OpsError::ClaimOwnerMismatch {
                        id: id.to_string(),
                        claimed_by: existing.claimed_by,
                    }
                    .into());
                }
            }
        }
        let claim = Claim::new(id, agent, lease_seconds);
        self.write(&claim)?;
        Ok(claim)
    }

    /// Delete every claim whose lease has expired; returns the number removed.
    ///
    /// Unreadable claim files are left alone, and a file that vanishes under
    /// us (another janitor, a re-claiming worker) is not counted.
    pub fn prune_expired(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?;

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let claim: Option<Claim> = json::read_json(&path);
            if claim.is_some_and(|claim| claim.is_expired()) {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("failed to remove {}", path.display()));
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Move the claim for `id` into the claim archive, if one exists.
    pub fn archive(&self, id: &str) -> Result<bool> {
        let source = self.path(id);
        let target = self.archive_dir.join(format!("{id}.json"));
        match fs::rename(&source, &target) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("failed to archive {}", source.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ClaimRegistry) {
        let temp = TempDir::new().unwrap();
        let layout = StateLayout::new(temp.path());
        layout.init().unwrap();
        let registry = ClaimRegistry::new(&layout);
        (temp, registry)
    }

    #[test]
    fn fresh_claim_is_live() {
        let claim = Claim::new("r-1", "w1", 900);
        assert!(!claim.is_expired());
        assert_eq!(claim.lease_seconds, 900);
    }

    #[test]
    fn write_then_load_round_trips() {
        let (_temp, registry) = setup();
        let claim = Claim::new("r-1", "w1", 900);
        registry.write(&claim).unwrap();
        assert_eq!(registry.load("r-1"), Some(claim));
    }

    #[test]
    fn renew_by_holder_extends_the_lease() {
        let (_temp, registry) = setup();
        let mut stale = Claim::new("r-1", "w1", 900);
        stale.lease_expires_utc = "2020-01-01T00:00:00Z".to_string();
        registry.write(&stale).unwrap();

        let renewed = registry.renew("r-1", "w1", 900, false).unwrap();
        assert!(!renewed.is_expired());
        assert_eq!(registry.load("r-1"), Some(renewed));
    }

    #[test]
    fn renew_by_other_agent_is_a_conflict() {
        let (_temp, registry) = setup();
        registry.write(&Claim::new("r-1", "w1", 900)).unwrap();

        let err = registry.renew("r-1", "w2", 900, false).unwrap_err();
        let ops = err.downcast_ref::<OpsError>().unwrap();
        assert!(matches!(ops, OpsError::ClaimOwnerMismatch { .. }));
        // The original holder is untouched.
        assert_eq!(registry.load("r-1").unwrap().claimed_by, "w1");
    }

    #[test]
    fn forced_renew_reassigns_the_claim() {
        let (_temp, registry) = setup();
        registry.write(&Claim::new("r-1", "w1", 900)).unwrap();

        let claim = registry.renew("r-1", "w2", 900, true).unwrap();
        assert_eq!(claim.claimed_by, "w2");
        assert_eq!(registry.load("r-1").unwrap().claimed_by, "w2");
    }

    #[test]
    fn renew_without_existing_claim_creates_one() {
        let (_temp, registry) = setup();
        let claim = registry.renew("r-9", "w1", 60, false).unwrap();
        assert_eq!(registry.load("r-9"), Some(claim));
    }

    #[test]
    fn prune_removes_only_expired_claims() {
        let (_temp, registry) = setup();
        let mut expired = Claim::new("old", "w1", 900);
        expired.lease_expires_utc = "2020-01-01T00:00:00Z".to_string();
        registry.write(&expired).unwrap();
        registry.write(&Claim::new("fresh", "w2", 900)).unwrap();

        assert_eq!(registry.prune_expired().unwrap(), 1);
        assert!(registry.load("old").is_none());
        assert!(registry.load("fresh").is_some());
    }

    #[test]
    fn prune_skips_unreadable_claims() {
        let (_temp, registry) = setup();
        fs::write(registry.path("junk"), "not json").unwrap();

        assert_eq!(registry.prune_expired().unwrap(), 0);
        assert!(registry.path("junk").exists());
    }

    #[test]
    fn archive_moves_the_claim_file() {
        let (_temp, registry) = setup();
        registry.write(&Claim::new("r-1", "w1", 900)).unwrap();

        assert!(registry.archive("r-1").unwrap());
        assert!(registry.load("r-1").is_none());
        assert!(registry.archive_dir.join("r-1.json").exists());

        // Archiving again is a no-op.
        assert!(!registry.archive("r-1").unwrap());
    }
}
