//! The pending-request queue and priority-ordered claiming.
//!
//! Requests are plain files under `ops/requests/`; the queue is whatever a
//! directory scan finds. Service order is highest priority rank first, oldest
//! creation time within a rank, and filename as the final deterministic
//! tie-break. A request whose timestamp is missing or damaged falls back to
//! the file's modification time so it still sorts somewhere sensible, and a
//! record that does not parse at all is skipped rather than halting the scan.
//!
//! Claiming is check-then-write without a stronger primitive: two workers can
//! race past the claim check and both write the claim file, in which case the
//! last writer holds it and the loser observes the mismatch at its next
//! renewal. See `claims::ClaimRegistry::renew`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use super::{json, lease, Claim, ClaimRegistry, StateLayout};
use crate::domain::Request;

/// The request files under `ops/requests/` plus the claim registry used to
/// decide which of them are available.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    requests_dir: PathBuf,
    claims: ClaimRegistry,
}

/// One scanned request with its precomputed sort key.
struct Candidate {
    rank: i64,
    utc: DateTime<Utc>,
    file_name: String,
    request: Request,
}

impl RequestQueue {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            requests_dir: layout.requests_dir(),
            claims: ClaimRegistry::new(layout),
        }
    }

    /// Mint a request id.
    pub fn mint_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Persist a new request.
    pub fn enqueue(&self, request: &Request) -> Result<()> {
        let path = self.requests_dir.join(format!("{}.json", request.id));
        json::write_json_atomic(&path, request)
    }

    /// Load a request by id, if present and readable.
    pub fn load(&self, id: &str) -> Option<Request> {
        json::read_json(&self.requests_dir.join(format!("{id}.json")))
    }

    /// Claim the best available request for `agent`.
    ///
    /// Walks the queue in service order, skipping every request that carries
    /// an unexpired claim, and writes a fresh claim for the first one that
    /// does not. Returns the request and the claim, or `None` when nothing is
    /// available.
    pub fn claim_next(
        &self,
        agent: &str,
        lease_seconds: u64,
    ) -> Result<Option<(Request, Claim)>> {
        let mut candidates = self.scan()?;
        candidates.sort_by(|a, b| {
            (Reverse(a.rank), a.utc, &a.file_name).cmp(&(Reverse(b.rank), b.utc, &b.file_name))
        });

        for candidate in candidates {
            if let Some(existing) = self.claims.load(&candidate.request.id) {
                if !existing.is_expired() {
                    continue;
                }
            }
            let claim = Claim::new(&candidate.request.id, agent, lease_seconds);
            self.claims.write(&claim)?;
            return Ok(Some((candidate.request, claim)));
        }
        Ok(None)
    }

    fn scan(&self) -> Result<Vec<Candidate>> {
        let entries = fs::read_dir(&self.requests_dir)
            .with_context(|| format!("failed to list {}", self.requests_dir.display()))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Some(mut request) = json::read_json::<Request>(&path) else {
                continue;
            };
            // The file stem is authoritative for the id.
            request.id = stem.to_string();

            let utc = match lease::parse_utc(&request.utc) {
                Some(utc) => utc,
                None => entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| lease::utc_now()),
            };

            candidates.push(Candidate {
                rank: request.priority_rank(),
                utc,
                file_name: format!("{stem}.json"),
                request,
            });
        }
        Ok(candidates)
    }
}


#[cfg(test)]
#[path = "queue_proptests.rs"]
mod proptests;
