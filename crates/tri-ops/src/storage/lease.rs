//! UTC clock and lease expiry arithmetic.
//!
//! Every timestamp in the state directory is wall-clock UTC truncated to whole
//! seconds and formatted with a trailing `Z`. Leases are compared on the wall
//! clock only: coordination happens between processes on different hosts, so a
//! per-process monotonic clock has nothing to anchor to. Hosts are assumed to
//! be within loose seconds of true UTC.
//!
//! A timestamp that is absent, naive, or unparseable is treated as already
//! expired; records with damaged leases become reclaimable rather than wedged.

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current UTC time truncated to whole seconds.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn utc_iso(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse an offset-aware RFC 3339 timestamp into UTC.
///
/// Naive timestamps (no offset, no `Z`) are rejected: a bare local time from
/// another host is meaningless here.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Expiry instant for a lease of `lease_seconds` starting now.
pub fn lease_expiry(lease_seconds: u64) -> DateTime<Utc> {
    utc_now() + Duration::seconds(lease_seconds as i64)
}

/// Whether a lease expiry has passed.
///
/// True when the value is absent, unparseable, or strictly before now.
pub fn is_expired(expires_utc: Option<&str>) -> bool {
    match expires_utc.and_then(parse_utc) {
        Some(expires) => expires < utc_now(),
        None => true,
    }
}
