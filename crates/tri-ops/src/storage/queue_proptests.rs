//! Property-based tests for queue ordering and claim invariants.
//!
//! These drive the queue with randomly generated request sets and operation
//! sequences to check the ordering contract and the at-most-one-live-claim
//! invariant in shapes example-based tests would not reach.

use super::*;
use crate::domain::Priority;
use chrono::{Duration, TimeZone};
use proptest::prelude::*;
use tempfile::TempDir;

fn setup() -> (TempDir, StateLayout, RequestQueue) {
    let temp = TempDir::new().unwrap();
    let layout = StateLayout::new(temp.path());
    layout.init().unwrap();
    let queue = RequestQueue::new(&layout);
    (temp, layout, queue)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

// Priorities in every accepted spelling: named tiers, numeric strings, and
// strings that rank 0.
fn priority_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("tier0".to_string()),
        Just("tier1".to_string()),
        Just("tier2".to_string()),
        Just("high".to_string()),
        Just("normal".to_string()),
        Just("medium".to_string()),
        Just("task".to_string()),
        Just("low".to_string()),
        Just("no-such-tier".to_string()),
        (0i64..200).prop_map(|n| n.to_string()),
    ]
}

// (priority, seconds offset) pairs; ids are assigned by index so filenames
// are unique and deterministic.
fn request_set_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((priority_strategy(), 0i64..120), 1..12)
}

fn enqueue_set(queue: &RequestQueue, set: &[(String, i64)]) {
    for (index, (priority, offset)) in set.iter().enumerate() {
        let mut request = Request::new(
            format!("req-{index:02}"),
            "rebuild".to_string(),
            vec!["alpha".to_string()],
        );
        request.priority = Some(Priority::Text(priority.clone()));
        request.utc = lease::utc_iso(base_time() + Duration::seconds(*offset));
        queue.enqueue(&request).unwrap();
    }
}

proptest! {
    // Draining the queue yields exactly the order of the documented composite
    // key: priority rank descending, then timestamp ascending, then filename.
    #[test]
    fn drain_follows_the_composite_key(set in request_set_strategy()) {
        let (_temp, _layout, queue) = setup();
        enqueue_set(&queue, &set);

        let mut expected: Vec<(i64, i64, String)> = set
            .iter()
            .enumerate()
            .map(|(index, (priority, offset))| {
                (
                    Priority::Text(priority.clone()).rank(),
                    *offset,
                    format!("req-{index:02}"),
                )
            })
            .collect();
        expected.sort_by(|a, b| {
            (std::cmp::Reverse(a.0), a.1, &a.2).cmp(&(std::cmp::Reverse(b.0), b.1, &b.2))
        });

        let mut drained = Vec::new();
        while let Some((request, _)) = queue.claim_next("w", 900).unwrap() {
            drained.push(request.id);
        }

        let expected_ids: Vec<String> = expected.into_iter().map(|(_, _, id)| id).collect();
        prop_assert_eq!(drained, expected_ids);
    }

    // A request with a strictly higher rank is always served before any lower
    // ranked request, whatever the timestamps say.
    #[test]
    fn higher_rank_always_wins(
        low_offset in 0i64..120,
        high_offset in 0i64..120,
    ) {
        let (_temp, _layout, queue) = setup();

        let mut low = Request::new("low".to_string(), "rebuild".to_string(), vec!["a".to_string()]);
        low.priority = Some(Priority::Text("normal".to_string()));
        low.utc = lease::utc_iso(base_time() + Duration::seconds(low_offset));
        queue.enqueue(&low).unwrap();

        let mut high = Request::new("high".to_string(), "rebuild".to_string(), vec!["a".to_string()]);
        high.priority = Some(Priority::Text("tier1".to_string()));
        high.utc = lease::utc_iso(base_time() + Duration::seconds(high_offset));
        queue.enqueue(&high).unwrap();

        let (first, _) = queue.claim_next("w", 900).unwrap().unwrap();
        prop_assert_eq!(first.id, "high");
    }

    // However many claim attempts race over a request set, every request ends
    // up with at most one live claim, and a drained queue stays drained until
    // a lease expires.
    #[test]
    fn claims_never_double_book(
        set in request_set_strategy(),
        agents in prop::collection::vec("[a-z]{4}", 1..20),
        expire_mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        let (_temp, layout, queue) = setup();
        enqueue_set(&queue, &set);
        let registry = ClaimRegistry::new(&layout);

        let mut granted = Vec::new();
        for agent in &agents {
            if let Some((request, claim)) = queue.claim_next(agent, 900).unwrap() {
                prop_assert_eq!(&claim.claimed_by, agent);
                granted.push(request.id);
            }
        }

        // No id granted twice while its lease is live.
        let mut deduped = granted.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(granted.len(), deduped.len());

        if granted.len() == set.len() {
            prop_assert!(queue.claim_next("latecomer", 900).unwrap().is_none());
        }

        // Force-expire a subset; exactly that subset becomes claimable again.
        let mut expired = Vec::new();
        for (index, id) in granted.iter().enumerate() {
            if expire_mask.get(index).copied().unwrap_or(false) {
                let mut claim = registry.load(id).unwrap();
                claim.lease_expires_utc = "2020-01-01T00:00:00Z".to_string();
                registry.write(&claim).unwrap();
                expired.push(id.clone());
            }
        }

        let mut reclaimed = Vec::new();
        while let Some((request, _)) = queue.claim_next("reclaimer", 900).unwrap() {
            reclaimed.push(request.id);
        }
        reclaimed.sort();
        expired.sort();
        prop_assert_eq!(reclaimed, expired);
    }

    // Whatever goes in comes back out: the stored record parses to the same
    // request, and its on-disk form is canonical ASCII.
    #[test]
    fn enqueue_round_trips(
        reason in ".{0,40}",
        notes in proptest::option::of(".{0,40}"),
        priority in priority_strategy(),
    ) {
        let (_temp, layout, queue) = setup();

        let mut request = Request::new(
            "round-trip".to_string(),
            "rebuild".to_string(),
            vec!["alpha".to_string(), "beta".to_string()],
        );
        request.reason = reason;
        request.requested_by = "ci".to_string();
        request.priority = Some(Priority::Text(priority));
        request.notes = notes;
        queue.enqueue(&request).unwrap();

        let raw = std::fs::read_to_string(layout.request_path("round-trip")).unwrap();
        prop_assert!(raw.is_ascii());
        prop_assert!(raw.ends_with('\n'));

        let loaded = queue.load("round-trip").unwrap();
        prop_assert_eq!(loaded.reason, request.reason);
        prop_assert_eq!(loaded.notes, request.notes);
        prop_assert_eq!(loaded.priority, request.priority);
        prop_assert_eq!(loaded.projects, request.projects);
    }
}
