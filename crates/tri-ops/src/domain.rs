//! Rebuild request records and priority ranking.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::lease;

/// A unit of rebuild work awaiting a worker.
///
/// Stored as `ops/requests/<id>.json`; the `id` field always matches the file
/// stem. A claimed request stays on disk untouched (the claim record is the
/// mutation) until it is explicitly archived after completion.
///
/// Every field defaults on read so that a record written by an older or
/// sloppier producer still enters the queue; unknown keys land in `extra` and
/// are echoed back verbatim when the request is handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_request_type")]
    pub request_type: String,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_build_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_request_type() -> String {
    "rebuild".to_string()
}

impl Request {
    /// Build a new request stamped with the current time.
    pub fn new(id: String, request_type: String, projects: Vec<String>) -> Self {
        Self {
            id,
            request_type,
            projects,
            reason: String::new(),
            requested_by: String::new(),
            priority: None,
            utc: lease::utc_iso(lease::utc_now()),
            desired_build_commit: None,
            notes: None,
            extra: Map::new(),
        }
    }

    /// Numeric service rank; absent priority ranks 0.
    pub fn priority_rank(&self) -> i64 {
        self.priority.as_ref().map_or(0, Priority::rank)
    }
}

/// Request priority as found on the wire: a bare number, a numeric string, or
/// a named tier.
///
/// The dynamic typing is part of the external contract, so the value is kept
/// as written and only resolved to a rank when the queue orders candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Priority {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Integer(0)
    }
}

impl Priority {
    /// Resolve to a numeric rank. Higher ranks are served earlier.
    ///
    /// Decimal-digit strings parse as integers; named tiers resolve through a
    /// fixed table; anything unrecognised ranks 0.
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Integer(n) => *n,
            Priority::Float(f) => *f as i64,
            Priority::Text(text) => {
                let text = text.trim().to_ascii_lowercase();
                if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                    return text.parse().unwrap_or(0);
                }
                match text.as_str() {
                    "tier0" => 100,
                    "tier1" => 80,
                    "tier2" => 60,
                    "high" => 50,
                    "normal" | "medium" => 10,
                    "task" => 5,
                    "low" => 0,
                    _ => 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::json::to_canonical_string;

    #[test]
    fn named_tiers_resolve_through_the_table() {
        let expected = [
            ("tier0", 100),
            ("tier1", 80),
            ("tier2", 60),
            ("high", 50),
            ("normal", 10),
            ("medium", 10),
            ("task", 5),
            ("low", 0),
        ];
        for (name, rank) in expected {
            assert_eq!(Priority::Text(name.to_string()).rank(), rank, "{name}");
        }
    }

    #[test]
    fn tier_names_are_case_and_whitespace_insensitive() {
        assert_eq!(Priority::Text(" Tier1 ".to_string()).rank(), 80);
        assert_eq!(Priority::Text("HIGH".to_string()).rank(), 50);
    }

    #[test]
    fn numeric_strings_parse_as_integers() {
        assert_eq!(Priority::Text("42".to_string()).rank(), 42);
        assert_eq!(Priority::Text("007".to_string()).rank(), 7);
    }

    #[test]
    fn unknown_text_ranks_zero() {
        assert_eq!(Priority::Text("urgentish".to_string()).rank(), 0);
        assert_eq!(Priority::Text("-5".to_string()).rank(), 0);
        assert_eq!(Priority::Text(String::new()).rank(), 0);
    }

    #[test]
    fn bare_numbers_rank_as_themselves() {
        assert_eq!(Priority::Integer(65).rank(), 65);
        assert_eq!(Priority::Integer(-3).rank(), -3);
        assert_eq!(Priority::Float(9.8).rank(), 9);
    }

    #[test]
    fn priority_deserializes_from_number_or_string() {
        let number: Priority = serde_json::from_str("60").unwrap();
        assert_eq!(number.rank(), 60);

        let text: Priority = serde_json::from_str("\"tier2\"").unwrap();
        assert_eq!(text.rank(), 60);
    }

    #[test]
    fn request_serializes_keys_in_contract_order() {
        let mut request = Request::new(
            "r-1".to_string(),
            "rebuild".to_string(),
            vec!["alpha".to_string()],
        );
        request.reason = "nightly".to_string();
        request.requested_by = "ci".to_string();
        request.priority = Some(Priority::Text("high".to_string()));
        request.utc = "2026-01-02T03:04:05Z".to_string();

        assert_eq!(
            to_canonical_string(&request).unwrap(),
            r#"{"id":"r-1","type":"rebuild","projects":["alpha"],"reason":"nightly","requested_by":"ci","priority":"high","utc":"2026-01-02T03:04:05Z"}"#
        );
    }

    #[test]
    fn request_tolerates_missing_fields_and_null_priority() {
        let request: Request =
            serde_json::from_str(r#"{"projects":["a"],"priority":null}"#).unwrap();
        assert_eq!(request.request_type, "rebuild");
        assert_eq!(request.priority_rank(), 0);
        assert!(request.reason.is_empty());
    }

    #[test]
    fn request_preserves_unknown_keys() {
        let raw = r#"{"id":"r-2","projects":["a"],"build_profile":"release"}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(
            request.extra.get("build_profile"),
            Some(&Value::String("release".to_string()))
        );

        let emitted = to_canonical_string(&request).unwrap();
        assert!(emitted.contains(r#""build_profile":"release""#));
    }
}
