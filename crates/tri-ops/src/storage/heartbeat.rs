//! Agent heartbeats.
//!
//! One record per agent under `ops/heartbeats/`, overwritten on every tick.
//! Heartbeats are fire-and-forget presence: no read-modify-write, and
//! concurrent writers for the same agent resolve as last-writer-wins.
//! Nothing in the coordinator ever deletes them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{json, lease, StateLayout};

/// One agent's presence and current activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent: String,
    pub host: String,
    pub pid: u32,
    pub cycle: i64,
    pub phase: String,
    #[serde(rename = "currentTask")]
    pub current_task: String,
    pub utc: String,
    pub version: String,
}

impl Heartbeat {
    /// Assemble a heartbeat for this process, detecting the host when the
    /// caller does not name one.
    pub fn collect(
        agent: String,
        phase: String,
        current_task: String,
        cycle: i64,
        version: String,
        host: Option<String>,
    ) -> Self {
        Self {
            agent,
            host: host.unwrap_or_else(detect_hostname),
            pid: std::process::id(),
            cycle,
            phase,
            current_task,
            utc: lease::utc_iso(lease::utc_now()),
            version,
        }
    }
}

fn detect_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// The heartbeat files under `ops/heartbeats/`.
#[derive(Debug, Clone)]
pub struct HeartbeatSink {
    dir: PathBuf,
}

impl HeartbeatSink {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            dir: layout.heartbeats_dir(),
        }
    }

    fn path(&self, agent: &str) -> PathBuf {
        self.dir.join(format!("{agent}.json"))
    }

    pub fn write(&self, heartbeat: &Heartbeat) -> Result<()> {
        json::write_json_atomic(&self.path(&heartbeat.agent), heartbeat)
    }

    pub fn read(&self, agent: &str) -> Option<Heartbeat> {
        json::read_json(&self.path(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, HeartbeatSink) {
        let temp = TempDir::new().unwrap();
        let layout = StateLayout::new(temp.path());
        layout.init().unwrap();
        let sink = HeartbeatSink::new(&layout);
        (temp, sink)
    }

    #[test]
    fn collect_fills_pid_and_host() {
        let beat = Heartbeat::collect(
            "builder".to_string(),
            "building".to_string(),
            String::new(),
            3,
            "1".to_string(),
            None,
        );
        assert_eq!(beat.pid, std::process::id());
        assert!(!beat.host.is_empty());
        assert!(beat.utc.ends_with('Z'));
    }

    #[test]
    fn explicit_host_is_kept() {
        let beat = Heartbeat::collect(
            "builder".to_string(),
            "idle".to_string(),
            String::new(),
            0,
            "1".to_string(),
            Some("rack-7".to_string()),
        );
        assert_eq!(beat.host, "rack-7");
    }

    #[test]
    fn latest_write_wins() {
        let (_temp, sink) = setup();
        let mut beat = Heartbeat::collect(
            "builder".to_string(),
            "claiming".to_string(),
            String::new(),
            1,
            "1".to_string(),
            Some("h".to_string()),
        );
        sink.write(&beat).unwrap();

        beat.cycle = 2;
        beat.phase = "building".to_string();
        sink.write(&beat).unwrap();

        let read = sink.read("builder").unwrap();
        assert_eq!(read.cycle, 2);
        assert_eq!(read.phase, "building");
    }

    #[test]
    fn current_task_uses_the_wire_key() {
        let beat = Heartbeat::collect(
            "builder".to_string(),
            "building".to_string(),
            "r-1".to_string(),
            0,
            "1".to_string(),
            Some("h".to_string()),
        );
        let raw = json::to_canonical_string(&beat).unwrap();
        assert!(raw.contains(r#""currentTask":"r-1""#));
    }
}
