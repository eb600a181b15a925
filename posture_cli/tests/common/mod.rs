#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

/// Fast sim config: 5-sample calibration, 1 ms cycles, a buffer big enough
/// that no snapshot is dropped, and a compressed custom alert table.
pub const FAST: &str = r#"
[calibration]
samples = 5
interval_ms = 1

[runner]
period_ms = 1
telemetry_buffer = 8192

[fault]
stuck_cycles = 0

[alerts]
profile = "custom"
milestones = [[200, "gentle"], [400, "warning"], [600, "urgent"], [800, "critical"]]
"#;

pub fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, body).unwrap();
    path
}

/// Replay CSV: `neutral` rows upright, then `slouched` rows at `pitch_deg`.
pub fn write_replay(
    dir: &tempfile::TempDir,
    neutral: usize,
    slouched: usize,
    pitch_deg: f32,
) -> PathBuf {
    let (s, c) = pitch_deg.to_radians().sin_cos();
    let mut body = String::from("ax,ay,az,gx,gy,gz\n");
    for i in 0..neutral {
        body.push_str(&format!("0.0,0.0,1.0,0.{},0.0,0.0\n", i % 3));
    }
    for i in 0..slouched {
        body.push_str(&format!("{s:.4},0.0,{c:.4},0.{},0.0,0.0\n", i % 3));
    }
    let path = dir.path().join("session.csv");
    fs::write(&path, body).unwrap();
    path
}

pub fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("bad JSON line {l:?}: {e}")))
        .collect()
}

pub fn snapshots(lines: &[serde_json::Value]) -> Vec<&serde_json::Value> {
    lines.iter().filter(|v| v.get("cycle").is_some()).collect()
}

pub fn statuses(lines: &[serde_json::Value]) -> Vec<&str> {
    lines
        .iter()
        .filter_map(|v| v.get("status").and_then(|s| s.as_str()))
        .collect()
}
