//! Append-only CSV log of per-cycle snapshots.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::{Result, WrapErr};
use posture_core::Snapshot;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    timestamp: u64,
    unix_ms: u64,
    pitch: Option<f32>,
    roll: Option<f32>,
    cumulative_slouch_s: u64,
    is_moving: bool,
    alert_level: u8,
    alert_level_name: &'a str,
    alert_active: bool,
    fault: Option<&'static str>,
}

impl<'a> From<&'a Snapshot> for CsvRow<'a> {
    fn from(s: &'a Snapshot) -> Self {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Self {
            timestamp: s.timestamp,
            unix_ms,
            pitch: s.pitch,
            roll: s.roll,
            cumulative_slouch_s: s.cumulative_slouch_s,
            is_moving: s.is_moving,
            alert_level: s.alert_level,
            alert_level_name: s.alert_level_name,
            alert_active: s.alert_active,
            fault: s.fault.map(|f| f.name()),
        }
    }
}

pub struct CsvLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvLog {
    /// Opens `path` for appending. The header row is written only when the
    /// file is new or empty.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("open CSV log {}", path.display()))?;
        let fresh = file
            .metadata()
            .wrap_err_with(|| format!("stat CSV log {}", path.display()))?
            .len()
            == 0;
        tracing::info!(path = %path.display(), fresh, "logging snapshots to CSV");
        let writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One row per snapshot, flushed so a killed process keeps its log.
    pub fn append(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.writer
            .serialize(CsvRow::from(snapshot))
            .wrap_err("write CSV row")?;
        self.writer.flush().wrap_err("flush CSV log")?;
        Ok(())
    }
}
