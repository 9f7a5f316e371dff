//! Outbound hand-off of finished runs.
//!
//! The engine calls [`RunSink::persist`] once per successful stop. Durability and retry
//! belong to the sink.

use crate::error::{TrackResult, TrackerError};
use crate::metrics::RunSummary;
use crate::storage::RunExport;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait RunSink: Send + Sync {
    fn persist(&self, summary: RunSummary) -> TrackResult<()>;
}

/// Keeps finished runs in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    runs: Arc<Mutex<Vec<RunSummary>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> TrackResult<Vec<RunSummary>> {
        Ok(self
            .runs
            .lock()
            .map_err(|_| TrackerError::lock("memory sink"))?
            .clone())
    }

    /// Remove and return everything persisted so far
    pub fn drain(&self) -> TrackResult<Vec<RunSummary>> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| TrackerError::lock("memory sink"))?;
        Ok(std::mem::take(&mut *runs))
    }
}

impl RunSink for MemorySink {
    fn persist(&self, summary: RunSummary) -> TrackResult<()> {
        self.runs
            .lock()
            .map_err(|_| TrackerError::lock("memory sink"))?
            .push(summary);
        Ok(())
    }
}

/// Writes each run as `<session_id>.json` into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> TrackResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }
}

impl RunSink for JsonFileSink {
    fn persist(&self, summary: RunSummary) -> TrackResult<()> {
        let path = self.path_for(&summary.session_id);
        let bytes = RunExport::new(summary).to_json_bytes()?;
        fs::write(&path, bytes)?;
        log::info!("Run saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(id: &str) -> RunSummary {
        let now = Utc::now();
        RunSummary {
            session_id: id.to_string(),
            distance_m: 1200.0,
            duration_ms: 420_000,
            average_speed_kmh: 10.285714285714286,
            calories: 63,
            steps: 1538,
            route: Vec::new(),
            start_time: now,
            end_time: now,
            rejected_fixes: 4,
            out_of_order_fixes: 0,
        }
    }

    #[test]
    fn test_memory_sink_shares_storage() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.persist(summary("run_a")).unwrap();
        sink.persist(summary("run_b")).unwrap();

        assert_eq!(handle.runs().unwrap().len(), 2);
        let drained = handle.drain().unwrap();
        assert_eq!(drained[1].session_id, "run_b");
        assert!(sink.runs().unwrap().is_empty());
    }

    #[test]
    fn test_json_file_sink_writes_export() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("runs")).unwrap();
        sink.persist(summary("run_42")).unwrap();

        let json = fs::read_to_string(sink.path_for("run_42")).unwrap();
        let export = RunExport::from_json(&json).unwrap();
        assert_eq!(export.summary.session_id, "run_42");
        assert_eq!(export.display.distance, "1.20 km");
        assert_eq!(export.summary.rejected_fixes, 4);
    }
}
