//! Persistent detection log: a bounded JSON array of the newest detections.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub camera_idx: u32,
}

impl DetectionRecord {
    pub fn new(
        at: DateTime<Local>,
        class_name: impl Into<String>,
        confidence: f32,
        camera_idx: u32,
    ) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            class_name: class_name.into(),
            confidence: round4(confidence as f64),
            camera_idx,
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Bounded, file-backed detection log. Keeps the newest `capacity` records
/// in memory and rewrites the file after every append.
#[derive(Debug)]
pub struct DetectionLog {
    path: PathBuf,
    capacity: usize,
    records: Mutex<VecDeque<DetectionRecord>>,
}

impl DetectionLog {
    /// Open the log at `path`. A missing, unreadable or corrupt file starts
    /// an empty log; the file is rewritten on the next append.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let capacity = capacity.max(1);
        let mut records = read_records(&path);
        while records.len() > capacity {
            records.pop_front();
        }
        tracing::debug!(path = %path.display(), entries = records.len(), "detection log opened");
        Self {
            path,
            capacity,
            records: Mutex::new(records),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append records, trim to capacity and persist. Returns the number
    /// appended. On a write error the in-memory log is still updated.
    pub fn append(&self, new: &[DetectionRecord]) -> Result<usize> {
        if new.is_empty() {
            return Ok(0);
        }
        let snapshot: Vec<DetectionRecord> = {
            let mut records = self.lock();
            records.extend(new.iter().cloned());
            while records.len() > self.capacity {
                records.pop_front();
            }
            records.iter().cloned().collect()
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        crate::io::atomic_write(&self.path, &data)?;
        Ok(new.len())
    }

    /// The newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<DetectionRecord> {
        let records = self.lock();
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DetectionRecord>> {
        // Poison is ignored: records are only ever appended and trimmed.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_records(path: &Path) -> VecDeque<DetectionRecord> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VecDeque::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read detection log, starting empty");
            return VecDeque::new();
        }
    };
    match serde_json::from_slice::<Vec<DetectionRecord>>(&data) {
        Ok(records) => records.into(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "detection log is corrupt, starting empty");
            VecDeque::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(class: &str, confidence: f32) -> DetectionRecord {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        DetectionRecord::new(at, class, confidence, 0)
    }

    #[test]
    fn record_formats_timestamp_and_rounds_confidence() {
        let r = record("person", 0.876_543);
        assert_eq!(r.timestamp, "2024-05-01 12:30:05");
        assert_eq!(r.confidence, 0.8765);
    }

    #[test]
    fn record_serializes_with_class_key() {
        let json = serde_json::to_value(record("dog", 0.5)).unwrap();
        assert_eq!(json["class"], "dog");
        assert_eq!(json["camera_idx"], 0);
        assert!(json.get("class_name").is_none());
    }

    #[test]
    fn append_persists_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("detection_log.json");
        let log = DetectionLog::open(&path, 1000);
        assert_eq!(log.append(&[record("person", 0.9), record("cat", 0.6)]).unwrap(), 2);

        let on_disk: Vec<DetectionRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[1].class_name, "cat");
    }

    #[test]
    fn capacity_keeps_newest_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        let log = DetectionLog::open(&path, 3);
        for i in 0..5 {
            log.append(&[record(&format!("c{i}"), 0.5)]).unwrap();
        }
        let names: Vec<String> = log.recent(10).into_iter().map(|r| r.class_name).collect();
        assert_eq!(names, vec!["c2", "c3", "c4"]);

        let reopened = DetectionLog::open(&path, 3);
        assert_eq!(reopened.len(), 3);
    }

    #[test]
    fn reopen_trims_oversized_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        let log = DetectionLog::open(&path, 10);
        for i in 0..6 {
            log.append(&[record(&format!("c{i}"), 0.5)]).unwrap();
        }
        let smaller = DetectionLog::open(&path, 2);
        let names: Vec<String> = smaller.recent(10).into_iter().map(|r| r.class_name).collect();
        assert_eq!(names, vec!["c4", "c5"]);
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let dir = TempDir::new().unwrap();
        let log = DetectionLog::open(dir.path().join("log.json"), 100);
        log.append(&[record("a", 0.5), record("b", 0.5), record("c", 0.5)])
            .unwrap();
        let names: Vec<String> = log.recent(2).into_iter().map(|r| r.class_name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{not json").unwrap();
        let log = DetectionLog::open(&path, 10);
        assert!(log.is_empty());
        log.append(&[record("person", 0.7)]).unwrap();
        assert_eq!(DetectionLog::open(&path, 10).len(), 1);
    }

    #[test]
    fn non_ascii_class_names_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.json");
        let log = DetectionLog::open(&path, 10);
        log.append(&[record("사람", 0.7)]).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("사람"));
    }

    #[test]
    fn append_error_still_updates_memory() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the persist step fail.
        let path = dir.path().join("log.json");
        std::fs::create_dir(&path).unwrap();
        let log = DetectionLog::open(&path, 10);
        assert!(log.append(&[record("person", 0.7)]).is_err());
        assert_eq!(log.len(), 1);
    }
}
