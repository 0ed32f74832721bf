//! Write-Ahead Log (WAL) for workout history.
//!
//! Workout logs are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access.

use crate::{Result, WorkoutLog};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Receiver for finished or abandoned workouts
pub trait HistoryRecorder {
    fn record(&mut self, log: &WorkoutLog) -> Result<()>;
}

/// JSONL-based history recorder with file locking
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    /// Create a new JSONL recorder for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl HistoryRecorder for JsonlHistory {
    fn record(&mut self, log: &WorkoutLog) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(log)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended workout log {} to WAL", log.id);
        Ok(())
    }
}

/// In-memory recorder, for callers that persist elsewhere
impl HistoryRecorder for Vec<WorkoutLog> {
    fn record(&mut self, log: &WorkoutLog) -> Result<()> {
        self.push(log.clone());
        Ok(())
    }
}

/// Read all workout logs from a WAL file
pub fn read_logs(path: &Path) -> Result<Vec<WorkoutLog>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut logs = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<WorkoutLog>(&line) {
            Ok(log) => logs.push(log),
            Err(e) => {
                tracing::warn!("Failed to parse workout log at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} workout logs from WAL", logs.len());
    Ok(logs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::LogStatus;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    pub(crate) fn log_at(user: &str, completed_at: DateTime<Utc>, seconds: u32) -> WorkoutLog {
        WorkoutLog {
            id: Uuid::new_v4(),
            program_name: "HIIT (Speed)".into(),
            duration_seconds: seconds,
            target_duration_seconds: 1320,
            completed_at,
            user_id: user.into(),
            user_name: user.to_uppercase(),
            status: LogStatus::classify(seconds, 1320),
        }
    }

    #[test]
    fn test_append_and_read_single_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("history.wal");

        let log = log_at("u1", Utc::now(), 1320);
        let log_id = log.id;

        let mut recorder = JsonlHistory::new(&wal_path);
        recorder.record(&log).unwrap();

        let logs = read_logs(&wal_path).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, log_id);
        assert_eq!(logs[0].status, LogStatus::Completed);
    }

    #[test]
    fn test_append_multiple_logs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("nested/dir/history.wal");

        let mut recorder = JsonlHistory::new(&wal_path);
        for _ in 0..5 {
            recorder.record(&log_at("u1", Utc::now(), 600)).unwrap();
        }

        assert_eq!(read_logs(&wal_path).unwrap().len(), 5);
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("history.wal");

        let mut recorder = JsonlHistory::new(&wal_path);
        recorder.record(&log_at("u1", Utc::now(), 600)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        recorder.record(&log_at("u1", Utc::now(), 700)).unwrap();

        assert_eq!(read_logs(&wal_path).unwrap().len(), 2);
    }

    #[test]
    fn test_read_missing_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let logs = read_logs(&temp_dir.path().join("nonexistent.wal")).unwrap();
        assert!(logs.is_empty());
    }
}
