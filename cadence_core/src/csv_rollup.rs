//! CSV rollup for archiving the history WAL.
//!
//! Logs are appended to a CSV archive and the WAL is renamed, never deleted,
//! so a failed rollup cannot lose records.

use crate::{LogStatus, Result, WorkoutLog};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV archive
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct CsvRow {
    pub id: String,
    pub program_name: String,
    pub completed_at: String,
    pub duration: u32,
    pub target_duration: u32,
    pub status: LogStatus,
    pub user_id: String,
    pub user_name: String,
}

impl From<&WorkoutLog> for CsvRow {
    fn from(log: &WorkoutLog) -> Self {
        CsvRow {
            id: log.id.to_string(),
            program_name: log.program_name.clone(),
            completed_at: log.completed_at.to_rfc3339(),
            duration: log.duration_seconds,
            target_duration: log.target_duration_seconds,
            status: log.status,
            user_id: log.user_id.clone(),
            user_name: log.user_name.clone(),
        }
    }
}

/// Roll up WAL logs into CSV and archive the WAL
///
/// 1. Reads all logs from the WAL
/// 2. Appends them to the CSV file (writing headers if it is new)
/// 3. Syncs the CSV to disk
/// 4. Renames the WAL to `.wal.processed`
///
/// Returns the number of logs archived.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let logs = crate::wal::read_logs(wal_path)?;

    if logs.is_empty() {
        tracing::info!("No workout logs in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for log in &logs {
        writer.serialize(CsvRow::from(log))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} workout logs to CSV", logs.len());

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(logs.len())
}

/// Remove `.processed` WAL files from a directory
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}
