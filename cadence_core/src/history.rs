//! Workout history: recording finished rides and loading past ones.
//!
//! History lives in the JSONL WAL until it is rolled up into the CSV
//! archive; loading merges both.

use crate::csv_rollup::CsvRow;
use crate::wal::HistoryRecorder;
use crate::{LogStatus, Program, Result, UserIdentity, WorkoutLog};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

impl TryFrom<CsvRow> for WorkoutLog {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::Other(format!("Invalid UUID: {}", e)))?;

        let completed_at = DateTime::parse_from_rfc3339(&row.completed_at)
            .map_err(|e| crate::Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(WorkoutLog {
            id,
            program_name: row.program_name,
            duration_seconds: row.duration,
            target_duration_seconds: row.target_duration,
            completed_at,
            user_id: row.user_id,
            user_name: row.user_name,
            status: row.status,
        })
    }
}

/// Record a ride of `elapsed_seconds` on `program`
///
/// Nothing is written when no rider is signed in. The status is derived by
/// comparing the elapsed time with the program total.
pub fn record_completion(
    recorder: &mut impl HistoryRecorder,
    identity: Option<&UserIdentity>,
    program: &Program,
    elapsed_seconds: u32,
) -> Result<Option<WorkoutLog>> {
    let Some(user) = identity else {
        tracing::info!("Not signed in; skipping history for '{}'", program.name);
        return Ok(None);
    };

    let total = program.total_time_seconds();
    let log = WorkoutLog {
        id: Uuid::new_v4(),
        program_name: program.name.clone(),
        duration_seconds: elapsed_seconds,
        target_duration_seconds: total,
        completed_at: Utc::now(),
        user_id: user.id.clone(),
        user_name: user.display_name.clone(),
        status: LogStatus::classify(elapsed_seconds, total),
    };

    recorder.record(&log)?;
    tracing::info!(
        "Recorded {:?} ride of '{}' ({}s of {}s)",
        log.status,
        log.program_name,
        elapsed_seconds,
        total
    );
    Ok(Some(log))
}

/// Load every log from the WAL and the CSV archive
///
/// Returns logs sorted by completion time (newest first), deduplicated by id.
pub fn load_history(wal_path: &Path, csv_path: &Path) -> Result<Vec<WorkoutLog>> {
    let mut logs = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for log in crate::wal::read_logs(wal_path)? {
            if seen_ids.insert(log.id) {
                logs.push(log);
            }
        }
        tracing::debug!("Loaded {} logs from WAL", logs.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for log in load_logs_from_csv(csv_path)? {
            if seen_ids.insert(log.id) {
                logs.push(log);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} logs from CSV", csv_count);
    }

    logs.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    tracing::info!("Loaded {} workout logs", logs.len());

    Ok(logs)
}

/// Logs belonging to one rider
pub fn logs_for_user<'a>(logs: &'a [WorkoutLog], user_id: &str) -> Vec<&'a WorkoutLog> {
    logs.iter().filter(|l| l.user_id == user_id).collect()
}

fn load_logs_from_csv(path: &Path) -> Result<Vec<WorkoutLog>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut logs = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match WorkoutLog::try_from(row) {
                Ok(log) => logs.push(log),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(logs)
}
