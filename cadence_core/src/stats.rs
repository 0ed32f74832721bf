//! Derived views over workout history: streaks, leaderboard, calendar.

use crate::WorkoutLog;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Consecutive days with at least one workout, counted back from `now`
///
/// A streak survives a day that has not had its workout yet: if today has no
/// log the count starts from yesterday. Days are calendar days in `now`'s
/// time zone.
pub fn current_streak<Tz: TimeZone>(logs: &[WorkoutLog], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let days: HashSet<NaiveDate> = logs
        .iter()
        .map(|l| l.completed_at.with_timezone(&tz).date_naive())
        .collect();

    let mut day = now.date_naive();
    if !days.contains(&day) {
        day = day - Duration::days(1);
    }

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// One rider's totals on the leaderboard
#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub user_name: String,
    pub total_workouts: u32,
    pub total_minutes: f64,
}

/// Aggregate logs per rider, most minutes first
///
/// Partial rides count toward both totals.
pub fn leaderboard(logs: &[WorkoutLog]) -> Vec<LeaderboardEntry> {
    let mut by_user: HashMap<&str, LeaderboardEntry> = HashMap::new();

    for log in logs {
        let entry = by_user
            .entry(log.user_id.as_str())
            .or_insert_with(|| LeaderboardEntry {
                user_id: log.user_id.clone(),
                user_name: log.user_name.clone(),
                total_workouts: 0,
                total_minutes: 0.0,
            });
        entry.total_workouts += 1;
        entry.total_minutes += log.duration_seconds as f64 / 60.0;
    }

    let mut ranking: Vec<LeaderboardEntry> = by_user.into_values().collect();
    ranking.sort_by(|a, b| {
        b.total_minutes
            .total_cmp(&a.total_minutes)
            .then_with(|| a.user_name.cmp(&b.user_name))
    });
    ranking
}

/// Days of a month (1-based) with at least one workout
pub fn workout_days_in_month<Tz: TimeZone>(
    logs: &[WorkoutLog],
    tz: &Tz,
    year: i32,
    month: u32,
) -> BTreeSet<u32> {
    logs.iter()
        .map(|l| l.completed_at.with_timezone(tz).date_naive())
        .filter(|d| d.year() == year && d.month() == month)
        .map(|d| d.day())
        .collect()
}
