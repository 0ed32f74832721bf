//! Core domain types for the Cadence interval timer.
//!
//! This module defines the fundamental types used throughout the system:
//! - Phases and their riding targets
//! - Stages and inferred workout structure
//! - Workout logs and user identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Phase Types
// ============================================================================

/// Role of a phase within a program
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Warmup,
    Work,
    Rest,
    Cooldown,
}

/// Resistance level on the bike
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Light,
    #[default]
    Moderate,
    Heavy,
}

/// Riding position
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BodyPosition {
    #[default]
    Seated,
    Standing,
}

/// One timed segment of a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    pub kind: PhaseKind,
    pub duration_seconds: u32,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Intensity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cadence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_position: Option<BodyPosition>,
}

impl Phase {
    /// Create a phase without riding targets
    pub fn new(kind: PhaseKind, duration_seconds: u32, label: impl Into<String>) -> Self {
        Self {
            kind,
            duration_seconds,
            label: label.into(),
            intensity: None,
            target_cadence: None,
            body_position: None,
        }
    }

    pub fn warmup(duration_seconds: u32, label: impl Into<String>) -> Self {
        Self::new(PhaseKind::Warmup, duration_seconds, label)
    }

    pub fn work(duration_seconds: u32, label: impl Into<String>) -> Self {
        Self::new(PhaseKind::Work, duration_seconds, label)
    }

    pub fn rest(duration_seconds: u32, label: impl Into<String>) -> Self {
        Self::new(PhaseKind::Rest, duration_seconds, label)
    }

    pub fn cooldown(duration_seconds: u32, label: impl Into<String>) -> Self {
        Self::new(PhaseKind::Cooldown, duration_seconds, label)
    }

    pub fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_cadence(mut self, rpm: u32) -> Self {
        self.target_cadence = Some(rpm);
        self
    }

    pub fn with_position(mut self, position: BodyPosition) -> Self {
        self.body_position = Some(position);
        self
    }
}

// ============================================================================
// Structure Types
// ============================================================================

/// Cadence shown for stages that carry no explicit target
pub const DEFAULT_STAGE_CADENCE: u32 = 80;

/// One repeating unit of work within a round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub duration_seconds: u32,
    pub intensity: Intensity,
    pub target_cadence: u32,
    pub body_position: BodyPosition,
}

impl Stage {
    /// Stage view of a phase, filling presentation defaults for missing targets
    pub fn from_phase(phase: &Phase) -> Self {
        Self {
            duration_seconds: phase.duration_seconds,
            intensity: phase.intensity.unwrap_or_default(),
            target_cadence: phase.target_cadence.unwrap_or(DEFAULT_STAGE_CADENCE),
            body_position: phase.body_position.unwrap_or_default(),
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            duration_seconds: 30,
            intensity: Intensity::Moderate,
            target_cadence: DEFAULT_STAGE_CADENCE,
            body_position: BodyPosition::Seated,
        }
    }
}

/// Editable description of a program: warmup + rounds x (stages + rest) + cooldown
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutStructure {
    pub warmup_seconds: u32,
    pub cooldown_seconds: u32,
    pub round_count: u32,
    pub rest_seconds: u32,
    pub stage_template: Vec<Stage>,
}

impl Default for WorkoutStructure {
    /// Starting point of a fresh program in the editor
    fn default() -> Self {
        Self {
            warmup_seconds: 180,
            cooldown_seconds: 180,
            round_count: 10,
            rest_seconds: 30,
            stage_template: vec![Stage::default()],
        }
    }
}

// ============================================================================
// History Types
// ============================================================================

/// Whether a logged workout ran to the end
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Completed,
    Incomplete,
}

impl LogStatus {
    /// A record is incomplete only when it stopped short of the program total
    pub fn classify(elapsed_seconds: u32, total_seconds: u32) -> Self {
        if elapsed_seconds < total_seconds {
            LogStatus::Incomplete
        } else {
            LogStatus::Completed
        }
    }
}

/// A recorded workout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: Uuid,
    pub program_name: String,
    pub duration_seconds: u32,
    pub target_duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub status: LogStatus,
}

/// The signed-in rider
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
}
