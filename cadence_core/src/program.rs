//! Workout programs: an ordered, validated sequence of phases.
//!
//! The phase list and the total duration are private so the total can only
//! change together with the phases it is derived from.

use crate::{Error, Phase, PhaseKind, Result, UserIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named workout program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ProgramRecord")]
pub struct Program {
    pub id: String,
    pub name: String,
    phases: Vec<Phase>,
    total_time_seconds: u32,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub downloads: u32,
}

/// Unvalidated on-disk shape of a program
#[derive(Deserialize)]
struct ProgramRecord {
    id: String,
    name: String,
    phases: Vec<Phase>,
    #[serde(default)]
    total_time_seconds: Option<u32>,
    #[serde(default)]
    is_custom: bool,
    #[serde(default)]
    is_global: bool,
    #[serde(default)]
    creator_id: Option<String>,
    #[serde(default)]
    creator_name: Option<String>,
    #[serde(default)]
    original_id: Option<String>,
    #[serde(default)]
    downloaded_from: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    downloads: u32,
}

impl TryFrom<ProgramRecord> for Program {
    type Error = Error;

    fn try_from(record: ProgramRecord) -> Result<Self> {
        let mut program = Program::new(record.id, record.name, record.phases)?;

        if let Some(stored) = record.total_time_seconds {
            if stored != program.total_time_seconds {
                return Err(Error::InvalidProgram(format!(
                    "program '{}' stores total {}s but its phases sum to {}s",
                    program.id, stored, program.total_time_seconds
                )));
            }
        }

        program.is_custom = record.is_custom;
        program.is_global = record.is_global;
        program.creator_id = record.creator_id;
        program.creator_name = record.creator_name;
        program.original_id = record.original_id;
        program.downloaded_from = record.downloaded_from;
        program.created_at = record.created_at;
        program.downloads = record.downloads;
        Ok(program)
    }
}

/// Sum of phase durations, or an error describing the first invalid phase
fn checked_total(phases: &[Phase]) -> Result<u32> {
    if phases.is_empty() {
        return Err(Error::InvalidProgram("program has no phases".into()));
    }

    let mut total: u32 = 0;
    for (idx, phase) in phases.iter().enumerate() {
        if phase.duration_seconds == 0 {
            return Err(Error::InvalidProgram(format!(
                "phase {} ('{}') has zero duration",
                idx + 1,
                phase.label
            )));
        }
        total = total
            .checked_add(phase.duration_seconds)
            .ok_or_else(|| Error::InvalidProgram("total duration overflows".into()))?;
    }
    Ok(total)
}

impl Program {
    /// Build a program, validating the phases and computing the total
    pub fn new(id: impl Into<String>, name: impl Into<String>, phases: Vec<Phase>) -> Result<Self> {
        let total_time_seconds = checked_total(&phases)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            phases,
            total_time_seconds,
            is_custom: false,
            is_global: false,
            creator_id: None,
            creator_name: None,
            original_id: None,
            downloaded_from: None,
            created_at: None,
            downloads: 0,
        })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn total_time_seconds(&self) -> u32 {
        self.total_time_seconds
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Number of phases of the given kind
    pub fn count_kind(&self, kind: PhaseKind) -> usize {
        self.phases.iter().filter(|p| p.kind == kind).count()
    }

    /// Replace the phase list; the total is recomputed in the same step
    pub fn set_phases(&mut self, phases: Vec<Phase>) -> Result<()> {
        let total = checked_total(&phases)?;
        self.phases = phases;
        self.total_time_seconds = total;
        Ok(())
    }

    /// Re-check the stored total against the phases
    pub fn validate(&self) -> Result<()> {
        let total = checked_total(&self.phases)?;
        if total != self.total_time_seconds {
            return Err(Error::InvalidProgram(format!(
                "stored total {}s does not match phase sum {}s",
                self.total_time_seconds, total
            )));
        }
        Ok(())
    }

    /// Private copy of a community program for the given rider
    ///
    /// Publication provenance is dropped and the name marks it as downloaded.
    pub fn downloaded_copy(&self, new_id: impl Into<String>, owner: &UserIdentity) -> Self {
        let mut copy = self.clone();
        copy.id = new_id.into();
        copy.name = format!("{} (Downloaded)", self.name);
        copy.is_custom = true;
        copy.is_global = false;
        copy.creator_id = Some(owner.id.clone());
        copy.creator_name = None;
        copy.original_id = None;
        copy.downloaded_from = Some(self.id.clone());
        copy.created_at = Some(Utc::now());
        copy.downloads = 0;
        copy
    }

    /// Community entry for one of the rider's own programs
    pub fn published_copy(&self, new_id: impl Into<String>, owner: &UserIdentity) -> Self {
        let mut copy = self.clone();
        copy.id = new_id.into();
        copy.is_global = true;
        copy.original_id = Some(self.id.clone());
        copy.creator_id = Some(owner.id.clone());
        copy.creator_name = Some(owner.display_name.clone());
        copy.downloaded_from = None;
        copy.created_at = Some(Utc::now());
        copy
    }
}
