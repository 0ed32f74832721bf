//! Expands a `WorkoutStructure` back into a flat phase list.
//!
//! This is the inverse of the analyzer for programs the editor produces:
//! `warmup + rounds x (stages + rest) + cooldown`, skipping zero-length edges
//! and rests.

use crate::{Error, Phase, PhaseKind, Program, Result, WorkoutStructure};

pub const WARMUP_LABEL: &str = "Warm-up";
pub const REST_LABEL: &str = "Active recovery";
pub const COOLDOWN_LABEL: &str = "Cool-down";

/// Largest number of phases a structure may expand to
pub const MAX_PHASES: u64 = 10_000;

/// Lay out the phases described by a structure
///
/// The phase count and total duration are checked before anything is
/// allocated, so an absurd round count fails with `InvalidProgram`.
pub fn expand(structure: &WorkoutStructure) -> Result<Vec<Phase>> {
    let count = structure_phase_count(structure);
    if count > MAX_PHASES {
        return Err(Error::InvalidProgram(format!(
            "structure expands to {} phases (limit {})",
            count, MAX_PHASES
        )));
    }
    structure_total_seconds(structure)?;
    Ok(build_phases(structure))
}

fn build_phases(structure: &WorkoutStructure) -> Vec<Phase> {
    let mut phases = Vec::new();

    if structure.warmup_seconds > 0 {
        phases.push(Phase::warmup(structure.warmup_seconds, WARMUP_LABEL));
    }

    for round in 1..=structure.round_count {
        for (idx, stage) in structure.stage_template.iter().enumerate() {
            phases.push(Phase {
                kind: PhaseKind::Work,
                duration_seconds: stage.duration_seconds,
                label: format!("Round {} - Stage {}", round, idx + 1),
                intensity: Some(stage.intensity),
                target_cadence: Some(stage.target_cadence),
                body_position: Some(stage.body_position),
            });
        }

        if structure.rest_seconds > 0 {
            phases.push(Phase::rest(structure.rest_seconds, REST_LABEL));
        }
    }

    if structure.cooldown_seconds > 0 {
        phases.push(Phase::cooldown(structure.cooldown_seconds, COOLDOWN_LABEL));
    }

    phases
}

/// Build a validated program from a structure
///
/// Fails when the structure expands to no phases or contains a zero-length stage.
pub fn build_program(
    id: impl Into<String>,
    name: impl Into<String>,
    structure: &WorkoutStructure,
) -> Result<Program> {
    let mut program = Program::new(id, name, expand(structure)?)?;
    program.is_custom = true;
    Ok(program)
}

/// Total duration a structure expands to, without building the phases
pub fn structure_total_seconds(structure: &WorkoutStructure) -> Result<u32> {
    let overflow = || Error::InvalidProgram("total duration overflows".into());
    let round = structure
        .stage_template
        .iter()
        .try_fold(structure.rest_seconds, |acc, s| {
            acc.checked_add(s.duration_seconds)
        })
        .ok_or_else(overflow)?;
    structure
        .round_count
        .checked_mul(round)
        .and_then(|rounds| rounds.checked_add(structure.warmup_seconds))
        .and_then(|total| total.checked_add(structure.cooldown_seconds))
        .ok_or_else(overflow)
}

fn structure_phase_count(structure: &WorkoutStructure) -> u64 {
    let per_round =
        structure.stage_template.len() as u64 + u64::from(structure.rest_seconds > 0);
    let edges =
        u64::from(structure.warmup_seconds > 0) + u64::from(structure.cooldown_seconds > 0);
    u64::from(structure.round_count)
        .saturating_mul(per_round)
        .saturating_add(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Stage};

    #[test]
    fn test_default_structure_layout() {
        let structure = WorkoutStructure::default();
        let phases = expand(&structure).unwrap();

        // warmup + 10 x (1 stage + rest) + cooldown
        assert_eq!(phases.len(), 22);
        assert_eq!(phases[0].kind, PhaseKind::Warmup);
        assert_eq!(phases[1].label, "Round 1 - Stage 1");
        assert_eq!(phases[2].kind, PhaseKind::Rest);
        assert_eq!(phases[21].kind, PhaseKind::Cooldown);
    }

    #[test]
    fn test_zero_edges_and_rest_are_omitted() {
        let structure = WorkoutStructure {
            warmup_seconds: 0,
            cooldown_seconds: 0,
            round_count: 2,
            rest_seconds: 0,
            stage_template: vec![Stage::default()],
        };
        let phases = expand(&structure).unwrap();
        assert_eq!(phases.len(), 2);
        assert!(phases.iter().all(|p| p.kind == PhaseKind::Work));
    }

    #[test]
    fn test_program_total_matches_structure_total() {
        let structure = WorkoutStructure::default();
        let program = build_program("p1", "Default", &structure).unwrap();
        assert_eq!(
            program.total_time_seconds(),
            structure_total_seconds(&structure).unwrap()
        );
        assert_eq!(program.total_time_seconds(), 180 + 10 * 60 + 180);
        assert!(program.is_custom);
    }

    #[test]
    fn test_empty_structure_is_rejected() {
        let structure = WorkoutStructure {
            warmup_seconds: 0,
            cooldown_seconds: 0,
            round_count: 3,
            rest_seconds: 0,
            stage_template: vec![],
        };
        assert!(matches!(
            build_program("p1", "Nothing", &structure),
            Err(Error::InvalidProgram(_))
        ));
    }

    #[test]
    fn test_huge_round_count_is_rejected_before_expanding() {
        let structure = WorkoutStructure {
            round_count: 4_000_000_000,
            ..WorkoutStructure::default()
        };
        assert!(matches!(expand(&structure), Err(Error::InvalidProgram(_))));
        assert!(matches!(
            build_program("p1", "Forever", &structure),
            Err(Error::InvalidProgram(_))
        ));
    }

    #[test]
    fn test_overflowing_total_is_rejected() {
        let structure = WorkoutStructure {
            warmup_seconds: u32::MAX,
            ..WorkoutStructure::default()
        };
        assert!(matches!(
            structure_total_seconds(&structure),
            Err(Error::InvalidProgram(_))
        ));
        assert!(matches!(expand(&structure), Err(Error::InvalidProgram(_))));
    }

    #[test]
    fn test_phase_limit_is_inclusive() {
        let structure = WorkoutStructure {
            warmup_seconds: 0,
            cooldown_seconds: 0,
            round_count: MAX_PHASES as u32,
            rest_seconds: 0,
            stage_template: vec![Stage::default()],
        };
        assert_eq!(expand(&structure).unwrap().len(), MAX_PHASES as usize);

        let structure = WorkoutStructure {
            cooldown_seconds: 60,
            ..structure
        };
        assert!(matches!(expand(&structure), Err(Error::InvalidProgram(_))));
    }
}
