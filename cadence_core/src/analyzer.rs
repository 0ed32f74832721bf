//! Structure inference for flat phase lists.
//!
//! Recovers `warmup + rounds x (stages + rest) + cooldown` from a program so
//! the editor can pre-fill its fields and previews can draw a compact view.
//! Detection strategies, in order:
//! - Strip a leading warmup and a trailing cooldown
//! - Rest-delimited rounds (first rest phase fixes the round length)
//! - Repeating work pattern when there are no rests, preferring the most rounds
//! - Single round holding the whole core as a last resort

use crate::{Phase, PhaseKind, Stage, WorkoutStructure};

/// Which detection strategy produced a structure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Nothing between warmup and cooldown
    EmptyCore,
    /// Rests split the core into equal rounds
    RestDelimited,
    /// Rests present but not evenly spaced; work phases collapsed into one round
    IrregularRests,
    /// No rests; the core is a repeated block of phases
    RepeatingPattern,
    /// No rests and no repetition; the core is one round as-is
    SingleRound,
}

/// Result of running the analyzer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inference {
    pub structure: WorkoutStructure,
    pub strategy: Strategy,
}

/// Infer the editable structure of a phase list
pub fn analyze(phases: &[Phase]) -> WorkoutStructure {
    infer(phases).structure
}

/// Infer the structure and report which strategy matched
pub fn infer(phases: &[Phase]) -> Inference {
    let mut start = 0;
    let mut end = phases.len();
    let mut warmup_seconds = 0;
    let mut cooldown_seconds = 0;

    if let Some(first) = phases.first() {
        if first.kind == PhaseKind::Warmup {
            warmup_seconds = first.duration_seconds;
            start = 1;
        }
    }

    if end > start {
        let last = &phases[end - 1];
        if last.kind == PhaseKind::Cooldown {
            cooldown_seconds = last.duration_seconds;
            end -= 1;
        }
    }

    let core = &phases[start..end];
    let (round_count, rest_seconds, template, strategy) = detect_rounds(core);

    tracing::debug!(
        "Analyzed {} phases: {:?}, {} round(s) of {} stage(s), rest {}s",
        phases.len(),
        strategy,
        round_count,
        template.len(),
        rest_seconds
    );

    Inference {
        structure: WorkoutStructure {
            warmup_seconds,
            cooldown_seconds,
            round_count,
            rest_seconds,
            stage_template: template.into_iter().map(Stage::from_phase).collect(),
        },
        strategy,
    }
}

fn detect_rounds(core: &[Phase]) -> (u32, u32, Vec<&Phase>, Strategy) {
    if core.is_empty() {
        return (1, 0, Vec::new(), Strategy::EmptyCore);
    }

    if let Some(first_rest) = core.iter().position(|p| p.kind == PhaseKind::Rest) {
        let rest_seconds = core[first_rest].duration_seconds;
        let round_length = first_rest + 1;

        if core.len() % round_length == 0 {
            let rounds = (core.len() / round_length) as u32;
            let template = core[..first_rest].iter().collect();
            return (rounds, rest_seconds, template, Strategy::RestDelimited);
        }

        // Rest spacing does not divide the core; keep the work and drop the rests.
        let work = core.iter().filter(|p| p.kind == PhaseKind::Work).collect();
        return (1, 0, work, Strategy::IrregularRests);
    }

    let len = core.len();
    for rounds in (1..=len).rev() {
        if len % rounds != 0 {
            continue;
        }
        let stage_count = len / rounds;
        let candidate = &core[..stage_count];

        let repeats = core
            .chunks(stage_count)
            .all(|block| block.iter().zip(candidate).all(|(a, b)| same_stage(a, b)));

        if repeats {
            let strategy = if rounds > 1 {
                Strategy::RepeatingPattern
            } else {
                Strategy::SingleRound
            };
            return (rounds as u32, 0, candidate.iter().collect(), strategy);
        }
    }

    // rounds == 1 always matches itself, so this is never reached in practice.
    (1, 0, core.iter().collect(), Strategy::SingleRound)
}

/// Stage equality ignores labels; a phase's role in the round is its targets
fn same_stage(a: &Phase, b: &Phase) -> bool {
    a.duration_seconds == b.duration_seconds
        && a.intensity == b.intensity
        && a.target_cadence == b.target_cadence
        && a.body_position == b.body_position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::expand;
    use crate::{BodyPosition, Intensity};

    fn stage(duration: u32, intensity: Intensity, rpm: u32, position: BodyPosition) -> Stage {
        Stage {
            duration_seconds: duration,
            intensity,
            target_cadence: rpm,
            body_position: position,
        }
    }

    fn durations(structure: &WorkoutStructure) -> Vec<u32> {
        structure
            .stage_template
            .iter()
            .map(|s| s.duration_seconds)
            .collect()
    }

    #[test]
    fn test_mountain_style_program() {
        let mut phases = vec![Phase::warmup(300, "Warm-up")];
        for i in 0..3 {
            phases.push(Phase::work(180, format!("Climb {}", i + 1)));
            phases.push(Phase::rest(60, "Recovery"));
        }
        phases.push(Phase::cooldown(300, "Cool-down"));
        assert_eq!(phases.len(), 8);

        let inference = infer(&phases);
        let s = &inference.structure;

        assert_eq!(inference.strategy, Strategy::RestDelimited);
        assert_eq!(s.warmup_seconds, 300);
        assert_eq!(s.cooldown_seconds, 300);
        assert_eq!(s.rest_seconds, 60);
        assert_eq!(s.round_count, 3);
        assert_eq!(durations(s), vec![180]);
    }

    #[test]
    fn test_missing_targets_get_presentation_defaults() {
        let phases = vec![Phase::work(40, "A"), Phase::rest(20, "R")];
        let s = analyze(&phases);

        assert_eq!(s.stage_template.len(), 1);
        assert_eq!(s.stage_template[0].intensity, Intensity::Moderate);
        assert_eq!(s.stage_template[0].target_cadence, 80);
        assert_eq!(s.stage_template[0].body_position, BodyPosition::Seated);
        // Source phases keep their empty targets.
        assert_eq!(phases[0].intensity, None);
    }

    #[test]
    fn test_irregular_rests_collapse_to_one_round() {
        // First rest at index 1 implies rounds of 2, which does not divide 7 phases.
        let phases = vec![
            Phase::work(30, "A"),
            Phase::rest(10, "R"),
            Phase::work(30, "B"),
            Phase::work(30, "C"),
            Phase::work(30, "D"),
            Phase::rest(10, "R"),
            Phase::work(45, "E"),
        ];
        let inference = infer(&phases);

        assert_eq!(inference.strategy, Strategy::IrregularRests);
        assert_eq!(inference.structure.round_count, 1);
        assert_eq!(inference.structure.rest_seconds, 0);
        assert_eq!(durations(&inference.structure), vec![30, 30, 30, 30, 45]);
    }

    #[test]
    fn test_no_rest_prefers_smallest_repeating_unit() {
        let a = Phase::work(30, "Sprint").with_intensity(Intensity::Heavy);
        let b = Phase::work(60, "Spin").with_intensity(Intensity::Light);
        let phases = vec![a.clone(), b.clone(), a.clone(), b.clone(), a, b];

        let inference = infer(&phases);
        assert_eq!(inference.strategy, Strategy::RepeatingPattern);
        assert_eq!(inference.structure.round_count, 3);
        assert_eq!(durations(&inference.structure), vec![30, 60]);
    }

    #[test]
    fn test_no_rest_identical_phases_become_rounds_of_one() {
        let phases = vec![Phase::work(30, "x"); 4];
        let s = analyze(&phases);
        assert_eq!(s.round_count, 4);
        assert_eq!(durations(&s), vec![30]);
    }

    #[test]
    fn test_no_rest_pattern_compares_targets_not_just_duration() {
        let phases = vec![
            Phase::work(30, "A").with_position(BodyPosition::Standing),
            Phase::work(30, "B").with_position(BodyPosition::Seated),
        ];
        let inference = infer(&phases);
        assert_eq!(inference.strategy, Strategy::SingleRound);
        assert_eq!(inference.structure.round_count, 1);
        assert_eq!(inference.structure.stage_template.len(), 2);
    }

    #[test]
    fn test_no_pattern_keeps_core_verbatim() {
        let phases = vec![
            Phase::warmup(120, "W"),
            Phase::work(30, "A"),
            Phase::work(45, "B"),
            Phase::work(60, "C"),
        ];
        let s = analyze(&phases);
        assert_eq!(s.warmup_seconds, 120);
        assert_eq!(s.cooldown_seconds, 0);
        assert_eq!(s.round_count, 1);
        assert_eq!(durations(&s), vec![30, 45, 60]);
    }

    #[test]
    fn test_edges_only() {
        let phases = vec![Phase::warmup(300, "W"), Phase::cooldown(300, "C")];
        let inference = infer(&phases);
        assert_eq!(inference.strategy, Strategy::EmptyCore);
        assert_eq!(inference.structure.warmup_seconds, 300);
        assert_eq!(inference.structure.cooldown_seconds, 300);
        assert!(inference.structure.stage_template.is_empty());
    }

    #[test]
    fn test_single_cooldown_phase() {
        let s = analyze(&[Phase::cooldown(90, "C")]);
        assert_eq!(s.warmup_seconds, 0);
        assert_eq!(s.cooldown_seconds, 90);
    }

    #[test]
    fn test_roundtrip_regular_programs() {
        let templates = vec![
            vec![stage(30, Intensity::Heavy, 110, BodyPosition::Seated)],
            vec![
                stage(30, Intensity::Heavy, 100, BodyPosition::Standing),
                stage(45, Intensity::Moderate, 90, BodyPosition::Seated),
            ],
            vec![
                stage(20, Intensity::Light, 70, BodyPosition::Seated),
                stage(20, Intensity::Moderate, 85, BodyPosition::Seated),
                stage(20, Intensity::Heavy, 95, BodyPosition::Standing),
            ],
            vec![
                stage(60, Intensity::Heavy, 60, BodyPosition::Standing),
                stage(30, Intensity::Light, 90, BodyPosition::Seated),
                stage(60, Intensity::Heavy, 65, BodyPosition::Standing),
                stage(15, Intensity::Light, 100, BodyPosition::Seated),
            ],
            vec![
                stage(10, Intensity::Light, 80, BodyPosition::Seated),
                stage(20, Intensity::Light, 80, BodyPosition::Seated),
                stage(30, Intensity::Light, 80, BodyPosition::Seated),
                stage(40, Intensity::Light, 80, BodyPosition::Seated),
                stage(50, Intensity::Light, 80, BodyPosition::Seated),
            ],
        ];

        for template in &templates {
            for &(warmup, cooldown) in &[(0, 0), (180, 0), (0, 240), (300, 300)] {
                for &rest in &[0, 15, 60] {
                    for rounds in 1..=4 {
                        let input = WorkoutStructure {
                            warmup_seconds: warmup,
                            cooldown_seconds: cooldown,
                            round_count: rounds,
                            rest_seconds: rest,
                            stage_template: template.clone(),
                        };
                        let phases = expand(&input).unwrap();
                        let output = analyze(&phases);

                        assert_eq!(output, input, "structure mismatch for {:?}", input);
                        assert_eq!(
                            expand(&output).unwrap().len(),
                            phases.len(),
                            "phase count mismatch for {:?}",
                            input
                        );
                    }
                }
            }
        }
    }
}
