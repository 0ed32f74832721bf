//! Built-in workout programs.
//!
//! Presets are always available, signed in or not, and are never stored in
//! the program library.

use crate::{BodyPosition, Intensity, Phase, Program};
use once_cell::sync::Lazy;

/// Cached preset list - built once and reused across all operations
static PRESETS: Lazy<Vec<Program>> = Lazy::new(build_presets);

/// Get the built-in programs
pub fn get_presets() -> &'static [Program] {
    &PRESETS
}

/// Look up a built-in program by id
pub fn find_preset(id: &str) -> Option<&'static Program> {
    PRESETS.iter().find(|p| p.id == id)
}

fn build_presets() -> Vec<Program> {
    vec![mountain_climb(), hiit_speed(), endurance()]
        .into_iter()
        .filter_map(|result| match result {
            Ok(program) => Some(program),
            Err(e) => {
                tracing::warn!("Skipping invalid preset: {}", e);
                None
            }
        })
        .collect()
}

fn recovery(duration: u32, rpm: u32) -> Phase {
    Phase::rest(duration, "Recovery")
        .with_intensity(Intensity::Light)
        .with_cadence(rpm)
        .with_position(BodyPosition::Seated)
}

/// Strength: five long standing climbs
fn mountain_climb() -> crate::Result<Program> {
    let mut phases = vec![Phase::warmup(300, "Warm-up")];
    for i in 0..5 {
        phases.push(
            Phase::work(180, format!("Climb {}", i + 1))
                .with_intensity(Intensity::Heavy)
                .with_cadence(60)
                .with_position(BodyPosition::Standing),
        );
        phases.push(recovery(60, 90));
    }
    phases.push(Phase::cooldown(300, "Cool-down"));

    Program::new("mountain_climb", "Mountain Climb (Strength)", phases)
}

/// Speed: eight short seated sprints
fn hiit_speed() -> crate::Result<Program> {
    let mut phases = vec![Phase::warmup(180, "Warm-up")];
    for _ in 0..8 {
        phases.push(
            Phase::work(30, "SPRINT")
                .with_intensity(Intensity::Heavy)
                .with_cadence(110)
                .with_position(BodyPosition::Seated),
        );
        phases.push(recovery(90, 80));
    }
    phases.push(Phase::cooldown(180, "Cool-down"));

    Program::new("hiit_speed", "HIIT (Speed)", phases)
}

/// Endurance: one long steady cruise
fn endurance() -> crate::Result<Program> {
    let phases = vec![
        Phase::warmup(300, "Warm-up"),
        Phase::work(1800, "Cruise")
            .with_intensity(Intensity::Moderate)
            .with_cadence(90)
            .with_position(BodyPosition::Seated),
        Phase::cooldown(300, "Cool-down"),
    ];

    Program::new("endurance", "Endurance", phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;

    #[test]
    fn test_all_presets_build() {
        assert_eq!(get_presets().len(), 3);
        for preset in get_presets() {
            assert!(preset.validate().is_ok(), "{} is invalid", preset.id);
            assert!(!preset.is_custom);
        }
    }

    #[test]
    fn test_preset_totals_are_computed() {
        assert_eq!(find_preset("mountain_climb").unwrap().total_time_seconds(), 1800);
        assert_eq!(find_preset("hiit_speed").unwrap().total_time_seconds(), 1320);
        assert_eq!(find_preset("endurance").unwrap().total_time_seconds(), 2400);
    }

    #[test]
    fn test_find_unknown_preset() {
        assert!(find_preset("nope").is_none());
    }

    #[test]
    fn test_hiit_structure() {
        let s = analyze(find_preset("hiit_speed").unwrap().phases());
        assert_eq!(s.round_count, 8);
        assert_eq!(s.rest_seconds, 90);
        assert_eq!(s.stage_template.len(), 1);
        assert_eq!(s.stage_template[0].target_cadence, 110);
    }

    #[test]
    fn test_endurance_structure() {
        let s = analyze(find_preset("endurance").unwrap().phases());
        assert_eq!(s.round_count, 1);
        assert_eq!(s.rest_seconds, 0);
        assert_eq!(s.stage_template[0].duration_seconds, 1800);
    }
}
