use cadence_core::analyzer::infer;
use cadence_core::builder::expand;
use cadence_core::engine::AbortSummary;
use cadence_core::stats::{current_streak, leaderboard, workout_days_in_month};
use cadence_core::*;
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Interval timer for indoor cycling workouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ride as this user id (overrides config)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Display name for --user
    #[arg(long, global = true)]
    name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List preset, saved and community programs (default)
    List,

    /// Show a program's phases and inferred structure
    Show { id: String },

    /// Build a new program from a round structure
    Build {
        /// Program name
        #[arg(long)]
        title: String,

        #[command(flatten)]
        structure: StructureArgs,
    },

    /// Change a saved program, starting from its inferred structure
    Edit {
        id: String,

        /// New program name
        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        structure: StructureArgs,
    },

    /// Delete a saved program (and withdraw it from the community board)
    Delete { id: String },

    /// Share a saved program on the community board
    Publish { id: String },

    /// Withdraw a program from the community board
    Unpublish { id: String },

    /// Copy a community program into your library
    Download { id: String },

    /// Play a program
    Run {
        id: String,

        /// Cue mode (beep, voice, mute)
        #[arg(long, value_parser = parse_cue_mode)]
        cue: Option<CueMode>,

        /// Run on a virtual clock without waiting (for testing)
        #[arg(long)]
        simulate: bool,

        /// With --simulate, quit after this many seconds
        #[arg(long, requires = "simulate", value_parser = parse_seconds)]
        stop_after: Option<u32>,
    },

    /// Show your ride history, streak and this month's calendar
    History,

    /// Leaderboard across all riders
    Ranking,

    /// Roll up the history WAL to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// Round structure overrides shared by build and edit
#[derive(Args)]
struct StructureArgs {
    /// Warm-up length (seconds, or with s/m suffix)
    #[arg(long, value_parser = parse_seconds)]
    warmup: Option<u32>,

    /// Cool-down length
    #[arg(long, value_parser = parse_seconds)]
    cooldown: Option<u32>,

    /// Number of rounds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: Option<u32>,

    /// Recovery between rounds (0 for none)
    #[arg(long, value_parser = parse_seconds)]
    rest: Option<u32>,

    /// Stage of a round: DURATION[:INTENSITY[:RPM[:POSITION]]]; repeat for more stages
    #[arg(long = "stage", value_parser = parse_stage)]
    stages: Vec<Stage>,
}

impl StructureArgs {
    fn apply(self, mut structure: WorkoutStructure) -> WorkoutStructure {
        if let Some(warmup) = self.warmup {
            structure.warmup_seconds = warmup;
        }
        if let Some(cooldown) = self.cooldown {
            structure.cooldown_seconds = cooldown;
        }
        if let Some(rounds) = self.rounds {
            structure.round_count = rounds;
        }
        if let Some(rest) = self.rest {
            structure.rest_seconds = rest;
        }
        if !self.stages.is_empty() {
            structure.stage_template = self.stages;
        }
        structure
    }
}

fn main() -> Result<()> {
    cadence_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    if let Some(user) = cli.user {
        config.user.id = Some(user);
        config.user.name = cli.name;
    }

    let ctx = AppContext::new(config);
    tracing::debug!("Using data directory {:?}", ctx.paths.root());

    match cli.command {
        Some(Commands::List) | None => cmd_list(&ctx),
        Some(Commands::Show { id }) => cmd_show(&ctx, &id),
        Some(Commands::Build { title, structure }) => cmd_build(&ctx, &title, structure),
        Some(Commands::Edit {
            id,
            title,
            structure,
        }) => cmd_edit(&ctx, &id, title, structure),
        Some(Commands::Delete { id }) => cmd_delete(&ctx, &id),
        Some(Commands::Publish { id }) => cmd_publish(&ctx, &id),
        Some(Commands::Unpublish { id }) => cmd_unpublish(&ctx, &id),
        Some(Commands::Download { id }) => cmd_download(&ctx, &id),
        Some(Commands::Run {
            id,
            cue,
            simulate,
            stop_after,
        }) => cmd_run(&ctx, &id, cue, simulate, stop_after),
        Some(Commands::History) => cmd_history(&ctx),
        Some(Commands::Ranking) => cmd_ranking(&ctx),
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&ctx, cleanup),
    }
}

// ============================================================================
// Library commands
// ============================================================================

fn cmd_list(ctx: &AppContext) -> Result<()> {
    let library = ctx.open_library()?;

    println!("Presets:");
    for program in get_presets() {
        print_program_line(program);
    }

    println!("\nMy programs:");
    if library.programs().is_empty() {
        println!("  (none)");
    }
    for program in library.programs() {
        print_program_line(program);
    }

    if !library.community().is_empty() {
        println!("\nCommunity:");
        for program in library.community() {
            print_program_line(program);
            println!(
                "      by {}, {} downloads",
                program.creator_name.as_deref().unwrap_or("unknown"),
                program.downloads
            );
        }
    }

    Ok(())
}

fn cmd_show(ctx: &AppContext, id: &str) -> Result<()> {
    let library = ctx.open_library()?;
    let program = ctx.find_program(&library, id)?;

    println!("\n{}  [{}]", program.name, program.id);
    println!(
        "Total: {}  ({} phases)\n",
        format_clock(program.total_time_seconds()),
        program.phase_count()
    );

    for (i, phase) in program.phases().iter().enumerate() {
        println!(
            "  {:>3}. {:<9} {:>6}  {}{}",
            i + 1,
            format!("{:?}", phase.kind).to_lowercase(),
            format_clock(phase.duration_seconds),
            phase.label,
            describe_targets(phase)
        );
    }

    let inference = infer(program.phases());
    let s = &inference.structure;
    println!();
    println!("Structure ({:?}):", inference.strategy);
    println!(
        "  warm-up {}, {} x {} stage(s), rest {}, cool-down {}",
        format_clock(s.warmup_seconds),
        s.round_count,
        s.stage_template.len(),
        format_clock(s.rest_seconds),
        format_clock(s.cooldown_seconds)
    );
    for (i, stage) in s.stage_template.iter().enumerate() {
        println!(
            "    stage {}: {} {:?} @ {} rpm, {:?}",
            i + 1,
            format_clock(stage.duration_seconds),
            stage.intensity,
            stage.target_cadence,
            stage.body_position
        );
    }

    Ok(())
}

fn cmd_build(ctx: &AppContext, title: &str, structure: StructureArgs) -> Result<()> {
    let structure = structure.apply(WorkoutStructure::default());
    let mut library = ctx.open_library()?;
    let program = library.create(title, expand(&structure)?, ctx.identity.as_ref())?;

    println!("✓ Created '{}'", program.name);
    println!("  id: {}", program.id);
    println!("  Total: {}", format_clock(program.total_time_seconds()));
    Ok(())
}

fn cmd_edit(
    ctx: &AppContext,
    id: &str,
    title: Option<String>,
    structure: StructureArgs,
) -> Result<()> {
    let mut library = ctx.open_library()?;
    let existing = library
        .get(id)
        .ok_or_else(|| Error::ProgramNotFound(id.to_string()))?
        .clone();

    let structure = structure.apply(analyze(existing.phases()));
    let title = title.unwrap_or(existing.name);
    let program = library.update(id, &title, expand(&structure)?)?;

    println!("✓ Updated '{}'", program.name);
    println!("  Total: {}", format_clock(program.total_time_seconds()));
    Ok(())
}

fn cmd_delete(ctx: &AppContext, id: &str) -> Result<()> {
    let mut library = ctx.open_library()?;
    library.delete(id)?;
    println!("✓ Deleted {}", id);
    Ok(())
}

fn cmd_publish(ctx: &AppContext, id: &str) -> Result<()> {
    let owner = ctx.require_identity()?;
    let mut library = ctx.open_library()?;
    let entry = library.publish(id, owner)?;
    println!("✓ Published '{}' as {}", entry.name, entry.id);
    Ok(())
}

fn cmd_unpublish(ctx: &AppContext, id: &str) -> Result<()> {
    let mut library = ctx.open_library()?;
    if library.unpublish(id)? {
        println!("✓ Unpublished {}", id);
    } else {
        println!("{} is not published.", id);
    }
    Ok(())
}

fn cmd_download(ctx: &AppContext, id: &str) -> Result<()> {
    let owner = ctx.require_identity()?;
    let mut library = ctx.open_library()?;
    let copy = library.download(id, owner)?;
    println!("✓ Downloaded '{}'", copy.name);
    println!("  id: {}", copy.id);
    Ok(())
}

// ============================================================================
// Playback
// ============================================================================

/// Cue emitter that writes to the terminal
///
/// Tones ring the bell (or print a marker on a virtual clock), speech is
/// printed. Write failures are ignored.
struct TerminalCues {
    bell: bool,
}

impl CueEmitter for TerminalCues {
    fn play_tone(&mut self, frequency_hz: f32, _waveform: Waveform, _duration_seconds: f32) {
        let mut out = io::stdout();
        let _ = if self.bell {
            write!(out, "\x07")
        } else {
            writeln!(out, "  ♪ {:.0} Hz", frequency_hz)
        };
        let _ = out.flush();
    }

    fn speak(&mut self, text: &str) {
        let _ = writeln!(io::stdout(), "  » {}", text);
    }
}

enum Outcome {
    Completed(u32),
    Aborted(AbortSummary),
}

fn cmd_run(
    ctx: &AppContext,
    id: &str,
    cue: Option<CueMode>,
    simulate: bool,
    stop_after: Option<u32>,
) -> Result<()> {
    let library = ctx.open_library()?;
    let program = ctx.find_program(&library, id)?;
    let mode = cue.unwrap_or(ctx.config.playback.cue_mode);
    let settings = ctx.config.cues.clone();

    println!(
        "\n▶ {}  ({})",
        program.name,
        format_clock(program.total_time_seconds())
    );

    let outcome = if simulate {
        let cues = TerminalCues { bell: false };
        let engine = PlaybackEngine::with_settings(
            &program,
            SimulatedScheduler::new(),
            cues,
            settings,
            mode,
        );
        run_simulated(engine, stop_after)
    } else {
        let cues = TerminalCues { bell: true };
        let engine =
            PlaybackEngine::with_settings(&program, SystemScheduler::new(), cues, settings, mode);
        run_interactive(engine)?
    };

    let elapsed = match outcome {
        Outcome::Completed(elapsed) => {
            println!("\n✓ Workout complete ({})", format_clock(elapsed));
            elapsed
        }
        Outcome::Aborted(summary) => {
            println!(
                "\nStopped after {} of {}",
                format_clock(summary.elapsed_seconds),
                format_clock(summary.total_seconds)
            );
            if !summary.should_record() {
                return Ok(());
            }
            summary.elapsed_seconds
        }
    };

    let mut recorder = ctx.history_recorder();
    match record_completion(&mut recorder, ctx.identity.as_ref(), &program, elapsed)? {
        Some(log) => println!("✓ Ride logged ({:?})", log.status),
        None => println!("Not signed in - ride not logged."),
    }

    Ok(())
}

fn run_simulated<E: CueEmitter>(
    mut engine: PlaybackEngine<'_, SimulatedScheduler, E>,
    stop_after: Option<u32>,
) -> Outcome {
    let stop_at_ms = stop_after.map(|s| u64::from(s) * 1000);

    announce_phase(&engine, 0);
    engine.start();

    loop {
        if let Some(stop) = stop_at_ms {
            if engine
                .scheduler()
                .next_fire_ms()
                .map_or(true, |at| at > stop)
            {
                return Outcome::Aborted(engine.abort());
            }
        }

        let Some(handle) = engine.scheduler_mut().fire_next() else {
            return Outcome::Aborted(engine.abort());
        };

        match engine.on_tick(handle) {
            Some(PlaybackEvent::PhaseChanged { index }) => announce_phase(&engine, index),
            Some(PlaybackEvent::Completed { elapsed_seconds }) => {
                return Outcome::Completed(elapsed_seconds)
            }
            None => {}
        }
    }
}

fn run_interactive<E: CueEmitter>(
    mut engine: PlaybackEngine<'_, SystemScheduler, E>,
) -> Result<Outcome> {
    let keys = spawn_key_reader();
    let mut input_closed = false;

    println!("Keys (then Enter): p pause/resume, n next, b back, r restart, c cue mode, q quit");
    announce_phase(&engine, 0);
    engine.start();

    loop {
        if input_closed && engine.state() == PlaybackState::Idle {
            return Ok(Outcome::Aborted(engine.abort()));
        }

        let timeout = engine
            .scheduler()
            .time_until_due()
            .unwrap_or(Duration::from_millis(250));

        let key = if input_closed {
            std::thread::sleep(timeout);
            None
        } else {
            match keys.recv_timeout(timeout) {
                Ok(key) => Some(key),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    input_closed = true;
                    None
                }
            }
        };

        if let Some(key) = key {
            let event = match key {
                'p' | ' ' => {
                    engine.toggle();
                    print_status(&engine);
                    None
                }
                'n' => engine.skip_forward(),
                'b' => engine.skip_backward(),
                'r' => {
                    engine.reset();
                    announce_phase(&engine, 0);
                    None
                }
                'c' => {
                    println!("Cues: {:?}", engine.cycle_cue_mode());
                    None
                }
                'q' => return Ok(Outcome::Aborted(engine.abort())),
                _ => None,
            };
            if let Some(outcome) = handle_event(&engine, event) {
                return Ok(outcome);
            }
        }

        if let Some(handle) = engine.scheduler_mut().take_due() {
            let event = engine.on_tick(handle);
            if event.is_none() && engine.state() == PlaybackState::Running {
                print_status(&engine);
            }
            if let Some(outcome) = handle_event(&engine, event) {
                return Ok(outcome);
            }
        }
    }
}

fn handle_event<S: Scheduler, E: CueEmitter>(
    engine: &PlaybackEngine<'_, S, E>,
    event: Option<PlaybackEvent>,
) -> Option<Outcome> {
    match event? {
        PlaybackEvent::PhaseChanged { index } => {
            announce_phase(engine, index);
            None
        }
        PlaybackEvent::Completed { elapsed_seconds } => Some(Outcome::Completed(elapsed_seconds)),
    }
}

/// Read stdin on a separate thread so ticks never wait on the keyboard
fn spawn_key_reader() -> Receiver<char> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let key = line.trim().chars().next().unwrap_or(' ');
            if tx.send(key.to_ascii_lowercase()).is_err() {
                break;
            }
        }
    });
    rx
}

fn announce_phase<S: Scheduler, E: CueEmitter>(engine: &PlaybackEngine<'_, S, E>, index: usize) {
    let session = engine.session();
    let phase = engine.current_phase();
    println!(
        "\n[{}/{}] {}  {}{}",
        index + 1,
        session.program().phase_count(),
        phase.label,
        format_clock(phase.duration_seconds),
        describe_targets(phase)
    );
    if let Some(next) = engine.next_phase() {
        println!("      next: {}", next.label);
    }
}

fn print_status<S: Scheduler, E: CueEmitter>(engine: &PlaybackEngine<'_, S, E>) {
    let session = engine.session();
    let paused = if session.running() { "" } else { "  (paused)" };
    print!(
        "\r  {} left  |  {:>3.0}% done{}   ",
        format_clock(session.seconds_remaining()),
        engine.progress() * 100.0,
        paused
    );
    let _ = io::stdout().flush();
}

// ============================================================================
// History commands
// ============================================================================

fn cmd_history(ctx: &AppContext) -> Result<()> {
    let Some(user) = &ctx.identity else {
        println!("Not signed in. Set [user] id in the config or pass --user.");
        return Ok(());
    };

    let logs = ctx.my_history()?;
    println!("\nHistory for {}", user.display_name);

    if logs.is_empty() {
        println!("  No rides yet.");
    }
    for log in &logs {
        println!(
            "  {}  {:<28} {:>8} / {:<8} {:?}",
            log.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            log.program_name,
            format_clock(log.duration_seconds),
            format_clock(log.target_duration_seconds),
            log.status
        );
    }

    let now = Local::now();
    println!("\nStreak: {} day(s)", current_streak(&logs, &now));

    let days = workout_days_in_month(&logs, &Local, now.year(), now.month());
    let days: Vec<String> = days.iter().map(u32::to_string).collect();
    println!(
        "Days ridden in {}: {}",
        now.format("%B %Y"),
        if days.is_empty() {
            "none".to_string()
        } else {
            days.join(", ")
        }
    );

    Ok(())
}

fn cmd_ranking(ctx: &AppContext) -> Result<()> {
    let ranking = leaderboard(&ctx.load_history()?);

    println!("\nLeaderboard");
    if ranking.is_empty() {
        println!("  No rides yet.");
    }
    for (i, entry) in ranking.iter().enumerate() {
        println!(
            "  {:>2}. {:<20} {:>4} rides {:>8.1} min",
            i + 1,
            entry.user_name,
            entry.total_workouts,
            entry.total_minutes
        );
    }
    Ok(())
}

fn cmd_rollup(ctx: &AppContext, cleanup: bool) -> Result<()> {
    if !ctx.paths.wal().exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = ctx.rollup()?;

    println!("✓ Rolled up {} rides to CSV", count);
    println!("  CSV: {}", ctx.paths.csv().display());

    if cleanup {
        let cleaned = ctx.cleanup_processed()?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

// ============================================================================
// Formatting and parsing
// ============================================================================

fn print_program_line(program: &Program) {
    println!(
        "  {:<38} {:<28} {:>8}",
        program.id,
        program.name,
        format_clock(program.total_time_seconds())
    );
}

fn describe_targets(phase: &Phase) -> String {
    let mut parts = Vec::new();
    if let Some(intensity) = phase.intensity {
        parts.push(format!("{:?}", intensity).to_lowercase());
    }
    if let Some(rpm) = phase.target_cadence {
        parts.push(format!("{} rpm", rpm));
    }
    if let Some(position) = phase.body_position {
        parts.push(format!("{:?}", position).to_lowercase());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("  ({})", parts.join(", "))
    }
}

fn format_clock(seconds: u32) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

fn parse_cue_mode(s: &str) -> std::result::Result<CueMode, String> {
    CueMode::parse(s).ok_or_else(|| format!("unknown cue mode '{}' (beep, voice, mute)", s))
}

fn parse_seconds(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    let (digits, scale) = match s.strip_suffix('m') {
        Some(minutes) => (minutes, 60),
        None => (s.strip_suffix('s').unwrap_or(s), 1),
    };
    let n = digits
        .parse::<u32>()
        .map_err(|_| format!("invalid duration '{}'", s))?;
    n.checked_mul(scale)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

fn parse_stage(s: &str) -> std::result::Result<Stage, String> {
    let mut parts = s.split(':');
    let mut stage = Stage::default();

    stage.duration_seconds = parse_seconds(parts.next().unwrap_or_default())?;
    if stage.duration_seconds == 0 {
        return Err("stage duration must be positive".into());
    }

    if let Some(intensity) = parts.next() {
        stage.intensity = match intensity.to_lowercase().as_str() {
            "light" => Intensity::Light,
            "moderate" => Intensity::Moderate,
            "heavy" => Intensity::Heavy,
            other => return Err(format!("unknown intensity '{}'", other)),
        };
    }

    if let Some(rpm) = parts.next() {
        stage.target_cadence = rpm
            .parse()
            .map_err(|_| format!("invalid cadence '{}'", rpm))?;
    }

    if let Some(position) = parts.next() {
        stage.body_position = match position.to_lowercase().as_str() {
            "seated" => BodyPosition::Seated,
            "standing" => BodyPosition::Standing,
            other => return Err(format!("unknown position '{}'", other)),
        };
    }

    if parts.next().is_some() {
        return Err(format!("too many fields in stage '{}'", s));
    }

    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage_fields() {
        let stage = parse_stage("45:heavy:60:standing").unwrap();
        assert_eq!(stage.duration_seconds, 45);
        assert_eq!(stage.intensity, Intensity::Heavy);
        assert_eq!(stage.target_cadence, 60);
        assert_eq!(stage.body_position, BodyPosition::Standing);

        let short = parse_stage("2m").unwrap();
        assert_eq!(short.duration_seconds, 120);
        assert_eq!(short.intensity, Intensity::Moderate);
        assert_eq!(short.target_cadence, 80);
    }

    #[test]
    fn test_parse_stage_rejects_bad_input() {
        assert!(parse_stage("0").is_err());
        assert!(parse_stage("30:extreme").is_err());
        assert!(parse_stage("30:light:fast").is_err());
        assert!(parse_stage("30:light:90:seated:extra").is_err());
        assert!(parse_stage("71582789m").is_err());
    }

    #[test]
    fn test_parse_seconds_overflow() {
        assert_eq!(parse_seconds("71582788m"), Ok(71582788 * 60));
        assert!(parse_seconds("71582789m").unwrap_err().contains("too large"));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(95), "1:35");
        assert_eq!(format_clock(3725), "1:02:05");
    }
}
