#![forbid(unsafe_code)]

//! Core domain model and playback logic for the Cadence interval timer.
//!
//! This crate provides:
//! - Domain types (phases, programs, stages, workout logs)
//! - Structure analysis and program building
//! - Drift-corrected playback engine with injectable clock and cues
//! - Persistence (program library, history WAL, CSV archive)
//! - Streaks, leaderboard and calendar views over history

pub mod types;
pub mod error;
pub mod program;
pub mod analyzer;
pub mod builder;
pub mod presets;
pub mod cue;
pub mod scheduler;
pub mod engine;
pub mod config;
pub mod logging;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod stats;
pub mod library;
pub mod context;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use program::Program;
pub use analyzer::analyze;
pub use builder::build_program;
pub use presets::{find_preset, get_presets};
pub use cue::{CueEmitter, CueMode, CueSettings, Waveform};
pub use scheduler::{Scheduler, SimulatedScheduler, SystemScheduler, TickHandle};
pub use engine::{PlaybackEngine, PlaybackEvent, PlaybackState};
pub use config::Config;
pub use wal::{HistoryRecorder, JsonlHistory};
pub use history::{load_history, record_completion};
pub use library::ProgramLibrary;
pub use context::AppContext;
