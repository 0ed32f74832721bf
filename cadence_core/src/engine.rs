//! Playback engine: drift-corrected countdown over a program's phases.
//!
//! ## State machine
//!
//! ```text
//! Idle <-> Running -> Completed
//!   \________\______> Aborted (caller exit)
//! ```
//!
//! The engine arms one tick at a time through its `Scheduler`. Every tick
//! measures how late it fired against the expected wall-clock second and
//! shortens the next delay by that amount, so lateness never accumulates.
//! Any user action that changes position or run state cancels the armed tick
//! first and re-arms from the new state; ticks with a stale handle are dropped.

use crate::cue::{CueEmitter, CueMode, CueSettings};
use crate::scheduler::{Scheduler, TickHandle};
use crate::{Phase, Program};

/// Nominal tick period
pub const TICK_MS: u64 = 1000;

/// Run state of a playback session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl PlaybackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Aborted)
    }
}

/// Notifications for the engine's caller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A new phase became current
    PhaseChanged { index: usize },
    /// The last phase finished; emitted once per session
    Completed { elapsed_seconds: u32 },
}

/// Position within a program being played
#[derive(Clone, Debug)]
pub struct PlaybackSession<'p> {
    program: &'p Program,
    current_phase_index: usize,
    seconds_remaining: u32,
    running: bool,
    cue_mode: CueMode,
}

impl<'p> PlaybackSession<'p> {
    fn new(program: &'p Program, cue_mode: CueMode) -> Self {
        Self {
            program,
            current_phase_index: 0,
            seconds_remaining: program.phases()[0].duration_seconds,
            running: false,
            cue_mode,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn cue_mode(&self) -> CueMode {
        self.cue_mode
    }

    pub fn current_phase(&self) -> &'p Phase {
        &self.program.phases()[self.current_phase_index]
    }

    pub fn next_phase(&self) -> Option<&'p Phase> {
        self.program.phases().get(self.current_phase_index + 1)
    }

    /// Seconds played so far: finished phases plus the spent part of this one
    pub fn elapsed_seconds(&self) -> u32 {
        let finished: u32 = self.program.phases()[..self.current_phase_index]
            .iter()
            .map(|p| p.duration_seconds)
            .sum();
        let in_phase = self
            .current_phase()
            .duration_seconds
            .saturating_sub(self.seconds_remaining);
        finished + in_phase
    }

    /// Fraction of phases already finished, 0.0..=1.0
    pub fn progress(&self) -> f64 {
        self.current_phase_index as f64 / self.program.phase_count() as f64
    }

    fn jump_to(&mut self, index: usize) {
        self.current_phase_index = index;
        self.seconds_remaining = self.program.phases()[index].duration_seconds;
    }
}

/// Outcome of leaving a session before it completed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbortSummary {
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
}

impl AbortSummary {
    /// Partial records are kept only for rides longer than a second that stopped early
    pub fn should_record(&self) -> bool {
        self.elapsed_seconds > 1 && self.elapsed_seconds < self.total_seconds
    }
}

/// Drives one playback session
pub struct PlaybackEngine<'p, S: Scheduler, E: CueEmitter> {
    session: PlaybackSession<'p>,
    state: PlaybackState,
    scheduler: S,
    cues: E,
    settings: CueSettings,
    pending: Option<TickHandle>,
    expected_next_tick_ms: u64,
    last_countdown_cue: Option<(usize, u32)>,
}

impl<'p, S: Scheduler, E: CueEmitter> PlaybackEngine<'p, S, E> {
    /// Create an idle engine positioned at the first phase
    pub fn new(program: &'p Program, scheduler: S, cues: E) -> Self {
        Self::with_settings(program, scheduler, cues, CueSettings::default(), CueMode::default())
    }

    pub fn with_settings(
        program: &'p Program,
        scheduler: S,
        cues: E,
        settings: CueSettings,
        cue_mode: CueMode,
    ) -> Self {
        Self {
            session: PlaybackSession::new(program, cue_mode),
            state: PlaybackState::Idle,
            scheduler,
            cues,
            settings,
            pending: None,
            expected_next_tick_ms: 0,
            last_countdown_cue: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session(&self) -> &PlaybackSession<'p> {
        &self.session
    }

    pub fn current_phase(&self) -> &'p Phase {
        self.session.current_phase()
    }

    pub fn next_phase(&self) -> Option<&'p Phase> {
        self.session.next_phase()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn cues(&self) -> &E {
        &self.cues
    }

    /// Handle of the armed tick, if any
    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.pending
    }

    pub fn compute_elapsed_seconds(&self) -> u32 {
        self.session.elapsed_seconds()
    }

    /// Share of phases already finished
    pub fn progress(&self) -> f64 {
        self.session.progress()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Running; no-op otherwise
    pub fn start(&mut self) {
        if self.state != PlaybackState::Idle {
            return;
        }
        self.state = PlaybackState::Running;
        self.session.running = true;
        self.arm_from_now();
        self.cue_countdown();
        tracing::info!(
            "Playback running at phase {} with {}s left",
            self.session.current_phase_index,
            self.session.seconds_remaining
        );
    }

    pub fn resume(&mut self) {
        self.start()
    }

    /// Running -> Idle; the armed tick is cancelled before returning
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Running {
            return;
        }
        self.disarm();
        self.state = PlaybackState::Idle;
        self.session.running = false;
        tracing::info!(
            "Playback paused at phase {} with {}s left",
            self.session.current_phase_index,
            self.session.seconds_remaining
        );
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Idle => self.start(),
            PlaybackState::Running => self.pause(),
            PlaybackState::Completed | PlaybackState::Aborted => {}
        }
    }

    /// Handle a fired tick
    ///
    /// Ticks whose handle is not the one currently armed are ignored.
    pub fn on_tick(&mut self, handle: TickHandle) -> Option<PlaybackEvent> {
        if self.pending != Some(handle) {
            tracing::debug!("Dropping stale tick {}", handle.id());
            return None;
        }
        self.pending = None;

        if self.state != PlaybackState::Running {
            return None;
        }

        let now = self.scheduler.now_ms() as i64;
        let drift = now - self.expected_next_tick_ms as i64;
        self.expected_next_tick_ms += TICK_MS;

        let event = self.count_down();

        if self.state == PlaybackState::Running {
            let delay = (TICK_MS as i64 - drift).max(0) as u64;
            self.pending = Some(self.scheduler.schedule(delay));
        }

        event
    }

    /// Jump to the next phase, or finish if this is the last one
    ///
    /// Explicit seeks emit no cue.
    pub fn skip_forward(&mut self) -> Option<PlaybackEvent> {
        if self.state.is_terminal() {
            return None;
        }
        self.disarm();

        let next = self.session.current_phase_index + 1;
        if next >= self.session.program.phase_count() {
            self.session.seconds_remaining = 0;
            return Some(self.complete());
        }

        self.session.jump_to(next);
        self.last_countdown_cue = None;
        self.rearm_if_running();
        tracing::debug!("Skipped forward to phase {}", next);
        Some(PlaybackEvent::PhaseChanged { index: next })
    }

    /// Go back one phase, or restart the first phase
    pub fn skip_backward(&mut self) -> Option<PlaybackEvent> {
        if self.state.is_terminal() {
            return None;
        }
        self.disarm();

        let index = self.session.current_phase_index.saturating_sub(1);
        self.session.jump_to(index);
        self.last_countdown_cue = None;
        self.rearm_if_running();
        tracing::debug!("Skipped backward to phase {}", index);
        Some(PlaybackEvent::PhaseChanged { index })
    }

    /// Back to the start of the program, paused
    pub fn reset(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.disarm();
        self.session.jump_to(0);
        self.session.running = false;
        self.state = PlaybackState::Idle;
        self.last_countdown_cue = None;
    }

    /// Rotate beep -> voice -> mute and return the new mode
    pub fn cycle_cue_mode(&mut self) -> CueMode {
        self.session.cue_mode = self.session.cue_mode.next();
        tracing::debug!("Cue mode is now {:?}", self.session.cue_mode);
        self.session.cue_mode
    }

    pub fn set_cue_mode(&mut self, mode: CueMode) {
        self.session.cue_mode = mode;
    }

    /// Leave the session early
    ///
    /// The armed tick is cancelled and the session becomes terminal. The
    /// summary tells the caller whether a partial record is worth keeping.
    pub fn abort(&mut self) -> AbortSummary {
        self.disarm();
        let summary = AbortSummary {
            elapsed_seconds: self.compute_elapsed_seconds(),
            total_seconds: self.session.program.total_time_seconds(),
        };
        if !self.state.is_terminal() {
            self.state = PlaybackState::Aborted;
            self.session.running = false;
            tracing::info!(
                "Playback aborted after {}s of {}s",
                summary.elapsed_seconds,
                summary.total_seconds
            );
        }
        summary
    }

    // ── Internals ────────────────────────────────────────────────────

    /// One elapsed second of the current phase
    fn count_down(&mut self) -> Option<PlaybackEvent> {
        self.session.seconds_remaining = self.session.seconds_remaining.saturating_sub(1);
        let remaining = self.session.seconds_remaining;
        let index = self.session.current_phase_index;

        if remaining > 0 {
            self.cue_countdown();
            return None;
        }

        let next = index + 1;
        if next >= self.session.program.phase_count() {
            return Some(self.complete());
        }

        self.session.jump_to(next);
        self.last_countdown_cue = None;
        let phase = self.session.current_phase();
        self.settings
            .transition(self.session.cue_mode, &phase.label, &mut self.cues);
        tracing::debug!("Advanced to phase {} ({})", next, phase.label);
        // A phase shorter than the window starts inside it
        self.cue_countdown();
        Some(PlaybackEvent::PhaseChanged { index: next })
    }

    /// At most one countdown cue per (phase, second)
    fn cue_countdown(&mut self) {
        let remaining = self.session.seconds_remaining;
        let key = (self.session.current_phase_index, remaining);
        if remaining == 0
            || remaining > self.settings.countdown_window
            || self.last_countdown_cue == Some(key)
        {
            return;
        }
        self.last_countdown_cue = Some(key);
        self.settings
            .countdown(self.session.cue_mode, remaining, &mut self.cues);
    }

    fn complete(&mut self) -> PlaybackEvent {
        self.disarm();
        self.state = PlaybackState::Completed;
        self.session.running = false;
        let elapsed_seconds = self.compute_elapsed_seconds();
        tracing::info!(
            "Completed '{}' after {}s",
            self.session.program.name,
            elapsed_seconds
        );
        PlaybackEvent::Completed { elapsed_seconds }
    }

    fn arm_from_now(&mut self) {
        self.disarm();
        self.expected_next_tick_ms = self.scheduler.now_ms() + TICK_MS;
        self.pending = Some(self.scheduler.schedule(TICK_MS));
    }

    fn rearm_if_running(&mut self) {
        if self.state == PlaybackState::Running {
            self.arm_from_now();
        }
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }
}

impl<'p, S: Scheduler, E: CueEmitter> Drop for PlaybackEngine<'p, S, E> {
    fn drop(&mut self) {
        self.disarm();
    }
}
