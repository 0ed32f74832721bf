//! One-shot tick scheduling for the playback engine.
//!
//! A scheduler arms a single callback after a delay and hands back a handle
//! that can cancel it. The engine keeps at most one handle outstanding and
//! drops any tick whose handle it no longer holds.
//!
//! Two implementations:
//! - `SystemScheduler` runs on the monotonic wall clock; the caller's loop
//!   waits for `time_until_due()` and then collects the due handle
//! - `SimulatedScheduler` runs on a virtual clock with optional firing jitter

use std::time::{Duration, Instant};

/// Identifies one armed tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Schedule-one-tick-after-delay capability
pub trait Scheduler {
    /// Monotonic time in milliseconds
    fn now_ms(&self) -> u64;

    /// Arm a tick `delay_ms` from now, replacing any previously armed tick
    fn schedule(&mut self, delay_ms: u64) -> TickHandle;

    /// Disarm a tick; unknown or already-fired handles are ignored
    fn cancel(&mut self, handle: TickHandle);
}

// ============================================================================
// Wall clock
// ============================================================================

/// Scheduler backed by `std::time::Instant`
#[derive(Debug)]
pub struct SystemScheduler {
    origin: Instant,
    next_id: u64,
    pending: Option<(TickHandle, Instant)>,
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_id: 0,
            pending: None,
        }
    }

    /// Deadline of the armed tick, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, at)| at)
    }

    /// Time left before the armed tick is due (zero if overdue)
    pub fn time_until_due(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Remove and return the armed tick if its deadline has passed
    pub fn take_due(&mut self) -> Option<TickHandle> {
        match self.pending {
            Some((handle, at)) if at <= Instant::now() => {
                self.pending = None;
                Some(handle)
            }
            _ => None,
        }
    }

    /// Block the current thread until the armed tick is due and return it
    pub fn wait(&mut self) -> Option<TickHandle> {
        let (handle, at) = self.pending.take()?;
        let now = Instant::now();
        if at > now {
            std::thread::sleep(at - now);
        }
        Some(handle)
    }
}

impl Scheduler for SystemScheduler {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn schedule(&mut self, delay_ms: u64) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending = Some((handle, Instant::now() + Duration::from_millis(delay_ms)));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if matches!(self.pending, Some((h, _)) if h == handle) {
            self.pending = None;
        }
    }
}

// ============================================================================
// Virtual clock
// ============================================================================

/// Deterministic scheduler for tests and `--simulate` runs
///
/// Each firing lands at its requested deadline plus an offset drawn from the
/// jitter source, never earlier than the current virtual time.
pub struct SimulatedScheduler {
    now_ms: u64,
    next_id: u64,
    pending: Option<(TickHandle, u64)>,
    jitter: Box<dyn FnMut() -> i64>,
}

impl std::fmt::Debug for SimulatedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedScheduler")
            .field("now_ms", &self.now_ms)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Default for SimulatedScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScheduler {
    /// Scheduler that fires exactly on time
    pub fn new() -> Self {
        Self::with_jitter(|| 0)
    }

    /// Scheduler whose firings are offset by `jitter()` milliseconds
    pub fn with_jitter(jitter: impl FnMut() -> i64 + 'static) -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            pending: None,
            jitter: Box::new(jitter),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Virtual time at which the armed tick will fire
    pub fn next_fire_ms(&self) -> Option<u64> {
        self.pending.map(|(_, at)| at)
    }

    /// Jump to the armed tick's firing time and return its handle
    pub fn fire_next(&mut self) -> Option<TickHandle> {
        let (handle, at) = self.pending.take()?;
        self.now_ms = self.now_ms.max(at);
        Some(handle)
    }

    /// Move the clock forward; returns the armed tick if it became due
    pub fn advance_to(&mut self, ms: u64) -> Option<TickHandle> {
        self.now_ms = self.now_ms.max(ms);
        match self.pending {
            Some((handle, at)) if at <= self.now_ms => {
                self.pending = None;
                Some(handle)
            }
            _ => None,
        }
    }
}

impl Scheduler for SimulatedScheduler {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule(&mut self, delay_ms: u64) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        let target = (self.now_ms + delay_ms) as i64 + (self.jitter)();
        let at = target.max(self.now_ms as i64) as u64;
        self.pending = Some((handle, at));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if matches!(self.pending, Some((h, _)) if h == handle) {
            self.pending = None;
        }
    }
}
