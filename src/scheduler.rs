//! Loop timing: nominal clock, periodic trigger windows, and cadence.
//!
//! The control loop never derives its notion of "elapsed time" from the
//! wall clock.  [`LoopClock`] counts ticks and reports
//! `loop_count * tick_interval` in integer milliseconds, so a run of
//! any length accumulates no floating-point drift.  Periodic work is
//! gated by [`PeriodicTrigger`]:
//!
//! ```text
//!   elapsed_ms:   0     2000   4000  ...  10000  12000 ...
//!   pump (10 s):  FIRE  -      -          FIRE   -
//!   flush (20 s): -     -      -          -      -        FIRE @ 20000
//! ```
//!
//! A trigger is due when `elapsed_ms % period_ms < tick_ms`, i.e. the tick
//! lands within one interval of a period boundary.  When the period is
//! not an exact multiple of the tick this still fires exactly once per
//! period, on the first tick at or after the boundary.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
//  Loop clock
// ═══════════════════════════════════════════════════════════════

/// Nominal loop time.  Advances by exactly one tick per iteration and is
/// only ever reset by constructing a new clock at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopClock {
    tick_ms: u64,
    loop_count: u64,
}

impl LoopClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick_ms: tick.as_millis() as u64,
            loop_count: 0,
        }
    }

    /// Nominal milliseconds since start.
    pub fn elapsed_ms(&self) -> u64 {
        self.loop_count * self.tick_ms
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms())
    }

    /// Iterations completed so far.
    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Close out one iteration.
    pub fn advance(&mut self) {
        self.loop_count += 1;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Periodic trigger
// ═══════════════════════════════════════════════════════════════

/// "Within one tick of a period boundary" gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTrigger {
    period_ms: u64,
    /// Whether the boundary at elapsed 0 counts.
    fire_at_start: bool,
}

impl PeriodicTrigger {
    /// Trigger that also fires on the very first tick.
    pub fn new(period: Duration) -> Self {
        Self {
            period_ms: (period.as_millis() as u64).max(1),
            fire_at_start: true,
        }
    }

    /// Trigger whose first window is one full period after start.
    pub fn skipping_start(period: Duration) -> Self {
        Self {
            fire_at_start: false,
            ..Self::new(period)
        }
    }

    /// Whether this trigger fires on a tick starting at `elapsed_ms`.
    pub fn is_due(&self, elapsed_ms: u64, tick_ms: u64) -> bool {
        if elapsed_ms == 0 && !self.fire_at_start {
            return false;
        }
        elapsed_ms % self.period_ms < tick_ms
    }

    /// Convenience wrapper over [`is_due`](Self::is_due) for a [`LoopClock`].
    pub fn is_due_at(&self, clock: &LoopClock) -> bool {
        self.is_due(clock.elapsed_ms(), clock.tick_ms())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// What the loop should do after the work portion of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Work finished early: sleep for the remainder.
    Sleep(Duration),
    /// Work took longer than one tick: do not sleep at all.
    Overrun { excess: Duration },
}

impl Cadence {
    /// Compute the end-of-tick action from the measured work time.
    pub fn after(tick: Duration, work: Duration) -> Self {
        if work > tick {
            Self::Overrun {
                excess: work - tick,
            }
        } else {
            Self::Sleep(tick - work)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
