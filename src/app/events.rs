//! Outbound control-loop events and run summaries.
//!
//! The [`ControlLoop`](super::service::ControlLoop) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, forward them to a
//! notifier, or record them in a test.

use std::time::Duration;

use crate::control::dosing::DosingDecision;
use crate::drivers::pump::PumpId;
use crate::error::{PumpError, SensorError};

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// The loop is about to run its first tick.
    Started {
        tick_interval: Duration,
        max_iterations: Option<u64>,
    },

    /// A sample was read and buffered.
    SampleRecorded { loop_count: u64, od: f64 },

    /// The OD read failed; this tick has no sample.
    SensorFailed { loop_count: u64, error: SensorError },

    /// A dosing cycle chose its pumps.
    DosingCycle {
        loop_count: u64,
        elapsed: Duration,
        od: f64,
        decision: DosingDecision,
    },

    /// A dosing cycle was due but there was no reading to decide on.
    DosingSkipped { loop_count: u64 },

    /// A pump activation request was refused.
    PumpRejected { pump: PumpId, error: PumpError },

    /// A batch was handed to a background flush task.
    FlushDispatched { loop_count: u64, samples: usize },

    /// A flush window came due while the previous batch was still being
    /// written; the buffered samples wait for the next window.
    FlushDeferred { loop_count: u64, buffered: usize },

    /// The tick's work took longer than one interval.
    Overrun {
        loop_count: u64,
        work: Duration,
        tick: Duration,
    },

    /// The loop left its main cycle and finished shutdown.
    Stopped(LoopReport),
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured iteration bound was reached.
    Completed,
    /// A cooperative stop was requested.
    Cancelled,
}

/// Point-in-time loop state for external pollers (status queries,
/// notifiers).  Read-only from the outside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStatus {
    pub elapsed_loop_time: Duration,
    pub loop_count: u64,
    pub last_od: Option<f64>,
    pub buffered_samples: usize,
    pub dosing_cycles: u64,
    pub flushes: u64,
    pub overruns: u64,
}

/// Summary returned when the loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub reason: StopReason,
    pub loop_count: u64,
    pub elapsed_loop_time: Duration,
    pub samples_recorded: u64,
    pub sensor_failures: u64,
    pub dosing_cycles: u64,
    pub pump_rejections: u64,
    pub overruns: u64,
    /// Periodic flushes dispatched (the terminal flush is not counted).
    pub flushes: u64,
    /// Samples written by the terminal flush.
    pub final_flush_samples: usize,
    /// Pulses whose output could not be driven.
    pub actuation_failures: u64,
    /// Flush batches that failed to persist (periodic and terminal).
    pub persistence_failures: u64,
}
