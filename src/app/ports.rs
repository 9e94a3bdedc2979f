//! Port traits: the hexagonal boundary between the control loop and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (OD sensor, pump outputs, storage, clocks) implement
//! these traits.  The [`ControlLoop`](super::service::ControlLoop) consumes
//! them via generics or shared trait objects, so the domain core never
//! touches hardware directly and runs unchanged against test fakes.
//!
//! ## Threading
//!
//! [`ActuatorPort`], [`PersistenceSink`] and [`Clock`] are shared with
//! background pulse and flush tasks, so they take `&self` and must be
//! `Send + Sync`.  [`SensorPort`] and [`HostMetricsPort`] are only used
//! from the loop thread.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::buffer::Sample;
use crate::config::ControllerConfig;
use crate::error::{ActuationError, ConfigError, PersistenceError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one optical-density reading per call.
pub trait SensorPort {
    fn read_od(&mut self) -> Result<f64, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: drive a digital output active or inactive.
pub trait ActuatorPort: Send + Sync {
    fn set(&self, pin: u8, active: bool) -> Result<(), ActuationError>;

    /// Drive every known output inactive.  Called once on shutdown.
    fn release_all(&self) -> Result<(), ActuationError>;
}

// ───────────────────────────────────────────────────────────────
// Host metrics port
// ───────────────────────────────────────────────────────────────

/// Host utilisation recorded alongside each OD reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostMetrics {
    pub memory_percent: f32,
    /// One entry per logical core, in core order.
    pub cpu_percent: Vec<f32>,
}

pub trait HostMetricsPort {
    fn sample(&mut self) -> HostMetrics;
}

// ───────────────────────────────────────────────────────────────
// Persistence sink (driven adapter: domain → durable storage)
// ───────────────────────────────────────────────────────────────

/// Durable storage for flushed sample batches.
///
/// `batch` is in acquisition order.  Implementations must preserve the
/// row layout `(timestamp, od, memory_percent, cpu_percent)`.
pub trait PersistenceSink: Send + Sync {
    fn flush(&self, batch: &[Sample], flush_time: DateTime<Local>) -> Result<(), PersistenceError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`ControllerConfig::default()`] if no
    /// stored config exists.
    fn load(&self) -> Result<ControllerConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time, wall-clock timestamps, and the end-of-tick sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Local wall-clock time used for sample and flush timestamps.
    fn timestamp(&self) -> DateTime<Local>;

    fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The control loop emits structured [`LoopEvent`](super::events::LoopEvent)s
/// through this port.  Adapters decide where they go (log output,
/// a notifier, a test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::LoopEvent);
}
