//! Unified error types for the turbidostat controller.
//!
//! Every subsystem has its own small error enum.  None of the per-tick
//! errors is fatal to the control loop: the loop logs them and keeps its
//! cadence.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC conversion failed or the bus reported an error.
    AdcReadFailed,
    /// The converter did not answer in time.
    Timeout,
    /// Reading is not a finite number.
    InvalidReading,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::Timeout => write!(f, "ADC read timed out"),
            Self::InvalidReading => write!(f, "reading is not finite"),
        }
    }
}

impl std::error::Error for SensorError {}

// ---------------------------------------------------------------------------
// Actuation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationError {
    /// No output is registered under this pin number.
    UnknownPin(u8),
    /// Driving the output failed.
    GpioWriteFailed(u8),
}

impl fmt::Display for ActuationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPin(pin) => write!(f, "no output registered for pin {pin}"),
            Self::GpioWriteFailed(pin) => write!(f, "GPIO write failed on pin {pin}"),
        }
    }
}

impl std::error::Error for ActuationError {}

// ---------------------------------------------------------------------------
// Pump controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpError {
    /// The pump already has a running and a queued activation.
    Busy,
    /// The OS refused to start the pulse thread.
    SpawnFailed,
}

impl fmt::Display for PumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "pump busy (activation queue full)"),
            Self::SpawnFailed => write!(f, "could not spawn pulse task"),
        }
    }
}

impl std::error::Error for PumpError {}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Filesystem error (disk full, permission denied, ...).
    Io(io::ErrorKind),
    /// A row could not be encoded.
    Encode(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
            Self::Encode(msg) => write!(f, "encode error: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<io::Error> for PersistenceError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl From<csv::Error> for PersistenceError {
    fn from(e: csv::Error) -> Self {
        match e.kind() {
            csv::ErrorKind::Io(io) => Self::Io(io.kind()),
            _ => Self::Encode(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config file exists but could not be parsed.
    Corrupted(String),
    /// Generic I/O error from the config file.
    Io(io::ErrorKind),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {msg}"),
            Self::Io(kind) => write!(f, "I/O error: {kind}"),
        }
    }
}

impl std::error::Error for ConfigError {}
