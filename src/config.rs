//! Controller configuration parameters
//!
//! All tunable parameters for the turbidostat.  Supplied once at startup
//! (JSON file via [`ConfigPort`](crate::app::ports::ConfigPort), CLI
//! overrides) and immutable for the rest of the run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::pump::PumpId;
use crate::error::ConfigError;
use crate::pins;

/// One pump's wiring and pulse length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Output pin (BCM numbering).
    pub pin: u8,
    /// How long the output is held active per activation, in seconds.
    pub activation_secs: f32,
}

impl PumpConfig {
    /// Pulse length.  Zero for values [`ControllerConfig::validate`] rejects.
    pub fn activation(&self) -> Duration {
        Duration::try_from_secs_f32(self.activation_secs).unwrap_or(Duration::ZERO)
    }
}

/// The three pumps of the culture vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpTable {
    pub drug: PumpConfig,
    pub nutrient: PumpConfig,
    pub waste: PumpConfig,
}

impl PumpTable {
    pub fn get(&self, pump: PumpId) -> &PumpConfig {
        match pump {
            PumpId::Drug => &self.drug,
            PumpId::Nutrient => &self.nutrient,
            PumpId::Waste => &self.waste,
        }
    }
}

impl Default for PumpTable {
    fn default() -> Self {
        Self {
            drug: PumpConfig {
                pin: pins::DRUG_PUMP_GPIO,
                activation_secs: 2.5,
            },
            nutrient: PumpConfig {
                pin: pins::NUTRIENT_PUMP_GPIO,
                activation_secs: 2.5,
            },
            waste: PumpConfig {
                pin: pins::WASTE_PUMP_GPIO,
                activation_secs: 2.5,
            },
        }
    }
}

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Timing ---
    /// Time between OD samples (milliseconds)
    pub tick_interval_ms: u64,
    /// Time between dosing cycles (seconds)
    pub pump_period_secs: u64,
    /// Time between persistence flushes (seconds)
    pub flush_period_secs: u64,
    /// Number of ticks to run; `None` runs until cancelled
    pub max_iterations: Option<u64>,

    // --- Dosing ---
    /// OD above which the drug pump is chosen
    pub od_threshold: f64,
    /// Additionally require OD growth since the previous reading before
    /// choosing drug
    pub require_growth: bool,
    /// Pump wiring and pulse lengths
    pub pumps: PumpTable,

    // --- Persistence ---
    /// Directory flush files are written into
    pub data_dir: PathBuf,
    /// Put a failed flush batch back into the buffer instead of dropping it
    pub requeue_failed_flushes: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_interval_ms: 2000,  // one OD sample every 2 s
            pump_period_secs: 300,   // dose every 5 min
            flush_period_secs: 1800, // write out every 30 min
            max_iterations: Some(5400),

            // Dosing (bring-up threshold: every cycle takes the drug branch)
            od_threshold: -1000.0,
            require_growth: false,
            pumps: PumpTable::default(),

            // Persistence
            data_dir: PathBuf::from("data"),
            requeue_failed_flushes: false,
        }
    }
}

impl ControllerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn pump_period(&self) -> Duration {
        Duration::from_secs(self.pump_period_secs)
    }

    pub fn flush_period(&self) -> Duration {
        Duration::from_secs(self.flush_period_secs)
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        if self.pump_period_secs.saturating_mul(1000) < self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "pump_period_secs must be at least one tick interval",
            ));
        }
        if self.flush_period_secs.saturating_mul(1000) < self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "flush_period_secs must be at least one tick interval",
            ));
        }
        if !self.od_threshold.is_finite() {
            return Err(ConfigError::ValidationFailed("od_threshold must be finite"));
        }
        for pump in PumpId::ALL {
            let secs = self.pumps.get(pump).activation_secs;
            if secs <= 0.0 || Duration::try_from_secs_f32(secs).is_err() {
                return Err(ConfigError::ValidationFailed(
                    "pump activation_secs must be > 0 and representable as a duration",
                ));
            }
        }
        let p = &self.pumps;
        if p.drug.pin == p.nutrient.pin || p.drug.pin == p.waste.pin || p.nutrient.pin == p.waste.pin {
            return Err(ConfigError::ValidationFailed("pump pins must be distinct"));
        }
        Ok(())
    }
}
