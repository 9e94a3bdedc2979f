//! Simulated bioreactor for development hosts.
//!
//! [`SimulatedPin`] is an in-memory `OutputPin`, so the binary drives the
//! same [`GpioActuator`](super::gpio::GpioActuator) it would on a Pi.
//! [`SimulatedCulture`] stands in for the photodetector ADC: OD follows
//! logistic growth, and while the drug or nutrient line is high the
//! culture is diluted (and, for drug, killed back) a little per read.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, OutputPin};
use log::debug;

use crate::app::ports::SensorPort;
use crate::error::SensorError;

/// Read-only view of a [`SimulatedPin`]'s level.
#[derive(Debug, Clone)]
pub struct PinProbe(Arc<AtomicBool>);

impl PinProbe {
    pub fn is_high(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct SimulatedPin {
    label: &'static str,
    level: Arc<AtomicBool>,
}

impl SimulatedPin {
    pub fn new(label: &'static str) -> (Self, PinProbe) {
        let level = Arc::new(AtomicBool::new(false));
        let probe = PinProbe(Arc::clone(&level));
        (Self { label, level }, probe)
    }
}

impl ErrorType for SimulatedPin {
    type Error = Infallible;
}

impl OutputPin for SimulatedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("SIM | {} low", self.label);
        self.level.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("SIM | {} high", self.label);
        self.level.store(true, Ordering::Release);
        Ok(())
    }
}

/// Logistic-growth culture read in raw ADC counts.
pub struct SimulatedCulture {
    od: f64,
    capacity: f64,
    /// Growth per read at low density.
    growth_rate: f64,
    drug: PinProbe,
    nutrient: PinProbe,
}

impl SimulatedCulture {
    pub fn new(initial_od: f64, drug: PinProbe, nutrient: PinProbe) -> Self {
        Self {
            od: initial_od,
            capacity: 2000.0,
            growth_rate: 0.002,
            drug,
            nutrient,
        }
    }
}

impl SensorPort for SimulatedCulture {
    fn read_od(&mut self) -> Result<f64, SensorError> {
        self.od += self.growth_rate * self.od * (1.0 - self.od / self.capacity);
        if self.nutrient.is_high() {
            self.od *= 0.99;
        }
        if self.drug.is_high() {
            self.od *= 0.97;
        }
        if !self.od.is_finite() {
            return Err(SensorError::InvalidReading);
        }
        Ok(self.od.round())
    }
}
