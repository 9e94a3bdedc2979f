//! GPIO actuator adapter.
//!
//! Drives pump outputs through any [`embedded_hal::digital::OutputPin`]
//! implementation (rppal, linux-embedded-hal, a test double).  Outputs
//! are active-high: `set(pin, true)` drives the pin high.
//!
//! Each pin sits behind its own mutex so pulse tasks for different pumps
//! never contend with each other.

use std::sync::{Mutex, PoisonError};

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::ActuatorPort;
use crate::error::ActuationError;

pub struct GpioActuator<P> {
    outputs: Vec<(u8, Mutex<P>)>,
}

impl<P: OutputPin + Send> GpioActuator<P> {
    /// Register outputs by pin number and drive them all low.
    pub fn new(pins: impl IntoIterator<Item = (u8, P)>) -> Result<Self, ActuationError> {
        let adapter = Self {
            outputs: pins.into_iter().map(|(n, p)| (n, Mutex::new(p))).collect(),
        };
        adapter.release_all()?;
        info!("GPIO: {} outputs initialised low", adapter.outputs.len());
        Ok(adapter)
    }

    fn output(&self, pin: u8) -> Result<&Mutex<P>, ActuationError> {
        self.outputs
            .iter()
            .find(|(n, _)| *n == pin)
            .map(|(_, p)| p)
            .ok_or(ActuationError::UnknownPin(pin))
    }
}

impl<P: OutputPin + Send> ActuatorPort for GpioActuator<P> {
    fn set(&self, pin: u8, active: bool) -> Result<(), ActuationError> {
        let mut output = self.output(pin)?.lock().unwrap_or_else(PoisonError::into_inner);
        let result = if active {
            output.set_high()
        } else {
            output.set_low()
        };
        result.map_err(|e| {
            warn!("GPIO {}: write failed ({:?})", pin, embedded_hal::digital::Error::kind(&e));
            ActuationError::GpioWriteFailed(pin)
        })
    }

    fn release_all(&self) -> Result<(), ActuationError> {
        let mut first_error = None;
        for (pin, _) in &self.outputs {
            if let Err(e) = self.set(*pin, false) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
