//! Application core: the control loop and its boundary.
//!
//! The sampling, dosing and flushing rules live in [`service`].  All
//! interaction with the sensor, the pump outputs and storage happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
