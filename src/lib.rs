//! Turbidostat controller library.
//!
//! Holds a bioreactor culture near a target optical density: the control
//! loop samples OD on a fixed cadence, doses drug or nutrient (always with
//! waste) once per pump period, and flushes buffered samples to disk once
//! per flush period.  Hardware access goes through the port traits in
//! [`app::ports`]; [`adapters`] provides GPIO, CSV, simulation and
//! host-metrics implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod buffer;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod scheduler;
