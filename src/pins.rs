//! Default pump output assignments (BCM numbering on the Raspberry Pi header).
//!
//! These feed [`ControllerConfig::default`](crate::config::ControllerConfig);
//! a deployment with different wiring overrides them in the config file.

/// Drug solution pump.
pub const DRUG_PUMP_GPIO: u8 = 20;
/// Nutrient solution pump.
pub const NUTRIENT_PUMP_GPIO: u8 = 21;
/// Waste (efflux) pump.
pub const WASTE_PUMP_GPIO: u8 = 16;
