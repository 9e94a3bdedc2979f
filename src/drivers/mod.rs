//! Actuator drivers and the background task set they run on.

pub mod pump;
pub mod tasks;
