//! Control policies.
//!
//! Pure decision logic: no hardware, no buffers, no clocks.

pub mod dosing;
