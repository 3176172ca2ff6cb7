//! Configuration and parameters
//!
//! Constants and simulation / optimizer settings.

pub mod constants;
pub mod simulation_config;

pub use constants::*;
pub use simulation_config::*;
