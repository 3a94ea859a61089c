//! Configuration and parameters
//!
//! Constants and engine settings.

pub mod constants;
pub mod engine_config;

pub use constants::*;
pub use engine_config::*;
