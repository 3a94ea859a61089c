//! Error types for the MPM engine.
//!
//! Every fallible engine operation returns `MpmResult<T>`.

use thiserror::Error;

use crate::math::{Real, Vector};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MpmError {
    /// Engine configuration is invalid (non-positive resolution, bad cell size, ...).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A particle left the grid's interpolation support.
    #[error("Particle {index} at {position} is outside the grid interpolation support")]
    DomainViolation { index: usize, position: Vector },

    /// Deformation or velocity state could not be recovered by projection.
    #[error("Numerical instability at particle {index}: {reason}")]
    NumericalInstability { index: usize, reason: String },

    /// Device allocation failed. No device buffer was kept.
    #[error("Device resource error: {0}")]
    Resource(String),

    /// A particle handed to the engine violates the particle invariants.
    #[error("Invalid particle {index}: {reason}")]
    InvalidParticle { index: usize, reason: String },

    #[error("Invalid timestep {0}: must be finite and non-negative")]
    InvalidTimestep(Real),
}

/// Convenience alias for `Result<T, MpmError>`.
pub type MpmResult<T> = Result<T, MpmError>;
