use bevy::prelude::*;

use crate::config::constants::{
    DEFAULT_CELL_SIZE, DEFAULT_GRID_RESOLUTION, DEFAULT_TARGET_FRAME, FLIP_BLEND, MAX_VELOCITY,
};
use crate::core::BoundaryHandling;
use crate::error::{MpmError, MpmResult};
use crate::math::Real;

/// Execution domain for the step pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransferScheme {
    /// Moving least squares affine transfer (MLS-APIC).
    #[default]
    Mls,
    /// Velocity increment transfer blended with PIC.
    Flip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IntegrationScheme {
    #[default]
    Explicit,
    /// Declared for configuration compatibility; no solver is wired in.
    Implicit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GridBackendType {
    #[default]
    Dense,
    Sparse,
}

/// What happens to a particle whose stencil leaves the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DomainPolicy {
    /// Fail the step with `MpmError::DomainViolation`.
    Reject,
    /// Pull the particle back inside the admissible box and log a warning.
    #[default]
    Clamp,
}

/// Engine settings, fixed for a run. Changing them requires `Engine::reset`.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Shrink the caller's dt to the CFL bound `CFL_NUMBER * dx / max|v|`.
    pub use_cfl_timestep: bool,
    pub transfer_scheme: TransferScheme,
    pub integration_scheme: IntegrationScheme,
    pub grid_backend: GridBackendType,
    pub grid_resolution: UVec3,
    pub grid_cell_size: Real,
    /// Advisory, read by drivers to know when to stop stepping.
    pub target_frame: u32,
    pub device: Device,
    pub domain_policy: DomainPolicy,
    pub boundary: BoundaryHandling,
    /// FLIP weight in the FLIP/PIC blend (ignored by MLS).
    pub flip_blend: Real,
    pub max_velocity: Real,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_cfl_timestep: false,
            transfer_scheme: TransferScheme::Mls,
            integration_scheme: IntegrationScheme::Explicit,
            grid_backend: GridBackendType::Dense,
            grid_resolution: UVec3::splat(DEFAULT_GRID_RESOLUTION),
            grid_cell_size: DEFAULT_CELL_SIZE,
            target_frame: DEFAULT_TARGET_FRAME,
            device: Device::Cpu,
            domain_policy: DomainPolicy::Clamp,
            boundary: BoundaryHandling::Slip,
            flip_blend: FLIP_BLEND,
            max_velocity: MAX_VELOCITY,
        }
    }
}

impl EngineConfig {
    pub fn with_resolution(mut self, resolution: UVec3, cell_size: Real) -> Self {
        self.grid_resolution = resolution;
        self.grid_cell_size = cell_size;
        self
    }

    pub fn with_transfer_scheme(mut self, scheme: TransferScheme) -> Self {
        self.transfer_scheme = scheme;
        self
    }

    pub fn with_integration_scheme(mut self, scheme: IntegrationScheme) -> Self {
        self.integration_scheme = scheme;
        self
    }

    pub fn with_grid_backend(mut self, backend: GridBackendType) -> Self {
        self.grid_backend = backend;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_cfl_timestep(mut self, enabled: bool) -> Self {
        self.use_cfl_timestep = enabled;
        self
    }

    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.domain_policy = policy;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryHandling) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_target_frame(mut self, target_frame: u32) -> Self {
        self.target_frame = target_frame;
        self
    }

    /// Set the FLIP weight (clamped to 0.0..=1.0).
    pub fn with_flip_blend(mut self, blend: Real) -> Self {
        self.flip_blend = blend.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_velocity(mut self, max_velocity: Real) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn node_count(&self) -> usize {
        self.grid_resolution.x as usize
            * self.grid_resolution.y as usize
            * self.grid_resolution.z as usize
    }

    pub fn validate(&self) -> MpmResult<()> {
        let res = self.grid_resolution;
        if res.x == 0 || res.y == 0 || res.z == 0 {
            return Err(MpmError::Configuration(format!(
                "grid resolution must be positive, got {res}"
            )));
        }
        // A quadratic stencil needs three nodes per axis.
        if res.min_element() < 3 {
            return Err(MpmError::Configuration(format!(
                "grid resolution {res} is too small for a 3x3x3 stencil"
            )));
        }
        if !self.grid_cell_size.is_finite() || self.grid_cell_size <= 0.0 {
            return Err(MpmError::Configuration(format!(
                "grid cell size must be positive, got {}",
                self.grid_cell_size
            )));
        }
        if self.target_frame == 0 {
            return Err(MpmError::Configuration(
                "target frame must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.flip_blend) {
            return Err(MpmError::Configuration(format!(
                "flip blend must lie in [0, 1], got {}",
                self.flip_blend
            )));
        }
        if !self.max_velocity.is_finite() || self.max_velocity <= 0.0 {
            return Err(MpmError::Configuration(format!(
                "max velocity must be positive, got {}",
                self.max_velocity
            )));
        }
        if self.integration_scheme == IntegrationScheme::Implicit {
            return Err(MpmError::Configuration(
                "implicit integration is not supported, use IntegrationScheme::Explicit"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_grid() {
        let config = EngineConfig::default().with_resolution(UVec3::new(16, 0, 16), 0.1);
        assert!(matches!(
            config.validate(),
            Err(MpmError::Configuration(_))
        ));

        let config = EngineConfig::default().with_resolution(UVec3::splat(16), -1.0);
        assert!(matches!(
            config.validate(),
            Err(MpmError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_implicit_integration() {
        let config = EngineConfig::default().with_integration_scheme(IntegrationScheme::Implicit);
        assert!(config.validate().is_err());
    }

    #[test]
    fn flip_blend_is_clamped() {
        let config = EngineConfig::default().with_flip_blend(3.0);
        assert_eq!(config.flip_blend, 1.0);
    }
}
