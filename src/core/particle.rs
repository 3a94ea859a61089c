//! Material particles for MPM simulation
//!
//! Particles carry position, velocity, mass, deformation state and a material tag.

use crate::materials::{MaterialState, MaterialType};
use crate::materials::check;
use crate::math::{
    Matrix, Real, Vector, identity_matrix, matrix_is_finite, zero_matrix, zero_vector,
};

/// One material point in array-of-structures form, as handed over by scene setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vector,
    pub velocity: Vector,
    pub mass: Real,
    pub volume0: Real,
    pub deformation_gradient: Matrix,
    pub volume_ratio: Real,
    pub affine_momentum_matrix: Matrix, // MLS affine velocity field (C matrix)
    pub material_type: MaterialType,
}

impl Particle {
    pub fn zeroed(material_type: MaterialType) -> Self {
        Self {
            position: zero_vector(),
            velocity: zero_vector(),
            mass: 1.0,
            volume0: 1.0,
            deformation_gradient: identity_matrix(),
            volume_ratio: 1.0,
            affine_momentum_matrix: zero_matrix(),
            material_type,
        }
    }

    pub fn new(position: Vector, material_type: MaterialType) -> Self {
        Self {
            position,
            ..Self::zeroed(material_type)
        }
    }

    pub fn with_velocity(mut self, velocity: Vector) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: Real) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_volume(mut self, volume0: Real) -> Self {
        self.volume0 = volume0;
        self
    }

    /// Set volume and derive mass from a rest density.
    pub fn with_density(mut self, volume0: Real, density: Real) -> Self {
        self.volume0 = volume0;
        self.mass = volume0 * density;
        self
    }

    #[inline(always)]
    pub fn rest_density(&self) -> Real {
        if self.volume0 > 0.0 {
            self.mass / self.volume0
        } else {
            0.0
        }
    }

    #[inline(always)]
    pub fn material_state(&self) -> MaterialState {
        MaterialState {
            deformation_gradient: self.deformation_gradient,
            volume_ratio: self.volume_ratio,
            velocity_gradient: self.affine_momentum_matrix,
        }
    }

    #[inline(always)]
    pub fn momentum(&self) -> Vector {
        self.velocity * self.mass
    }

    /// Check the particle invariants; the error names the first broken one.
    pub fn validate(&self) -> Result<(), String> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(format!("mass must be positive, got {}", self.mass));
        }
        if !self.volume0.is_finite() || self.volume0 <= 0.0 {
            return Err(format!("initial volume must be positive, got {}", self.volume0));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err("position and velocity must be finite".to_string());
        }
        if !check::deformation_gradient_ok(&self.deformation_gradient) {
            return Err("deformation gradient must be finite with det(F) > 0".to_string());
        }
        if !matrix_is_finite(&self.affine_momentum_matrix) || !self.volume_ratio.is_finite() {
            return Err("affine matrix and volume ratio must be finite".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3;

    #[test]
    fn builder_sets_fields() {
        let particle = Particle::new(Vec3::new(0.5, 0.5, 0.5), MaterialType::Water)
            .with_velocity(Vec3::X)
            .with_density(0.001, 1000.0);
        assert_eq!(particle.material_type, MaterialType::Water);
        assert!((particle.mass - 1.0).abs() < 1e-6);
        assert!((particle.rest_density() - 1000.0).abs() < 1e-3);
        assert_eq!(particle.momentum(), Vec3::X * particle.mass);
        assert!(particle.validate().is_ok());
    }

    #[test]
    fn invalid_particles_are_reported() {
        let zero_mass = Particle::zeroed(MaterialType::Sand).with_mass(0.0);
        assert!(zero_mass.validate().is_err());

        let zero_volume = Particle::zeroed(MaterialType::Sand).with_volume(0.0);
        assert!(zero_volume.validate().is_err());

        let mut flipped = Particle::zeroed(MaterialType::Elastic);
        flipped.deformation_gradient = -identity_matrix();
        assert!(flipped.validate().is_err());
    }
}
