//! Material types for simulation

use crate::materials::families::MaterialTable;
use crate::materials::fluids::water::Water;
use crate::materials::granular::sand::Sand;
use crate::materials::solids::elastic::FixedCorotated;
use crate::materials::solids::snow::Snow;
use crate::math::{Matrix, Real, identity_matrix, zero_matrix};

/// Deformation state a constitutive model reads and projects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialState {
    pub deformation_gradient: Matrix,
    /// Volume ratio. Its meaning depends on the material (plastic J for snow).
    pub volume_ratio: Real,
    pub velocity_gradient: Matrix,
}

impl MaterialState {
    pub fn rest() -> Self {
        Self {
            deformation_gradient: identity_matrix(),
            volume_ratio: 1.0,
            velocity_gradient: zero_matrix(),
        }
    }
}

/// A constitutive model: a stress response and a plastic projection.
pub trait ConstitutiveModel {
    type Params;

    /// Kirchhoff stress `tau = P F^T`.
    fn kirchhoff_stress(params: &Self::Params, state: &MaterialState) -> Matrix;

    /// Pull `F` back into the admissible region and update the volume ratio.
    fn project(params: &Self::Params, state: MaterialState) -> MaterialState;
}

/// Immutable per-particle material tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MaterialType {
    #[default]
    Elastic = 0,
    Snow = 1,
    Sand = 2,
    Water = 3,
}

impl MaterialType {
    pub const ALL: [MaterialType; 4] = [
        MaterialType::Elastic,
        MaterialType::Snow,
        MaterialType::Sand,
        MaterialType::Water,
    ];

    pub fn material_name(self) -> &'static str {
        match self {
            Self::Elastic => "elastic",
            Self::Snow => "snow",
            Self::Sand => "sand",
            Self::Water => "water",
        }
    }

    #[inline]
    pub fn stress(self, table: &MaterialTable, state: &MaterialState) -> Matrix {
        match self {
            Self::Elastic => FixedCorotated::kirchhoff_stress(&table.elastic, state),
            Self::Snow => Snow::kirchhoff_stress(&table.snow, state),
            Self::Sand => Sand::kirchhoff_stress(&table.sand, state),
            Self::Water => Water::kirchhoff_stress(&table.fluid, state),
        }
    }

    #[inline]
    pub fn project(self, table: &MaterialTable, state: MaterialState) -> MaterialState {
        match self {
            Self::Elastic => FixedCorotated::project(&table.elastic, state),
            Self::Snow => Snow::project(&table.snow, state),
            Self::Sand => Sand::project(&table.sand, state),
            Self::Water => Water::project(&table.fluid, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{matrix_determinant, matrix_norm};
    use bevy::math::{Mat3, Vec3};

    #[test]
    fn rest_state_is_stress_free() {
        let table = MaterialTable::default();
        for material in MaterialType::ALL {
            let stress = material.stress(&table, &MaterialState::rest());
            assert!(
                matrix_norm(&stress) < 1e-3,
                "{} has stress {:?} at rest",
                material.material_name(),
                stress
            );
        }
    }

    #[test]
    fn projection_keeps_positive_determinant() {
        let table = MaterialTable::default();
        let deformed = Mat3::from_cols(
            Vec3::new(1.3, 0.1, 0.0),
            Vec3::new(0.0, 0.7, 0.05),
            Vec3::new(0.02, 0.0, 0.9),
        );
        for material in MaterialType::ALL {
            let state = MaterialState {
                deformation_gradient: deformed,
                ..MaterialState::rest()
            };
            let projected = material.project(&table, state);
            assert!(
                matrix_determinant(&projected.deformation_gradient) > 0.0,
                "{} lost det F > 0",
                material.material_name()
            );
            assert!(projected.volume_ratio > 0.0);
        }
    }

    #[test]
    fn compression_pushes_back() {
        let table = MaterialTable::default();
        let state = MaterialState {
            deformation_gradient: Mat3::from_diagonal(Vec3::splat(0.9)),
            volume_ratio: 0.729,
            ..MaterialState::rest()
        };
        for material in [MaterialType::Elastic, MaterialType::Water] {
            let stress = material.stress(&table, &state);
            // Compressed material has negative (pressure-like) Kirchhoff trace.
            assert!(stress.x_axis.x < 0.0, "{}", material.material_name());
        }
    }
}
