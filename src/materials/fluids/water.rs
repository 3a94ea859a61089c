//! Water fluid material
//!
//! Weakly compressible equation of state plus a viscous term.

use crate::materials::families::FluidParams;
use crate::materials::material_types::{ConstitutiveModel, MaterialState};
use crate::materials::utils::physics;
use crate::math::{Matrix, diagonal_from_value, identity_matrix, matrix_determinant};

pub struct Water;

impl ConstitutiveModel for Water {
    type Params = FluidParams;

    /// `tau = K (J - 1) J I + 2 eta J sym(grad v)`.
    fn kirchhoff_stress(params: &FluidParams, state: &MaterialState) -> Matrix {
        let j = state.volume_ratio;
        let pressure_term = diagonal_from_value(params.bulk_modulus * (j - 1.0) * j);
        let viscous_term =
            physics::strain_rate(&state.velocity_gradient) * (2.0 * params.dynamic_viscosity * j);
        pressure_term + viscous_term
    }

    /// Fluids keep no shear memory: F collapses to `J^(1/3) I`.
    fn project(_params: &FluidParams, state: MaterialState) -> MaterialState {
        let j = matrix_determinant(&state.deformation_gradient);
        if j <= 0.0 || !j.is_finite() {
            return MaterialState {
                volume_ratio: j,
                ..state
            };
        }
        MaterialState {
            deformation_gradient: identity_matrix() * j.cbrt(),
            volume_ratio: j,
            ..state
        }
    }
}
