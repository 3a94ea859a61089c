//! Fixed-corotated elasticity (jelly-like solids).

use crate::materials::families::ElasticParams;
use crate::materials::material_types::{ConstitutiveModel, MaterialState};
use crate::math::{Matrix, Real, diagonal_from_value, matrix_determinant, polar_rotation};

pub struct FixedCorotated;

/// `tau = 2 mu (F - R) F^T + lambda (J - 1) J I` with `J = det F`.
pub fn corotated_stress(f: &Matrix, lambda: Real, mu: Real) -> Matrix {
    let j = matrix_determinant(f);
    let Some(rotation) = polar_rotation(f) else {
        return diagonal_from_value(lambda * (j - 1.0) * j);
    };
    (*f - rotation) * f.transpose() * (2.0 * mu) + diagonal_from_value(lambda * (j - 1.0) * j)
}

impl ConstitutiveModel for FixedCorotated {
    type Params = ElasticParams;

    fn kirchhoff_stress(params: &ElasticParams, state: &MaterialState) -> Matrix {
        let (lambda, mu) = params.lame();
        corotated_stress(&state.deformation_gradient, lambda, mu)
    }

    /// Purely elastic: F is kept, J tracks det F.
    fn project(_params: &ElasticParams, state: MaterialState) -> MaterialState {
        MaterialState {
            volume_ratio: matrix_determinant(&state.deformation_gradient),
            ..state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix_norm;
    use bevy::math::Mat3;

    #[test]
    fn rigid_rotation_is_stress_free() {
        let f = Mat3::from_rotation_z(0.7);
        let stress = corotated_stress(&f, 100.0, 50.0);
        assert!(matrix_norm(&stress) < 1e-3);
    }

    #[test]
    fn stress_is_symmetric() {
        let f = Mat3::from_cols_array(&[1.1, 0.2, 0.0, 0.1, 0.95, 0.0, 0.0, 0.05, 1.02]);
        let stress = corotated_stress(&f, 100.0, 50.0);
        assert!(stress.abs_diff_eq(stress.transpose(), 1e-3));
    }
}
