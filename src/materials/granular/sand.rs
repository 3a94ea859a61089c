//! Sand/granular material
//!
//! Hencky-strain elasticity with a Drucker-Prager return mapping on the
//! logarithmic singular values of F.

use crate::materials::families::SandParams;
use crate::materials::material_types::{ConstitutiveModel, MaterialState};
use crate::math::{
    Matrix, Real, Vector, diagonal_from_vec, matrix_determinant, repeat_vector, svd3, zero_matrix,
};

pub struct Sand;

const MIN_SINGULAR_VALUE: Real = 1.0e-6;

#[inline]
fn log_strain(sigma: Vector) -> Vector {
    let sigma = sigma.max(repeat_vector(MIN_SINGULAR_VALUE));
    Vector::new(sigma.x.ln(), sigma.y.ln(), sigma.z.ln())
}

impl ConstitutiveModel for Sand {
    type Params = SandParams;

    /// `tau = U (2 mu eps + lambda tr(eps) I) U^T` with `eps = ln(Sigma)`.
    fn kirchhoff_stress(params: &SandParams, state: &MaterialState) -> Matrix {
        let Some(svd) = svd3(&state.deformation_gradient) else {
            return zero_matrix();
        };
        let (lambda, mu) = params.elastic.lame();
        let eps = log_strain(svd.sigma);
        let trace = eps.x + eps.y + eps.z;
        let principal = eps * (2.0 * mu) + repeat_vector(lambda * trace);
        svd.u * diagonal_from_vec(principal) * svd.u.transpose()
    }

    fn project(params: &SandParams, state: MaterialState) -> MaterialState {
        let Some(svd) = svd3(&state.deformation_gradient) else {
            return state;
        };
        let (lambda, mu) = params.elastic.lame();
        let eps = log_strain(svd.sigma);
        let trace = eps.x + eps.y + eps.z;

        let projected_sigma = if trace >= 0.0 {
            // Cohesionless material cannot hold tension.
            repeat_vector(1.0)
        } else {
            let deviator = eps - repeat_vector(trace / 3.0);
            let deviator_norm = deviator.length();
            let delta_gamma = deviator_norm
                + (3.0 * lambda + 2.0 * mu) / (2.0 * mu) * trace * params.friction_alpha();
            if delta_gamma <= 0.0 || deviator_norm <= Real::EPSILON {
                return MaterialState {
                    volume_ratio: matrix_determinant(&state.deformation_gradient),
                    ..state
                };
            }
            let h = eps - deviator * (delta_gamma / deviator_norm);
            Vector::new(h.x.exp(), h.y.exp(), h.z.exp())
        };

        let deformation_gradient = svd.recompose_with(projected_sigma);
        MaterialState {
            volume_ratio: matrix_determinant(&deformation_gradient),
            deformation_gradient,
            ..state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::{Mat3, Vec3};

    #[test]
    fn stretched_sand_returns_to_rest() {
        let state = MaterialState {
            deformation_gradient: Mat3::from_diagonal(Vec3::new(1.1, 1.05, 1.0)),
            ..MaterialState::rest()
        };
        let projected = Sand::project(&SandParams::default(), state);
        assert!(projected.deformation_gradient.abs_diff_eq(Mat3::IDENTITY, 1e-5));
        assert!((projected.volume_ratio - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pure_compression_is_admissible() {
        let f = Mat3::from_diagonal(Vec3::splat(0.95));
        let state = MaterialState {
            deformation_gradient: f,
            ..MaterialState::rest()
        };
        let projected = Sand::project(&SandParams::default(), state);
        assert!(projected.deformation_gradient.abs_diff_eq(f, 1e-5));
    }

    #[test]
    fn sheared_sand_yields_onto_cone() {
        let params = SandParams::default();
        let state = MaterialState {
            deformation_gradient: Mat3::from_diagonal(Vec3::new(1.2, 0.8, 0.95)),
            ..MaterialState::rest()
        };
        let projected = Sand::project(&params, state);
        let svd = svd3(&projected.deformation_gradient).unwrap();
        let eps = log_strain(svd.sigma);
        let trace = eps.x + eps.y + eps.z;
        let deviator = eps - repeat_vector(trace / 3.0);
        let (lambda, mu) = params.elastic.lame();
        let yield_value = deviator.length()
            + (3.0 * lambda + 2.0 * mu) / (2.0 * mu) * trace * params.friction_alpha();
        assert!(yield_value <= 1e-3);
    }
}
