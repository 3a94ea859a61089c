//! Snow: corotated elasticity with hardening and singular value clamping.

use crate::materials::families::SnowParams;
use crate::materials::material_types::{ConstitutiveModel, MaterialState};
use crate::materials::solids::elastic::corotated_stress;
use crate::math::{Matrix, svd3};

pub struct Snow;

impl ConstitutiveModel for Snow {
    type Params = SnowParams;

    /// Lamé parameters scale with `exp(hardening * (1 - Jp))`.
    fn kirchhoff_stress(params: &SnowParams, state: &MaterialState) -> Matrix {
        let (lambda, mu) = params.elastic.lame();
        let h = (params.hardening * (1.0 - state.volume_ratio)).exp();
        corotated_stress(&state.deformation_gradient, lambda * h, mu * h)
    }

    fn project(params: &SnowParams, state: MaterialState) -> MaterialState {
        let Some(svd) = svd3(&state.deformation_gradient) else {
            return state;
        };
        let clamped = svd.sigma.clamp(
            crate::math::repeat_vector(1.0 - params.critical_compression),
            crate::math::repeat_vector(1.0 + params.critical_stretch),
        );
        // Volume removed from the elastic part moves into the plastic ratio.
        let plastic_gain = svd.sigma.element_product() / clamped.element_product();
        MaterialState {
            deformation_gradient: svd.recompose_with(clamped),
            volume_ratio: state.volume_ratio * plastic_gain,
            ..state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix_determinant;
    use bevy::math::{Mat3, Vec3};

    #[test]
    fn large_stretch_is_clamped() {
        let params = SnowParams::default();
        let state = MaterialState {
            deformation_gradient: Mat3::from_diagonal(Vec3::new(1.2, 1.0, 1.0)),
            ..MaterialState::rest()
        };
        let projected = Snow::project(&params, state);
        let det = matrix_determinant(&projected.deformation_gradient);
        assert!((det - (1.0 + params.critical_stretch)).abs() < 1e-4);
        // Plastic stretch lowers hardening: Jp grows above one.
        assert!(projected.volume_ratio > 1.0);
    }

    #[test]
    fn small_deformation_is_untouched() {
        let params = SnowParams::default();
        let f = Mat3::from_diagonal(Vec3::new(1.001, 0.999, 1.0));
        let state = MaterialState {
            deformation_gradient: f,
            ..MaterialState::rest()
        };
        let projected = Snow::project(&params, state);
        assert!(projected.deformation_gradient.abs_diff_eq(f, 1e-5));
        assert!((projected.volume_ratio - 1.0).abs() < 1e-5);
    }
}
