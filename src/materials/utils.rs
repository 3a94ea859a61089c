//! Helper functions for materials
//!
//! Math and utility functions that different materials can use.

use crate::math::{Matrix, Real, matrix_trace};

/// Mean normal stress
#[inline]
pub fn pressure(stress: &Matrix) -> Real {
    -matrix_trace(stress) / 3.0
}

/// Physics parameter conversions shared by the material families.
pub mod physics {
    use crate::math::{Matrix, Real};

    /// Computes the Lamé parameters (lambda, mu) from Young's modulus and Poisson ratio
    #[inline]
    pub fn lame_lambda_mu(young_modulus: Real, poisson_ratio: Real) -> (Real, Real) {
        let lambda =
            young_modulus * poisson_ratio / ((1.0 + poisson_ratio) * (1.0 - 2.0 * poisson_ratio));
        let mu = shear_modulus(young_modulus, poisson_ratio);
        (lambda, mu)
    }

    /// Shear modulus (mu) from Young's modulus and Poisson ratio
    #[inline]
    pub fn shear_modulus(young_modulus: Real, poisson_ratio: Real) -> Real {
        young_modulus / (2.0 * (1.0 + poisson_ratio))
    }

    /// Bulk modulus from Young's modulus and Poisson ratio
    #[inline]
    pub fn bulk_modulus(young_modulus: Real, poisson_ratio: Real) -> Real {
        young_modulus / (3.0 * (1.0 - 2.0 * poisson_ratio))
    }

    /// Symmetric part of the velocity gradient
    #[inline]
    pub fn strain_rate(velocity_gradient: &Matrix) -> Matrix {
        (*velocity_gradient + velocity_gradient.transpose()) * 0.5
    }
}

/// Check if material state makes sense
pub mod check {
    use crate::math::{Matrix, Real, matrix_determinant, matrix_is_finite};

    /// Deformation gradient must be finite with a positive determinant.
    #[inline]
    pub fn deformation_gradient_ok(f: &Matrix) -> bool {
        matrix_is_finite(f) && matrix_determinant(f) > 0.0
    }

    #[inline]
    pub fn young_modulus_ok(e: Real) -> bool {
        e > 0.0 && e < 1e12 && e.is_finite()
    }

    #[inline]
    pub fn poisson_ratio_ok(nu: Real) -> bool {
        nu > -1.0 && nu < 0.5 && nu.is_finite()
    }
}
