use bevy::math::{IVec3, Mat3, UVec3, Vec3};
use nalgebra::Matrix3;

pub type Real = f32;

pub type Vector = Vec3;
pub type Matrix = Mat3;
pub type NodeCoord = UVec3;
pub type SignedCoord = IVec3;

#[inline(always)]
pub fn zero_vector() -> Vector {
    Vec3::ZERO
}

#[inline(always)]
pub fn repeat_vector(value: Real) -> Vector {
    Vec3::splat(value)
}

#[inline(always)]
pub fn zero_matrix() -> Matrix {
    Mat3::ZERO
}

#[inline(always)]
pub fn identity_matrix() -> Matrix {
    Mat3::IDENTITY
}

#[inline(always)]
pub fn matrix_trace(m: &Matrix) -> Real {
    m.x_axis.x + m.y_axis.y + m.z_axis.z
}

#[inline(always)]
pub fn matrix_determinant(m: &Matrix) -> Real {
    m.determinant()
}

#[inline(always)]
pub fn diagonal_from_value(value: Real) -> Matrix {
    Matrix::from_diagonal(Vec3::splat(value))
}

#[inline(always)]
pub fn diagonal_from_vec(vec: Vector) -> Matrix {
    Matrix::from_diagonal(vec)
}

/// `a ⊗ b`, i.e. the matrix whose column `j` is `a * b[j]`.
#[inline(always)]
pub fn outer_product(a: Vector, b: Vector) -> Matrix {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

#[inline(always)]
pub fn matrix_is_finite(m: &Matrix) -> bool {
    m.x_axis.is_finite() && m.y_axis.is_finite() && m.z_axis.is_finite()
}

/// Frobenius norm.
#[inline]
pub fn matrix_norm(m: &Matrix) -> Real {
    (m.x_axis.length_squared() + m.y_axis.length_squared() + m.z_axis.length_squared()).sqrt()
}

#[inline]
fn to_nalgebra(m: &Matrix) -> Matrix3<Real> {
    Matrix3::from_column_slice(&m.to_cols_array())
}

#[inline]
fn from_nalgebra(m: &Matrix3<Real>) -> Matrix {
    Mat3::from_cols_slice(m.as_slice())
}

/// Singular value decomposition `m = U diag(sigma) V^T`.
///
/// Singular values come back non-negative. When `det(m) > 0` the product
/// `U V^T` is a proper rotation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Svd3 {
    pub u: Matrix,
    pub sigma: Vector,
    pub v_t: Matrix,
}

impl Svd3 {
    pub fn recompose(&self) -> Matrix {
        self.u * diagonal_from_vec(self.sigma) * self.v_t
    }

    pub fn recompose_with(&self, sigma: Vector) -> Matrix {
        self.u * diagonal_from_vec(sigma) * self.v_t
    }

    pub fn rotation(&self) -> Matrix {
        self.u * self.v_t
    }
}

pub fn svd3(m: &Matrix) -> Option<Svd3> {
    let svd = to_nalgebra(m).svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    Some(Svd3 {
        u: from_nalgebra(&u),
        sigma: Vec3::new(
            svd.singular_values[0],
            svd.singular_values[1],
            svd.singular_values[2],
        ),
        v_t: from_nalgebra(&v_t),
    })
}

/// Rotation part `R` of the polar decomposition `m = R S`.
pub fn polar_rotation(m: &Matrix) -> Option<Matrix> {
    svd3(m).map(|svd| svd.rotation())
}
