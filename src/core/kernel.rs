use bevy::prelude::{IVec3, Vec3};

use crate::math::{Real, SignedCoord, Vector};

/// Nodes per axis touched by the quadratic B-spline.
pub const KERNEL_SIZE: usize = 3;
/// Nodes in a 3x3x3 stencil.
pub const NEIGHBOR_COUNT: usize = KERNEL_SIZE * KERNEL_SIZE * KERNEL_SIZE;

/// Compute the inverse inertia factor `D^-1` used by MLS-MPM kernels.
///
/// For the quadratic B-spline `D = dx^2 / 4 I`. Keeping it in one place keeps
/// P2G and G2P consistent.
#[inline]
pub fn inv_d(cell_width: Real) -> Real {
    4.0 / (cell_width * cell_width)
}

/// Quadratic B-spline weights on one axis for fractional offset `fx` in `[0.5, 1.5)`.
#[inline(always)]
fn bspline_weights(fx: Vec3) -> [Vec3; KERNEL_SIZE] {
    let a = Vec3::splat(1.5) - fx;
    let b = fx - Vec3::ONE;
    let c = fx - Vec3::splat(0.5);
    [0.5 * a * a, Vec3::splat(0.75) - b * b, 0.5 * c * c]
}

/// Interpolation stencil of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stencil {
    /// Lowest node of the 3x3x3 block.
    pub base: SignedCoord,
    /// Particle position relative to `base`, in cells.
    pub fx: Vector,
    pub weights: [Vector; KERNEL_SIZE],
    pub cell_width: Real,
}

impl Stencil {
    #[inline]
    pub fn new(position: Vector, cell_width: Real) -> Self {
        let scaled = position / cell_width;
        let base = (scaled - Vec3::splat(0.5)).floor().as_ivec3();
        let fx = scaled - base.as_vec3();
        Self {
            base,
            fx,
            weights: bspline_weights(fx),
            cell_width,
        }
    }

    /// `(node, weight, node_position - particle_position)` for stencil slot `slot`.
    #[inline(always)]
    pub fn node(&self, slot: usize) -> (SignedCoord, Real, Vector) {
        let gx = slot % KERNEL_SIZE;
        let gy = (slot / KERNEL_SIZE) % KERNEL_SIZE;
        let gz = slot / (KERNEL_SIZE * KERNEL_SIZE);
        let offset = IVec3::new(gx as i32, gy as i32, gz as i32);
        let weight = self.weights[gx].x * self.weights[gy].y * self.weights[gz].z;
        let dpos = (offset.as_vec3() - self.fx) * self.cell_width;
        (self.base + offset, weight, dpos)
    }

    /// Iterator over all 27 stencil nodes.
    #[inline]
    pub fn nodes(self) -> impl Iterator<Item = (SignedCoord, Real, Vector)> {
        (0..NEIGHBOR_COUNT).map(move |slot| self.node(slot))
    }
}
