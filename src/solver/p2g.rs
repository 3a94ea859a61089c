//! Particle-to-Grid (P2G) transfer
//!
//! Scatters mass, momentum and internal force from particles to the nodes of
//! their 3x3x3 stencil.

use crate::config::TransferScheme;
use crate::core::{Grid, Particle, ParticleSoa, Stencil};
use crate::math::{Real, SignedCoord, Vector};

use super::StepContext;

/// One particle's share of one stencil node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeContribution {
    pub node: SignedCoord,
    pub mass: Real,
    pub momentum: Vector,
    pub force: Vector,
}

/// Contributions of `particle` to its 27 stencil nodes.
///
/// Stress comes from the deformation state projected at the end of the
/// previous step. The force term is the MLS discretisation of the stress
/// divergence, `-V0 D^-1 w tau (x_i - x_p)`.
#[inline]
pub fn scatter_particle(
    particle: &Particle,
    ctx: &StepContext,
) -> impl Iterator<Item = NodeContribution> {
    let stencil = Stencil::new(particle.position, ctx.cell_width);
    let stress = particle
        .material_type
        .stress(ctx.materials, &particle.material_state());
    let affine_stress = stress * (-particle.volume0 * ctx.inv_d);
    let mass = particle.mass;
    let velocity = particle.velocity;
    let affine = match ctx.transfer_scheme {
        TransferScheme::Mls => Some(particle.affine_momentum_matrix),
        TransferScheme::Flip => None,
    };

    stencil.nodes().map(move |(node, weight, dpos)| {
        let node_velocity = match affine {
            Some(c) => velocity + c * dpos,
            None => velocity,
        };
        let weighted_mass = weight * mass;
        NodeContribution {
            node,
            mass: weighted_mass,
            momentum: node_velocity * weighted_mass,
            force: affine_stress * dpos * weight,
        }
    })
}

/// Sequential P2G over the host particle arrays.
///
/// Contributions to nodes off the lattice are dropped; the domain check
/// before P2G keeps every stencil on the lattice.
pub fn particle_to_grid(particles: &ParticleSoa, grid: &mut Grid, ctx: &StepContext) {
    for particle in particles.iter() {
        for contribution in scatter_particle(&particle, ctx) {
            if let Some(index) = grid.node_index(contribution.node) {
                grid.accumulate(
                    index,
                    contribution.mass,
                    contribution.momentum,
                    contribution.force,
                );
            }
        }
    }
}
