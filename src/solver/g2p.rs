//! Grid-to-Particle (G2P) transfer
//!
//! Gathers node velocities back to particles, advects them and updates the
//! deformation state through the material projection.

use bevy::prelude::*;

use crate::config::TransferScheme;
use crate::core::{Grid, GridNode, Particle, ParticleSoa, Stencil};
use crate::error::{MpmError, MpmResult};
use crate::materials::{MaterialState, check};
use crate::math::{SignedCoord, identity_matrix, matrix_is_finite, outer_product, zero_matrix, zero_vector};

use super::StepContext;

/// What happened to a particle during the gather, beyond the normal update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatherOutcome {
    /// Speed exceeded the sanity bound and was scaled down.
    pub velocity_clamped: bool,
}

/// Gather one particle from the updated grid. `read_node` returns `None` for
/// nodes off the lattice.
///
/// On error the particle is left as it was and the message says what broke.
#[inline]
pub fn gather_particle(
    particle: &mut Particle,
    ctx: &StepContext,
    read_node: impl Fn(SignedCoord) -> Option<GridNode>,
) -> Result<GatherOutcome, String> {
    let stencil = Stencil::new(particle.position, ctx.cell_width);

    let mut pic_velocity = zero_vector();
    let mut velocity_change = zero_vector();
    let mut velocity_gradient = zero_matrix();
    for (coord, weight, dpos) in stencil.nodes() {
        let Some(node) = read_node(coord) else {
            continue;
        };
        let weighted_velocity = node.velocity * weight;
        pic_velocity += weighted_velocity;
        velocity_change += (node.velocity - node.velocity_prev) * weight;
        velocity_gradient += outer_product(weighted_velocity, dpos) * ctx.inv_d;
    }

    let mut velocity = match ctx.transfer_scheme {
        TransferScheme::Mls => pic_velocity,
        TransferScheme::Flip => {
            let flip_velocity = particle.velocity + velocity_change;
            flip_velocity * ctx.flip_blend + pic_velocity * (1.0 - ctx.flip_blend)
        }
    };

    if !velocity.is_finite() || !matrix_is_finite(&velocity_gradient) {
        return Err(format!("non-finite velocity {velocity} after gather"));
    }

    let mut outcome = GatherOutcome::default();
    let speed = velocity.length();
    if speed > ctx.max_velocity {
        velocity *= ctx.max_velocity / speed;
        outcome.velocity_clamped = true;
    }

    let position = particle.position + velocity * ctx.dt;
    if !position.is_finite() {
        return Err(format!("non-finite position {position} after advection"));
    }

    let trial = MaterialState {
        deformation_gradient: (identity_matrix() + velocity_gradient * ctx.dt)
            * particle.deformation_gradient,
        volume_ratio: particle.volume_ratio,
        velocity_gradient,
    };
    let projected = particle.material_type.project(ctx.materials, trial);
    if !check::deformation_gradient_ok(&projected.deformation_gradient)
        || !projected.volume_ratio.is_finite()
    {
        return Err(format!(
            "{} projection produced an invalid deformation gradient (det {})",
            particle.material_type.material_name(),
            projected.deformation_gradient.determinant()
        ));
    }

    particle.velocity = velocity;
    particle.affine_momentum_matrix = velocity_gradient;
    particle.position = position;
    particle.deformation_gradient = projected.deformation_gradient;
    particle.volume_ratio = projected.volume_ratio;
    Ok(outcome)
}

/// Sequential G2P over the host particle arrays.
///
/// Results are staged and committed only if every particle succeeds, so an
/// instability leaves the previous state in place. Returns the number of
/// velocity clamps.
pub fn grid_to_particle(
    particles: &mut ParticleSoa,
    grid: &Grid,
    ctx: &StepContext,
) -> MpmResult<usize> {
    let read_node = |coord: SignedCoord| grid.node_index(coord).map(|index| grid.read(index));

    let mut updated = Vec::with_capacity(particles.len());
    let mut clamped = 0;
    for (index, mut particle) in particles.iter().enumerate() {
        let outcome = gather_particle(&mut particle, ctx, read_node)
            .map_err(|reason| MpmError::NumericalInstability { index, reason })?;
        if outcome.velocity_clamped {
            clamped += 1;
        }
        updated.push(particle);
    }

    for (index, particle) in updated.iter().enumerate() {
        particles.store(index, particle);
    }
    if clamped > 0 {
        warn!(
            "Clamped velocity of {} particle(s) to {}",
            clamped, ctx.max_velocity
        );
    }
    Ok(clamped)
}
