use bevy::prelude::*;

use crate::config::DomainPolicy;
use crate::core::{Stencil, admissible_box, stencil_in_lattice};
use crate::error::{MpmError, MpmResult};
use crate::math::{NodeCoord, Real, Vector};

/// Make sure every particle's stencil lies on the lattice before P2G.
///
/// `Reject` fails on the first offending particle without touching any
/// position. `Clamp` pulls offenders into the admissible box and returns how
/// many were moved. A non-finite position is an error under both policies,
/// and is detected before anything is clamped.
pub fn enforce_domain(
    positions: &mut [Vector],
    resolution: NodeCoord,
    cell_width: Real,
    policy: DomainPolicy,
) -> MpmResult<usize> {
    let mut first_outside = None;
    let mut outside = 0usize;
    for (index, position) in positions.iter().enumerate() {
        if !position.is_finite() {
            return Err(MpmError::NumericalInstability {
                index,
                reason: format!("non-finite position {position}"),
            });
        }
        if !stencil_in_lattice(resolution, Stencil::new(*position, cell_width).base) {
            first_outside.get_or_insert((index, *position));
            outside += 1;
        }
    }

    let Some((index, position)) = first_outside else {
        return Ok(0);
    };

    match policy {
        DomainPolicy::Reject => Err(MpmError::DomainViolation { index, position }),
        DomainPolicy::Clamp => {
            let (min, max) = admissible_box(resolution, cell_width);
            for position in positions.iter_mut() {
                *position = position.clamp(min, max);
            }
            warn!(
                "Clamped {} particle(s) back into the grid, first was {} at {}",
                outside, index, position
            );
            Ok(outside)
        }
    }
}
