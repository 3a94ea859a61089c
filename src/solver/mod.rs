//! Per-step transfer pipeline: domain check, P2G, grid update, G2P.
//!
//! Each stage is written as a per-particle or per-node kernel plus a
//! sequential host driver. The device path runs the same kernels in parallel.

pub mod domain;
pub mod g2p;
pub mod grid_update;
pub mod p2g;

pub use domain::enforce_domain;
pub use g2p::{GatherOutcome, gather_particle, grid_to_particle};
pub use grid_update::{apply_boundary_conditions, update_grid, update_node};
pub use p2g::{NodeContribution, particle_to_grid, scatter_particle};

use crate::config::{EngineConfig, TransferScheme};
use crate::core::{BoundaryHandling, inv_d};
use crate::materials::MaterialTable;
use crate::math::{NodeCoord, Real, Vector};

/// Everything a transfer kernel needs besides the particle or node itself.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    pub dt: Real,
    pub gravity: Vector,
    pub transfer_scheme: TransferScheme,
    pub flip_blend: Real,
    pub boundary: BoundaryHandling,
    pub resolution: NodeCoord,
    pub cell_width: Real,
    pub inv_d: Real,
    pub max_velocity: Real,
    pub materials: &'a MaterialTable,
}

impl<'a> StepContext<'a> {
    pub fn new(
        config: &EngineConfig,
        dt: Real,
        gravity: Vector,
        materials: &'a MaterialTable,
    ) -> Self {
        Self {
            dt,
            gravity,
            transfer_scheme: config.transfer_scheme,
            flip_blend: config.flip_blend,
            boundary: config.boundary,
            resolution: config.grid_resolution,
            cell_width: config.grid_cell_size,
            inv_d: inv_d(config.grid_cell_size),
            max_velocity: config.max_velocity,
            materials,
        }
    }
}
