pub mod grid;
pub mod kernel;
pub mod particle;
pub mod particle_set;

pub use grid::{
    BoundaryHandling, DenseGrid, Grid, GridBackend, GridNode, GridStorage, SparseGrid,
    admissible_box, coord_of, linear_index, node_index, stencil_in_lattice,
};
pub use kernel::{KERNEL_SIZE, NEIGHBOR_COUNT, Stencil, inv_d};
pub use particle::Particle;
pub use particle_set::{ParticleSet, ParticleSoa};
