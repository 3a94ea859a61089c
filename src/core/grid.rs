//! Background grid for MPM simulation
//!
//! Transient 3D lattice: cleared at the start of every step, filled by P2G,
//! updated in place and read back by G2P. Two storage backends share one
//! logical interface.

use bevy::prelude::*;
use indexmap::IndexMap;

use crate::config::GridBackendType;
use crate::math::{NodeCoord, Real, SignedCoord, Vector, zero_vector};

use super::kernel::KERNEL_SIZE;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct GridNode {
    pub mass: Real,
    pub momentum: Vector,
    /// Internal (stress) force accumulated during P2G.
    pub force: Vector,
    /// Velocity after the grid update.
    pub velocity: Vector,
    /// Velocity before forces were applied, read by FLIP.
    pub velocity_prev: Vector,
}

impl GridNode {
    #[inline(always)]
    pub fn zeroed() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn zero(&mut self) {
        *self = Self::zeroed();
    }

    #[inline(always)]
    pub fn accumulate(&mut self, mass: Real, momentum: Vector, force: Vector) {
        self.mass += mass;
        self.momentum += momentum;
        self.force += force;
    }
}

/// How nodes near the domain faces treat velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundaryHandling {
    /// Remove the velocity component pointing out of the domain.
    #[default]
    Slip,
    /// Remove all velocity on boundary nodes.
    Stick,
}

/// Capability set every grid backend provides to the transfer stages.
pub trait GridStorage {
    /// Zero all node accumulators.
    fn clear(&mut self);
    fn accumulate(&mut self, index: usize, mass: Real, momentum: Vector, force: Vector);
    /// Node at `index`; untouched nodes read as zero.
    fn read(&self, index: usize) -> GridNode;
    /// Visit every stored node.
    fn for_each_active_mut(&mut self, f: &mut dyn FnMut(usize, &mut GridNode));
    fn active_node_count(&self) -> usize;
}

/// Flat array, one node per lattice point.
#[derive(Clone, Debug)]
pub struct DenseGrid {
    nodes: Vec<GridNode>,
}

impl DenseGrid {
    pub fn new(node_count: usize) -> Self {
        Self {
            nodes: vec![GridNode::zeroed(); node_count],
        }
    }
}

impl GridStorage for DenseGrid {
    fn clear(&mut self) {
        self.nodes.iter_mut().for_each(GridNode::zero);
    }

    #[inline]
    fn accumulate(&mut self, index: usize, mass: Real, momentum: Vector, force: Vector) {
        self.nodes[index].accumulate(mass, momentum, force);
    }

    #[inline]
    fn read(&self, index: usize) -> GridNode {
        self.nodes[index]
    }

    fn for_each_active_mut(&mut self, f: &mut dyn FnMut(usize, &mut GridNode)) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            f(index, node);
        }
    }

    fn active_node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Hashed storage holding only touched nodes, in first-touch order.
#[derive(Clone, Debug, Default)]
pub struct SparseGrid {
    nodes: IndexMap<usize, GridNode>,
}

impl SparseGrid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GridStorage for SparseGrid {
    fn clear(&mut self) {
        self.nodes.clear();
    }

    #[inline]
    fn accumulate(&mut self, index: usize, mass: Real, momentum: Vector, force: Vector) {
        self.nodes
            .entry(index)
            .or_insert_with(GridNode::zeroed)
            .accumulate(mass, momentum, force);
    }

    #[inline]
    fn read(&self, index: usize) -> GridNode {
        self.nodes.get(&index).copied().unwrap_or_default()
    }

    fn for_each_active_mut(&mut self, f: &mut dyn FnMut(usize, &mut GridNode)) {
        for (&index, node) in self.nodes.iter_mut() {
            f(index, node);
        }
    }

    fn active_node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Clone, Debug)]
pub enum GridBackend {
    Dense(DenseGrid),
    Sparse(SparseGrid),
}

impl GridStorage for GridBackend {
    fn clear(&mut self) {
        match self {
            Self::Dense(grid) => grid.clear(),
            Self::Sparse(grid) => grid.clear(),
        }
    }

    #[inline]
    fn accumulate(&mut self, index: usize, mass: Real, momentum: Vector, force: Vector) {
        match self {
            Self::Dense(grid) => grid.accumulate(index, mass, momentum, force),
            Self::Sparse(grid) => grid.accumulate(index, mass, momentum, force),
        }
    }

    #[inline]
    fn read(&self, index: usize) -> GridNode {
        match self {
            Self::Dense(grid) => grid.read(index),
            Self::Sparse(grid) => grid.read(index),
        }
    }

    fn for_each_active_mut(&mut self, f: &mut dyn FnMut(usize, &mut GridNode)) {
        match self {
            Self::Dense(grid) => grid.for_each_active_mut(f),
            Self::Sparse(grid) => grid.for_each_active_mut(f),
        }
    }

    fn active_node_count(&self) -> usize {
        match self {
            Self::Dense(grid) => grid.active_node_count(),
            Self::Sparse(grid) => grid.active_node_count(),
        }
    }
}

/// Fixed-resolution lattice with uniform cell width.
#[derive(Clone, Debug)]
pub struct Grid {
    resolution: NodeCoord,
    cell_width: Real,
    storage: GridBackend,
}

impl Grid {
    pub fn new(res_x: u32, res_y: u32, res_z: u32, cell_width: Real, backend: GridBackendType) -> Self {
        let resolution = UVec3::new(res_x, res_y, res_z);
        let node_count = res_x as usize * res_y as usize * res_z as usize;
        let storage = match backend {
            GridBackendType::Dense => GridBackend::Dense(DenseGrid::new(node_count)),
            GridBackendType::Sparse => GridBackend::Sparse(SparseGrid::new()),
        };
        Self {
            resolution,
            cell_width,
            storage,
        }
    }

    pub fn resolution(&self) -> NodeCoord {
        self.resolution
    }

    pub fn cell_width(&self) -> Real {
        self.cell_width
    }

    pub fn backend(&self) -> GridBackendType {
        match self.storage {
            GridBackend::Dense(_) => GridBackendType::Dense,
            GridBackend::Sparse(_) => GridBackendType::Sparse,
        }
    }

    pub fn node_count(&self) -> usize {
        self.resolution.x as usize * self.resolution.y as usize * self.resolution.z as usize
    }

    /// Linear index, x fastest.
    #[inline(always)]
    pub fn linear_index(&self, coord: NodeCoord) -> usize {
        linear_index(self.resolution, coord)
    }

    #[inline(always)]
    pub fn coord_of(&self, index: usize) -> NodeCoord {
        coord_of(self.resolution, index)
    }

    /// Linear index of a signed coordinate, `None` outside the lattice.
    #[inline]
    pub fn node_index(&self, coord: SignedCoord) -> Option<usize> {
        node_index(self.resolution, coord)
    }

    /// Whether a full 3x3x3 stencil starting at `base` lies on the lattice.
    #[inline]
    pub fn contains_stencil(&self, base: SignedCoord) -> bool {
        stencil_in_lattice(self.resolution, base)
    }

    /// Positions whose stencil fits on the lattice: `[min, max]` per axis.
    pub fn admissible_box(&self) -> (Vector, Vector) {
        admissible_box(self.resolution, self.cell_width)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }

    #[inline]
    pub fn accumulate(&mut self, index: usize, mass: Real, momentum: Vector, force: Vector) {
        self.storage.accumulate(index, mass, momentum, force);
    }

    #[inline]
    pub fn read(&self, index: usize) -> GridNode {
        self.storage.read(index)
    }

    /// Visit every stored node with its lattice coordinate.
    pub fn for_each_active_mut(&mut self, mut f: impl FnMut(NodeCoord, &mut GridNode)) {
        let resolution = self.resolution;
        self.storage
            .for_each_active_mut(&mut |index: usize, node: &mut GridNode| {
                f(coord_of(resolution, index), node)
            });
    }

    pub fn active_node_count(&self) -> usize {
        self.storage.active_node_count()
    }

    pub fn total_mass(&self) -> Real {
        let mut total = 0.0;
        self.visit(|node| total += node.mass);
        total
    }

    /// Sum of accumulated P2G momentum.
    pub fn total_momentum(&self) -> Vector {
        let mut total = zero_vector();
        self.visit(|node| total += node.momentum);
        total
    }

    fn visit(&self, mut f: impl FnMut(&GridNode)) {
        match &self.storage {
            GridBackend::Dense(grid) => grid.nodes.iter().for_each(&mut f),
            GridBackend::Sparse(grid) => grid.nodes.values().for_each(&mut f),
        }
    }
}

#[inline(always)]
pub fn linear_index(resolution: NodeCoord, coord: NodeCoord) -> usize {
    coord.x as usize
        + resolution.x as usize * (coord.y as usize + resolution.y as usize * coord.z as usize)
}

#[inline]
pub fn node_index(resolution: NodeCoord, coord: SignedCoord) -> Option<usize> {
    if coord.min_element() < 0 {
        return None;
    }
    let coord = coord.as_uvec3();
    if coord.cmpge(resolution).any() {
        return None;
    }
    Some(linear_index(resolution, coord))
}

#[inline(always)]
pub fn coord_of(resolution: NodeCoord, index: usize) -> NodeCoord {
    let rx = resolution.x as usize;
    let ry = resolution.y as usize;
    UVec3::new(
        (index % rx) as u32,
        ((index / rx) % ry) as u32,
        (index / (rx * ry)) as u32,
    )
}

#[inline(always)]
pub fn stencil_in_lattice(resolution: NodeCoord, base: SignedCoord) -> bool {
    let last = base + IVec3::splat(KERNEL_SIZE as i32 - 1);
    base.min_element() >= 0 && last.cmplt(resolution.as_ivec3()).all()
}

/// Stencil base is `floor(x / dx - 0.5)`, so `x / dx` must lie in `[0.5, res - 1.5)`.
/// Both ends are pulled in by a small margin so rounding never escapes.
pub fn admissible_box(resolution: NodeCoord, cell_width: Real) -> (Vector, Vector) {
    const MARGIN: Real = 1.0e-3;
    let min = Vec3::splat((0.5 + MARGIN) * cell_width);
    let max = (resolution.as_vec3() - Vec3::splat(1.5 + MARGIN)) * cell_width;
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grids() -> [Grid; 2] {
        [
            Grid::new(8, 6, 4, 0.5, GridBackendType::Dense),
            Grid::new(8, 6, 4, 0.5, GridBackendType::Sparse),
        ]
    }

    #[test]
    fn index_round_trip() {
        let grid = Grid::new(8, 6, 4, 0.5, GridBackendType::Dense);
        let coord = UVec3::new(3, 5, 2);
        let index = grid.linear_index(coord);
        assert_eq!(grid.coord_of(index), coord);
        assert_eq!(grid.node_index(coord.as_ivec3()), Some(index));
        assert_eq!(grid.node_index(IVec3::new(-1, 0, 0)), None);
        assert_eq!(grid.node_index(IVec3::new(8, 0, 0)), None);
    }

    #[test]
    fn backends_share_semantics() {
        for mut grid in grids() {
            let index = grid.linear_index(UVec3::new(1, 2, 3));
            grid.accumulate(index, 1.5, Vec3::X, Vec3::Y);
            grid.accumulate(index, 0.5, Vec3::X, Vec3::ZERO);

            let node = grid.read(index);
            assert_eq!(node.mass, 2.0);
            assert_eq!(node.momentum, Vec3::new(2.0, 0.0, 0.0));
            assert_eq!(node.force, Vec3::Y);
            assert_eq!(grid.read(0), GridNode::zeroed());
            assert_eq!(grid.total_mass(), 2.0);

            grid.clear();
            assert_eq!(grid.read(index), GridNode::zeroed());
            assert_eq!(grid.total_mass(), 0.0);
        }
    }

    #[test]
    fn sparse_grid_stores_touched_nodes_only() {
        let mut grid = Grid::new(8, 6, 4, 0.5, GridBackendType::Sparse);
        assert_eq!(grid.active_node_count(), 0);
        grid.accumulate(7, 1.0, Vec3::ZERO, Vec3::ZERO);
        assert_eq!(grid.active_node_count(), 1);

        let mut visited = Vec::new();
        grid.for_each_active_mut(|coord, _| visited.push(coord));
        assert_eq!(visited, vec![UVec3::new(7, 0, 0)]);
    }

    #[test]
    fn stencil_bounds() {
        let grid = Grid::new(8, 6, 4, 0.5, GridBackendType::Dense);
        assert!(grid.contains_stencil(IVec3::ZERO));
        assert!(grid.contains_stencil(IVec3::new(5, 3, 1)));
        assert!(!grid.contains_stencil(IVec3::new(6, 3, 1)));
        assert!(!grid.contains_stencil(IVec3::new(0, -1, 0)));

        let (min, max) = grid.admissible_box();
        let low = crate::core::kernel::Stencil::new(min, 0.5);
        let high = crate::core::kernel::Stencil::new(max, 0.5);
        assert!(grid.contains_stencil(low.base));
        assert!(grid.contains_stencil(high.base));
    }
}
