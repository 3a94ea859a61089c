use crate::config::BOUND;
use crate::core::{BoundaryHandling, Grid, GridNode};
use crate::math::{NodeCoord, Vector, zero_vector};

use super::StepContext;

/// Explicit update of one node: normalise momentum, add stress force and
/// gravity, then enforce the domain boundary. Massless nodes stay at rest.
#[inline]
pub fn update_node(node: &mut GridNode, coord: NodeCoord, ctx: &StepContext) {
    if node.mass <= 0.0 {
        node.velocity = zero_vector();
        node.velocity_prev = zero_vector();
        return;
    }
    let inv_mass = 1.0 / node.mass;
    node.velocity_prev = node.momentum * inv_mass;
    node.velocity = node.velocity_prev + (node.force * inv_mass + ctx.gravity) * ctx.dt;
    node.velocity = apply_boundary_conditions(node.velocity, coord, ctx);
}

/// Nodes within `BOUND` cells of a face lose the velocity that points out of
/// the domain (`Slip`) or all of it (`Stick`).
#[inline]
pub fn apply_boundary_conditions(velocity: Vector, coord: NodeCoord, ctx: &StepContext) -> Vector {
    let upper = ctx.resolution.saturating_sub(NodeCoord::splat(BOUND));
    let mut projected = velocity;
    let mut on_boundary = false;
    for axis in 0..3 {
        let low = coord[axis] < BOUND;
        let high = coord[axis] >= upper[axis];
        on_boundary |= low || high;
        if (low && projected[axis] < 0.0) || (high && projected[axis] > 0.0) {
            projected[axis] = 0.0;
        }
    }
    match ctx.boundary {
        BoundaryHandling::Slip => projected,
        BoundaryHandling::Stick if on_boundary => zero_vector(),
        BoundaryHandling::Stick => velocity,
    }
}

/// Sequential grid update over every stored node.
pub fn update_grid(grid: &mut Grid, ctx: &StepContext) {
    grid.for_each_active_mut(|coord, node| update_node(node, coord, ctx));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, GridBackendType};
    use crate::materials::MaterialTable;
    use bevy::prelude::*;

    fn context<'a>(table: &'a MaterialTable, config: &EngineConfig) -> StepContext<'a> {
        StepContext::new(config, 0.01, Vec3::new(0.0, -10.0, 0.0), table)
    }

    #[test]
    fn interior_node_gets_force_and_gravity() {
        let table = MaterialTable::default();
        let config = EngineConfig::default().with_resolution(UVec3::splat(16), 0.1);
        let ctx = context(&table, &config);

        let mut node = GridNode::zeroed();
        node.accumulate(2.0, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0));
        update_node(&mut node, UVec3::splat(8), &ctx);

        assert_eq!(node.velocity_prev, Vec3::X);
        assert!((node.velocity - Vec3::new(1.0, -0.1, 0.02)).length() < 1e-6);
    }

    #[test]
    fn massless_node_stays_at_rest() {
        let table = MaterialTable::default();
        let config = EngineConfig::default().with_resolution(UVec3::splat(16), 0.1);
        let ctx = context(&table, &config);

        let mut node = GridNode::zeroed();
        update_node(&mut node, UVec3::splat(8), &ctx);
        assert_eq!(node.velocity, Vec3::ZERO);
    }

    #[test]
    fn slip_removes_outward_component_only() {
        let table = MaterialTable::default();
        let config = EngineConfig::default().with_resolution(UVec3::splat(16), 0.1);
        let ctx = context(&table, &config);

        let v = Vec3::new(-1.0, 2.0, 3.0);
        assert_eq!(
            apply_boundary_conditions(v, UVec3::new(1, 8, 8), &ctx),
            Vec3::new(0.0, 2.0, 3.0)
        );
        assert_eq!(
            apply_boundary_conditions(v, UVec3::new(8, 8, 14), &ctx),
            Vec3::new(-1.0, 2.0, 0.0)
        );
        // Moving inward from the face is allowed.
        assert_eq!(apply_boundary_conditions(-v, UVec3::new(1, 8, 8), &ctx), -v);
        assert_eq!(apply_boundary_conditions(v, UVec3::splat(8), &ctx), v);
    }

    #[test]
    fn stick_removes_all_velocity_near_faces() {
        let table = MaterialTable::default();
        let config = EngineConfig::default()
            .with_resolution(UVec3::splat(16), 0.1)
            .with_boundary(BoundaryHandling::Stick);
        let ctx = context(&table, &config);

        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(apply_boundary_conditions(v, UVec3::new(8, 0, 8), &ctx), Vec3::ZERO);
        assert_eq!(apply_boundary_conditions(v, UVec3::splat(8), &ctx), v);
    }

    #[test]
    fn host_update_visits_sparse_nodes() {
        let table = MaterialTable::default();
        let config = EngineConfig::default().with_resolution(UVec3::splat(16), 0.1);
        let ctx = context(&table, &config);

        let mut grid = Grid::new(16, 16, 16, 0.1, GridBackendType::Sparse);
        let index = grid.linear_index(UVec3::splat(8));
        grid.accumulate(index, 1.0, Vec3::ZERO, Vec3::ZERO);
        update_grid(&mut grid, &ctx);
        assert!((grid.read(index).velocity.y + 0.1).abs() < 1e-6);
    }
}
