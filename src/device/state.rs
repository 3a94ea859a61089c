//! Device-resident mirror of the particle arrays and grid.
//!
//! Kernels run on a dedicated rayon pool. Each kernel returns only after all
//! of its work has finished, which is the barrier between stages.

use bevy::log::info;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::DomainPolicy;
use crate::core::{GridNode, Particle, ParticleSoa, coord_of, node_index};
use crate::diagnostics::EnergySample;
use crate::error::{MpmError, MpmResult};
use crate::materials::MaterialType;
use crate::math::{Matrix, NodeCoord, Real, SignedCoord, Vector, zero_vector};
use crate::solver::{StepContext, enforce_domain, gather_particle, scatter_particle, update_node};

use super::atomic::{AtomicReal, AtomicVector};
use super::buffer::DeviceBuffer;

/// Per-particle buffers, one per field.
#[derive(Debug)]
struct ParticleBuffers {
    mass: DeviceBuffer<Real>,
    volume0: DeviceBuffer<Real>,
    material_type: DeviceBuffer<MaterialType>,
    position: DeviceBuffer<Vector>,
    velocity: DeviceBuffer<Vector>,
    deformation_gradient: DeviceBuffer<Matrix>,
    volume_ratio: DeviceBuffer<Real>,
    affine_momentum: DeviceBuffer<Matrix>,
}

impl ParticleBuffers {
    fn allocate(count: usize) -> MpmResult<Self> {
        Ok(Self {
            mass: DeviceBuffer::filled("particle.mass", count, 0.0)?,
            volume0: DeviceBuffer::filled("particle.volume0", count, 0.0)?,
            material_type: DeviceBuffer::filled("particle.material", count, MaterialType::default())?,
            position: DeviceBuffer::filled("particle.position", count, zero_vector())?,
            velocity: DeviceBuffer::filled("particle.velocity", count, zero_vector())?,
            deformation_gradient: DeviceBuffer::filled("particle.F", count, Matrix::IDENTITY)?,
            volume_ratio: DeviceBuffer::filled("particle.J", count, 1.0)?,
            affine_momentum: DeviceBuffer::filled("particle.C", count, Matrix::ZERO)?,
        })
    }

    fn byte_size(&self) -> usize {
        self.mass.byte_size()
            + self.volume0.byte_size()
            + self.material_type.byte_size()
            + self.position.byte_size()
            + self.velocity.byte_size()
            + self.deformation_gradient.byte_size()
            + self.volume_ratio.byte_size()
            + self.affine_momentum.byte_size()
    }

    #[inline]
    fn particle(&self, index: usize) -> Particle {
        Particle {
            position: self.position[index],
            velocity: self.velocity[index],
            mass: self.mass[index],
            volume0: self.volume0[index],
            deformation_gradient: self.deformation_gradient[index],
            volume_ratio: self.volume_ratio[index],
            affine_momentum_matrix: self.affine_momentum[index],
            material_type: self.material_type[index],
        }
    }
}

/// Dense grid: atomic accumulators written by P2G, resolved nodes written by
/// the grid update and read by G2P.
#[derive(Debug)]
struct GridBuffers {
    mass: DeviceBuffer<AtomicReal>,
    momentum: DeviceBuffer<AtomicVector>,
    force: DeviceBuffer<AtomicVector>,
    nodes: DeviceBuffer<GridNode>,
}

impl GridBuffers {
    fn allocate(node_count: usize) -> MpmResult<Self> {
        Ok(Self {
            mass: DeviceBuffer::allocate_with("grid.mass", node_count, AtomicReal::default)?,
            momentum: DeviceBuffer::allocate_with("grid.momentum", node_count, AtomicVector::default)?,
            force: DeviceBuffer::allocate_with("grid.force", node_count, AtomicVector::default)?,
            nodes: DeviceBuffer::filled("grid.nodes", node_count, GridNode::zeroed())?,
        })
    }

    fn byte_size(&self) -> usize {
        self.mass.byte_size()
            + self.momentum.byte_size()
            + self.force.byte_size()
            + self.nodes.byte_size()
    }
}

/// Everything the device path owns. Dropping it releases every buffer once.
#[derive(Debug)]
pub struct DeviceState {
    resolution: NodeCoord,
    cell_width: Real,
    particles: ParticleBuffers,
    grid: GridBuffers,
    pool: ThreadPool,
}

impl DeviceState {
    /// Allocate every grid and particle buffer, or none of them.
    pub fn allocate(
        particle_count: usize,
        resolution: NodeCoord,
        cell_width: Real,
        worker_threads: usize,
    ) -> MpmResult<Self> {
        let node_count = resolution.x as usize * resolution.y as usize * resolution.z as usize;
        // Buffers allocated before a failure are dropped on the early return.
        let grid = GridBuffers::allocate(node_count)?;
        let particles = ParticleBuffers::allocate(particle_count)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads.max(1))
            .thread_name(|index| format!("mpm-device-{index}"))
            .build()
            .map_err(|err| MpmError::Resource(format!("cannot start device workers: {err}")))?;

        info!(
            "Allocated device state: {} particles, {} nodes, {} bytes, {} workers",
            particle_count,
            node_count,
            grid.byte_size() + particles.byte_size(),
            pool.current_num_threads()
        );
        Ok(Self {
            resolution,
            cell_width,
            particles,
            grid,
            pool,
        })
    }

    pub fn particle_count(&self) -> usize {
        self.particles.mass.len()
    }

    pub fn node_count(&self) -> usize {
        self.grid.nodes.len()
    }

    pub fn resolution(&self) -> NodeCoord {
        self.resolution
    }

    pub fn cell_width(&self) -> Real {
        self.cell_width
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn byte_size(&self) -> usize {
        self.particles.byte_size() + self.grid.byte_size()
    }

    /// Copy the whole host particle state into the device buffers.
    pub fn upload(&mut self, source: &ParticleSoa) -> MpmResult<()> {
        self.check_count(source.len())?;
        let buffers = &mut self.particles;
        buffers.mass.upload(&source.mass)?;
        buffers.volume0.upload(&source.volume0)?;
        buffers.material_type.upload(&source.material_type)?;
        buffers.position.upload(&source.position)?;
        buffers.velocity.upload(&source.velocity)?;
        buffers.deformation_gradient.upload(&source.deformation_gradient)?;
        buffers.volume_ratio.upload(&source.volume_ratio)?;
        buffers.affine_momentum.upload(&source.affine_momentum)?;
        Ok(())
    }

    /// Copy the evolving particle fields back to the host.
    pub fn download(&self, target: &mut ParticleSoa) -> MpmResult<()> {
        self.check_count(target.len())?;
        let buffers = &self.particles;
        buffers.position.download(&mut target.position)?;
        buffers.velocity.download(&mut target.velocity)?;
        buffers.deformation_gradient.download(&mut target.deformation_gradient)?;
        buffers.volume_ratio.download(&mut target.volume_ratio)?;
        buffers.affine_momentum.download(&mut target.affine_momentum)?;
        Ok(())
    }

    fn check_count(&self, host_count: usize) -> MpmResult<()> {
        if host_count != self.particle_count() {
            return Err(MpmError::Resource(format!(
                "device holds {} particles, host holds {}",
                self.particle_count(),
                host_count
            )));
        }
        Ok(())
    }

    pub fn clear_grid(&mut self) {
        let grid = &mut self.grid;
        self.pool.install(|| {
            grid.mass.as_slice().par_iter().for_each(|mass| mass.store(0.0));
            grid.momentum.as_slice().par_iter().for_each(AtomicVector::reset);
            grid.force.as_slice().par_iter().for_each(AtomicVector::reset);
            grid.nodes.as_mut_slice().par_iter_mut().for_each(GridNode::zero);
        });
    }

    pub fn enforce_domain(&mut self, policy: DomainPolicy) -> MpmResult<usize> {
        enforce_domain(
            &mut self.particles.position,
            self.resolution,
            self.cell_width,
            policy,
        )
    }

    /// Parallel scatter; conflicting writes meet in the atomic accumulators.
    pub fn p2g(&mut self, ctx: &StepContext) {
        let particles = &self.particles;
        let grid = &self.grid;
        let resolution = self.resolution;
        self.pool.install(|| {
            (0..particles.mass.len()).into_par_iter().for_each(|index| {
                let particle = particles.particle(index);
                for contribution in scatter_particle(&particle, ctx) {
                    let Some(node) = node_index(resolution, contribution.node) else {
                        continue;
                    };
                    grid.mass[node].fetch_add(contribution.mass);
                    grid.momentum[node].fetch_add(contribution.momentum);
                    grid.force[node].fetch_add(contribution.force);
                }
            });
        });
    }

    /// Resolve accumulators into node velocities, one task per node.
    pub fn update_grid(&mut self, ctx: &StepContext) {
        let grid = &mut self.grid;
        let (mass, momentum, force) = (&grid.mass, &grid.momentum, &grid.force);
        let resolution = self.resolution;
        self.pool.install(|| {
            grid.nodes
                .as_mut_slice()
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, node)| {
                    node.mass = mass[index].load();
                    node.momentum = momentum[index].load();
                    node.force = force[index].load();
                    update_node(node, coord_of(resolution, index), ctx);
                });
        });
    }

    /// Parallel gather. Returns the number of velocity clamps.
    ///
    /// A failing particle aborts the kernel with particles partly updated;
    /// the caller must re-upload before the next step.
    pub fn g2p(&mut self, ctx: &StepContext) -> MpmResult<usize> {
        let nodes = &self.grid.nodes;
        let resolution = self.resolution;
        let read_node = |coord: SignedCoord| node_index(resolution, coord).map(|index| nodes[index]);

        let ParticleBuffers {
            mass,
            volume0,
            material_type,
            position,
            velocity,
            deformation_gradient,
            volume_ratio,
            affine_momentum,
        } = &mut self.particles;
        let (mass, volume0, material_type) = (&*mass, &*volume0, &*material_type);

        self.pool.install(|| {
            (
                position.as_mut_slice().par_iter_mut(),
                velocity.as_mut_slice().par_iter_mut(),
                deformation_gradient.as_mut_slice().par_iter_mut(),
                volume_ratio.as_mut_slice().par_iter_mut(),
                affine_momentum.as_mut_slice().par_iter_mut(),
            )
                .into_par_iter()
                .enumerate()
                .map(|(index, (x, v, f, j, c))| {
                    let mut particle = Particle {
                        position: *x,
                        velocity: *v,
                        mass: mass[index],
                        volume0: volume0[index],
                        deformation_gradient: *f,
                        volume_ratio: *j,
                        affine_momentum_matrix: *c,
                        material_type: material_type[index],
                    };
                    let outcome = gather_particle(&mut particle, ctx, read_node)
                        .map_err(|reason| MpmError::NumericalInstability { index, reason })?;
                    *x = particle.position;
                    *v = particle.velocity;
                    *f = particle.deformation_gradient;
                    *j = particle.volume_ratio;
                    *c = particle.affine_momentum_matrix;
                    Ok(usize::from(outcome.velocity_clamped))
                })
                .try_reduce(|| 0, |a, b| Ok(a + b))
        })
    }

    /// Kinetic and gravitational potential energy of particles and grid.
    ///
    /// Grid terms use the node velocities of the last grid update.
    pub fn energy(&self, frame: u64, gravity: Vector) -> EnergySample {
        let particles = &self.particles;
        let nodes = &self.grid.nodes;
        let resolution = self.resolution;
        let cell_width = self.cell_width;
        self.pool.install(|| {
            let (particle_kinetic, particle_potential) = (0..particles.mass.len())
                .into_par_iter()
                .map(|index| {
                    let m = particles.mass[index];
                    (
                        0.5 * m * particles.velocity[index].length_squared(),
                        -m * gravity.dot(particles.position[index]),
                    )
                })
                .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

            let (grid_kinetic, grid_potential) = nodes
                .as_slice()
                .par_iter()
                .enumerate()
                .filter(|(_, node)| node.mass > 0.0)
                .map(|(index, node)| {
                    let position = coord_of(resolution, index).as_vec3() * cell_width;
                    (
                        0.5 * node.mass * node.velocity.length_squared(),
                        -node.mass * gravity.dot(position),
                    )
                })
                .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

            EnergySample {
                frame,
                particle_kinetic,
                particle_potential,
                grid_kinetic,
                grid_potential,
            }
        })
    }

    /// Mass resolved by the last grid update.
    pub fn grid_total_mass(&self) -> Real {
        self.grid.nodes.iter().map(|node| node.mass).sum()
    }

    /// AoS copy of device particle `index`.
    pub fn particle(&self, index: usize) -> Option<Particle> {
        (index < self.particle_count()).then(|| self.particles.particle(index))
    }
}
