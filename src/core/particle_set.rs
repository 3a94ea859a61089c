use crate::core::Particle;
use crate::error::{MpmError, MpmResult};
use crate::materials::MaterialType;
use crate::math::{Matrix, Real, Vector, zero_vector};

/// Authoring collection of particles (array of structures).
///
/// Scene setup appends here. The solver never reads this directly; it runs
/// on the structure-of-arrays view built by `ParticleSoa::sync_from`.
#[derive(Clone, Debug, Default)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Append a batch. Every particle is validated first, so a rejected
    /// batch leaves the set untouched.
    pub fn insert_batch(&mut self, batch: &[Particle]) -> MpmResult<usize> {
        for (offset, particle) in batch.iter().enumerate() {
            particle
                .validate()
                .map_err(|reason| MpmError::InvalidParticle {
                    index: self.particles.len() + offset,
                    reason,
                })?;
        }
        self.particles.extend_from_slice(batch);
        Ok(batch.len())
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

/// Structure-of-arrays particle state: one contiguous array per field.
///
/// Particle `i` of the authoring set lives at index `i` of every array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleSoa {
    pub mass: Vec<Real>,
    pub velocity: Vec<Vector>,
    pub position: Vec<Vector>,
    pub deformation_gradient: Vec<Matrix>,
    pub volume_ratio: Vec<Real>,
    pub affine_momentum: Vec<Matrix>,
    pub volume0: Vec<Real>,
    pub material_type: Vec<MaterialType>,
}

impl ParticleSoa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    pub fn clear(&mut self) {
        self.mass.clear();
        self.velocity.clear();
        self.position.clear();
        self.deformation_gradient.clear();
        self.volume_ratio.clear();
        self.affine_momentum.clear();
        self.volume0.clear();
        self.material_type.clear();
    }

    pub fn push(&mut self, particle: &Particle) {
        self.mass.push(particle.mass);
        self.velocity.push(particle.velocity);
        self.position.push(particle.position);
        self.deformation_gradient
            .push(particle.deformation_gradient);
        self.volume_ratio.push(particle.volume_ratio);
        self.affine_momentum
            .push(particle.affine_momentum_matrix);
        self.volume0.push(particle.volume0);
        self.material_type.push(particle.material_type);
    }

    /// Bring the arrays in line with the authoring set.
    ///
    /// Particles already converted keep their simulated state; only the
    /// authoring tail is appended. Returns the number of particles converted.
    /// If the authoring set shrank, everything is rebuilt.
    pub fn sync_from(&mut self, authoring: &ParticleSet) -> usize {
        if authoring.len() < self.len() {
            self.clear();
        }
        let start = self.len();
        let pending = &authoring.particles()[start..];
        self.reserve(pending.len());
        for particle in pending {
            self.push(particle);
        }
        pending.len()
    }

    fn reserve(&mut self, additional: usize) {
        self.mass.reserve(additional);
        self.velocity.reserve(additional);
        self.position.reserve(additional);
        self.deformation_gradient.reserve(additional);
        self.volume_ratio.reserve(additional);
        self.affine_momentum.reserve(additional);
        self.volume0.reserve(additional);
        self.material_type.reserve(additional);
    }

    /// Gather particle `index` back into AoS form.
    pub fn particle(&self, index: usize) -> Option<Particle> {
        if index >= self.len() {
            return None;
        }
        Some(Particle {
            position: self.position[index],
            velocity: self.velocity[index],
            mass: self.mass[index],
            volume0: self.volume0[index],
            deformation_gradient: self.deformation_gradient[index],
            volume_ratio: self.volume_ratio[index],
            affine_momentum_matrix: self.affine_momentum[index],
            material_type: self.material_type[index],
        })
    }

    /// AoS copies of every particle, in index order.
    pub fn iter(&self) -> impl Iterator<Item = Particle> + '_ {
        (0..self.len()).filter_map(|index| self.particle(index))
    }

    /// Scatter an AoS particle into slot `index`. Mass, V0 and material stay fixed.
    pub fn store(&mut self, index: usize, particle: &Particle) {
        self.velocity[index] = particle.velocity;
        self.position[index] = particle.position;
        self.deformation_gradient[index] = particle.deformation_gradient;
        self.volume_ratio[index] = particle.volume_ratio;
        self.affine_momentum[index] = particle.affine_momentum_matrix;
    }

    pub fn total_mass(&self) -> Real {
        self.mass.iter().sum()
    }

    pub fn total_momentum(&self) -> Vector {
        self.mass
            .iter()
            .zip(&self.velocity)
            .fold(zero_vector(), |acc, (&m, &v)| acc + v * m)
    }

    pub fn kinetic_energy(&self) -> Real {
        self.mass
            .iter()
            .zip(&self.velocity)
            .map(|(&m, v)| 0.5 * m * v.length_squared())
            .sum()
    }

    /// Gravitational potential energy `-sum m g.x`.
    pub fn potential_energy(&self, gravity: Vector) -> Real {
        self.mass
            .iter()
            .zip(&self.position)
            .map(|(&m, x)| -m * gravity.dot(*x))
            .sum()
    }

    /// Largest particle speed, zero for an empty set.
    pub fn max_speed(&self) -> Real {
        self.velocity
            .iter()
            .map(|v| v.length())
            .fold(0.0, Real::max)
    }
}
