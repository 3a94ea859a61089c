//! The stepper: owns configuration, particles, grid and the optional device
//! mirror, and advances them one frame per `integrate` call.

use bevy::prelude::*;

use crate::config::{CFL_NUMBER, Device, DomainPolicy, EngineConfig, GRAVITY};
use crate::core::{Grid, Particle, ParticleSet, ParticleSoa};
use crate::device::{DeviceCapability, DeviceState};
use crate::diagnostics::EnergyDiagnostics;
use crate::error::{MpmError, MpmResult};
use crate::materials::MaterialTable;
use crate::math::{Real, Vector};
use crate::solver::{StepContext, enforce_domain, grid_to_particle, particle_to_grid, update_grid};

#[derive(Resource, Debug)]
pub struct Engine {
    config: EngineConfig,
    capability: DeviceCapability,
    grid: Grid,
    scene_particles: ParticleSet,
    particles: ParticleSoa,
    device: Option<DeviceState>,
    /// Host arrays changed since the last upload.
    device_dirty: bool,
    materials: MaterialTable,
    gravity: Vector,
    current_frame: u64,
    last_timestep: Real,
    diagnostics: EnergyDiagnostics,
}

impl Engine {
    /// Build an engine, probing the device domain once.
    pub fn new(config: EngineConfig) -> MpmResult<Self> {
        Self::with_capability(config, DeviceCapability::probe())
    }

    /// Build an engine against a known device capability.
    pub fn with_capability(config: EngineConfig, capability: DeviceCapability) -> MpmResult<Self> {
        let config = resolve_device(config, capability)?;
        let grid = build_grid(&config);
        info!(
            "MPM engine ready: grid {} x {}, {:?} transfer, {:?} backend, {:?} device",
            config.grid_resolution,
            config.grid_cell_size,
            config.transfer_scheme,
            config.grid_backend,
            config.device
        );
        Ok(Self {
            config,
            capability,
            grid,
            scene_particles: ParticleSet::new(),
            particles: ParticleSoa::new(),
            device: None,
            device_dirty: true,
            materials: MaterialTable::default(),
            gravity: GRAVITY,
            current_frame: 0,
            last_timestep: 0.0,
            diagnostics: EnergyDiagnostics::new(),
        })
    }

    /// Advance the simulation by one frame and return the timestep applied.
    ///
    /// On error the frame counter does not move and the host particle arrays
    /// keep their pre-step values, including positions `Clamp` would have moved.
    pub fn integrate(&mut self, dt: Real) -> MpmResult<Real> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(MpmError::InvalidTimestep(dt));
        }
        let pending = self.scene_particles.len().saturating_sub(self.particles.len());
        if pending > 0 {
            debug!(
                "{} particle(s) are not converted yet and will not be simulated",
                pending
            );
        }

        let dt = self.bounded_timestep(dt);
        match self.config.device {
            Device::Cpu => self.integrate_on_host(dt)?,
            Device::Gpu => self.integrate_on_device(dt)?,
        }
        self.current_frame += 1;
        self.last_timestep = dt;
        Ok(dt)
    }

    fn bounded_timestep(&self, dt: Real) -> Real {
        if !self.config.use_cfl_timestep {
            return dt;
        }
        let max_speed = self.particles.max_speed();
        if max_speed <= 0.0 {
            return dt;
        }
        let bound = CFL_NUMBER * self.config.grid_cell_size / max_speed;
        if bound < dt {
            debug!("CFL bound shrinks dt from {} to {}", dt, bound);
        }
        dt.min(bound)
    }

    fn integrate_on_host(&mut self, dt: Real) -> MpmResult<()> {
        let ctx = StepContext::new(&self.config, dt, self.gravity, &self.materials);
        let mut positions = self.particles.position.clone();
        let clamped = enforce_domain(
            &mut positions,
            self.config.grid_resolution,
            self.config.grid_cell_size,
            self.config.domain_policy,
        )?;
        if clamped > 0 {
            // `positions` now holds the unclamped values until G2P commits.
            std::mem::swap(&mut self.particles.position, &mut positions);
        }
        self.grid.clear();
        particle_to_grid(&self.particles, &mut self.grid, &ctx);
        update_grid(&mut self.grid, &ctx);
        if let Err(err) = grid_to_particle(&mut self.particles, &self.grid, &ctx) {
            if clamped > 0 {
                self.particles.position = positions;
            }
            return Err(err);
        }
        Ok(())
    }

    fn integrate_on_device(&mut self, dt: Real) -> MpmResult<()> {
        self.sync_device()?;
        let ctx = StepContext::new(&self.config, dt, self.gravity, &self.materials);
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| MpmError::Resource("device state was not allocated".to_string()))?;

        if let Err(err) = run_device_step(device, &ctx, self.config.domain_policy) {
            // Device particles may be half updated; the host copy is still whole.
            self.device_dirty = true;
            return Err(err);
        }

        let sample = device.energy(self.current_frame, self.gravity);
        self.diagnostics.record(sample);
        self.transfer_data_from_device()
    }

    /// Allocate device buffers if the particle count changed and upload the
    /// host arrays if they changed since the last upload.
    fn sync_device(&mut self) -> MpmResult<()> {
        if !self.capability.available {
            return Err(MpmError::Resource("no device is available".to_string()));
        }
        let count = self.particles.len();
        let stale = self
            .device
            .as_ref()
            .is_none_or(|device| device.particle_count() != count);
        if stale {
            // Release the old buffers before acquiring new ones.
            self.device = None;
            self.device = Some(DeviceState::allocate(
                count,
                self.config.grid_resolution,
                self.config.grid_cell_size,
                self.capability.worker_threads,
            )?);
            self.device_dirty = true;
        }
        if self.device_dirty {
            if let Some(device) = self.device.as_mut() {
                device.upload(&self.particles)?;
            }
            self.device_dirty = false;
        }
        Ok(())
    }

    /// Copy the host particle arrays into device buffers, allocating them on
    /// first use.
    pub fn transfer_data_to_device(&mut self) -> MpmResult<()> {
        self.device_dirty = true;
        self.sync_device()
    }

    /// Read the device particle state back into the host arrays. A no-op when
    /// nothing lives on the device.
    ///
    /// Refused while the host copy is newer than the device copy, which
    /// includes the half-updated buffers left behind by a failed step.
    pub fn transfer_data_from_device(&mut self) -> MpmResult<()> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };
        if self.device_dirty {
            return Err(MpmError::Resource(
                "device particle state is stale; upload before reading back".to_string(),
            ));
        }
        device.download(&mut self.particles)
    }

    /// Drop all state and start over from `particles` with `config`.
    ///
    /// Gravity and material parameters are kept. On error the engine is left
    /// as it was.
    pub fn reset(&mut self, particles: &[Particle], config: EngineConfig) -> MpmResult<()> {
        let config = resolve_device(config, self.capability)?;
        let mut scene_particles = ParticleSet::new();
        scene_particles.insert_batch(particles)?;

        self.device = None;
        self.grid = build_grid(&config);
        self.config = config;
        self.scene_particles = scene_particles;
        self.particles.clear();
        self.diagnostics.clear();
        self.current_frame = 0;
        self.last_timestep = 0.0;
        self.make_aos_to_soa();
        info!("Engine reset with {} particles", self.scene_particles.len());
        Ok(())
    }

    /// Append particles to the authoring set. Either all are added or none.
    ///
    /// New particles are simulated after the next `make_aos_to_soa`.
    pub fn add_particles(&mut self, particles: &[Particle]) -> MpmResult<usize> {
        self.scene_particles.insert_batch(particles)
    }

    pub fn delete_all_particles(&mut self) {
        self.scene_particles.clear();
        self.particles.clear();
        self.device = None;
        self.device_dirty = true;
    }

    /// Convert authoring particles not yet in the simulation arrays.
    /// Calling it again without new particles changes nothing.
    pub fn make_aos_to_soa(&mut self) -> usize {
        let converted = self.particles.sync_from(&self.scene_particles);
        if converted > 0 {
            self.device_dirty = true;
            debug!("Converted {} particle(s) to SoA", converted);
        }
        converted
    }

    pub fn set_gravity(&mut self, gravity: Vector) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vector {
        self.gravity
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn set_material_params(&mut self, materials: MaterialTable) -> MpmResult<()> {
        materials.validate()?;
        self.materials = materials;
        Ok(())
    }

    /// Number of authoring particles, converted or not.
    pub fn particle_count(&self) -> usize {
        self.scene_particles.len()
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_device_available(&self) -> bool {
        self.capability.available
    }

    /// Simulated particle state.
    pub fn particles(&self) -> &ParticleSoa {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> Option<Particle> {
        self.particles.particle(index)
    }

    pub fn particle_positions(&self) -> &[Vector] {
        &self.particles.position
    }

    pub fn scene_particles(&self) -> &ParticleSet {
        &self.scene_particles
    }

    /// Host grid as left by the last host step.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn energy_diagnostics(&self) -> &EnergyDiagnostics {
        &self.diagnostics
    }

    pub fn last_timestep(&self) -> Real {
        self.last_timestep
    }

    pub fn is_finished(&self) -> bool {
        self.current_frame >= u64::from(self.config.target_frame)
    }
}

fn resolve_device(mut config: EngineConfig, capability: DeviceCapability) -> MpmResult<EngineConfig> {
    config.validate()?;
    if config.device == Device::Gpu && !capability.available {
        warn!("Device execution requested but no device is available, falling back to CPU");
        config.device = Device::Cpu;
    }
    Ok(config)
}

fn build_grid(config: &EngineConfig) -> Grid {
    let res = config.grid_resolution;
    Grid::new(res.x, res.y, res.z, config.grid_cell_size, config.grid_backend)
}

fn run_device_step(
    device: &mut DeviceState,
    ctx: &StepContext,
    policy: DomainPolicy,
) -> MpmResult<()> {
    device.enforce_domain(policy)?;
    device.clear_grid();
    device.p2g(ctx);
    device.update_grid(ctx);
    let clamped = device.g2p(ctx)?;
    if clamped > 0 {
        warn!(
            "Clamped velocity of {} particle(s) to {}",
            clamped, ctx.max_velocity
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferScheme;
    use crate::materials::MaterialType;

    fn small_config() -> EngineConfig {
        EngineConfig::default().with_resolution(UVec3::splat(16), 1.0 / 16.0)
    }

    fn block(material: MaterialType) -> Vec<Particle> {
        let mut particles = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    let position = Vec3::new(0.4, 0.4, 0.4) + Vec3::new(i as f32, j as f32, k as f32) * 0.03;
                    particles.push(Particle::new(position, material).with_density(1e-4, 1000.0));
                }
            }
        }
        particles
    }

    #[test]
    fn new_engine_is_empty_at_frame_zero() {
        let engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        assert_eq!(engine.particle_count(), 0);
        assert_eq!(engine.current_frame(), 0);
        assert_eq!(engine.gravity(), GRAVITY);
        assert!(!engine.is_device_available());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig::default().with_resolution(UVec3::new(0, 8, 8), 0.1);
        assert!(matches!(
            Engine::with_capability(config, DeviceCapability::unavailable()),
            Err(MpmError::Configuration(_))
        ));
    }

    #[test]
    fn negative_timestep_is_rejected() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        assert_eq!(engine.integrate(-1.0), Err(MpmError::InvalidTimestep(-1.0)));
        assert!(engine.integrate(Real::NAN).is_err());
        assert_eq!(engine.current_frame(), 0);
    }

    #[test]
    fn integrate_advances_frame() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        engine.add_particles(&block(MaterialType::Elastic)).unwrap();
        assert_eq!(engine.make_aos_to_soa(), 64);

        for frame in 1..=3 {
            let applied = engine.integrate(1e-4).unwrap();
            assert_eq!(applied, 1e-4);
            assert_eq!(engine.current_frame(), frame);
        }
        assert!(engine.particles().velocity.iter().all(|v| v.y < 0.0));
        // Diagnostics are only recorded on the device path.
        assert!(engine.energy_diagnostics().is_empty());
    }

    #[test]
    fn cfl_bound_limits_timestep() {
        let config = small_config().with_cfl_timestep(true);
        let mut engine = Engine::with_capability(config, DeviceCapability::unavailable()).unwrap();
        engine
            .add_particles(&[Particle::new(Vec3::splat(0.5), MaterialType::Water)
                .with_velocity(Vec3::new(2.0, 0.0, 0.0))])
            .unwrap();
        engine.make_aos_to_soa();
        engine.set_gravity(Vec3::ZERO);

        let applied = engine.integrate(1.0).unwrap();
        let bound = CFL_NUMBER * (1.0 / 16.0) / 2.0;
        assert!((applied - bound).abs() < 1e-6);
        assert_eq!(engine.last_timestep(), applied);
    }

    #[test]
    fn unconverted_particles_are_not_simulated() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        engine.add_particles(&block(MaterialType::Sand)).unwrap();
        assert_eq!(engine.particle_count(), 64);
        assert!(engine.particles().is_empty());
        engine.integrate(1e-4).unwrap();
        assert_eq!(engine.make_aos_to_soa(), 64);
        assert_eq!(engine.make_aos_to_soa(), 0);
    }

    #[test]
    fn reset_restarts_from_scratch() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        engine.add_particles(&block(MaterialType::Snow)).unwrap();
        engine.make_aos_to_soa();
        engine.integrate(1e-4).unwrap();

        let config = small_config().with_transfer_scheme(TransferScheme::Flip);
        let particles = [Particle::new(Vec3::splat(0.5), MaterialType::Water)];
        engine.reset(&particles, config.clone()).unwrap();
        assert_eq!(engine.current_frame(), 0);
        assert_eq!(engine.particle_count(), 1);
        assert_eq!(engine.particles().len(), 1);
        assert_eq!(engine.engine_config(), &config);
    }

    #[test]
    fn failed_reset_keeps_state() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        engine.add_particles(&block(MaterialType::Elastic)).unwrap();
        engine.make_aos_to_soa();
        engine.integrate(1e-4).unwrap();

        let bad = [Particle::new(Vec3::splat(0.5), MaterialType::Water).with_mass(0.0)];
        assert!(engine.reset(&bad, small_config()).is_err());
        assert_eq!(engine.current_frame(), 1);
        assert_eq!(engine.particle_count(), 64);
    }

    #[test]
    fn failed_host_step_discards_clamped_positions() {
        let config = small_config().with_domain_policy(DomainPolicy::Clamp);
        let mut engine = Engine::with_capability(config, DeviceCapability::unavailable()).unwrap();
        let mut overstretched = Particle::new(Vec3::splat(0.5), MaterialType::Elastic);
        overstretched.deformation_gradient = Mat3::from_diagonal(Vec3::new(1e20, 1.0, 1.0));
        let stray = Particle::new(Vec3::new(0.99, 0.5, 0.5), MaterialType::Water);
        engine.add_particles(&[overstretched, stray]).unwrap();
        engine.make_aos_to_soa();
        let before = engine.particles().clone();

        assert!(matches!(
            engine.integrate(1e-4),
            Err(MpmError::NumericalInstability { .. })
        ));
        assert_eq!(engine.current_frame(), 0);
        assert_eq!(engine.particles(), &before);
        assert_eq!(engine.particle_positions()[1], Vec3::new(0.99, 0.5, 0.5));
    }

    #[test]
    fn material_params_are_validated() {
        let mut engine = Engine::with_capability(small_config(), DeviceCapability::unavailable()).unwrap();
        let mut table = MaterialTable::default();
        table.elastic.young_modulus = -5.0;
        assert!(engine.set_material_params(table).is_err());
        assert_eq!(engine.materials(), &MaterialTable::default());
    }

    #[test]
    fn target_frame_marks_finish() {
        let config = small_config().with_target_frame(2);
        let mut engine = Engine::with_capability(config, DeviceCapability::unavailable()).unwrap();
        assert!(!engine.is_finished());
        engine.integrate(1e-4).unwrap();
        engine.integrate(1e-4).unwrap();
        assert!(engine.is_finished());
    }
}
