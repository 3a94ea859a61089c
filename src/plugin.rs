use bevy::prelude::*;

use crate::config::EngineConfig;
use crate::core::Particle;
use crate::engine::Engine;
use crate::math::Real;

/// Fixed timestep handed to `Engine::integrate` every frame.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct StepSettings {
    pub dt: Real,
}

/// Inserts an `Engine` resource and steps it once per `Update` until the
/// configured target frame is reached.
pub struct MpmPlugin {
    pub config: EngineConfig,
    pub particles: Vec<Particle>,
    pub dt: Real,
}

impl Plugin for MpmPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(StepSettings { dt: self.dt })
            .add_systems(Update, step_engine);

        match build_engine(self.config.clone(), &self.particles) {
            Ok(engine) => {
                app.insert_resource(engine);
            }
            Err(err) => error!("Failed to build MPM engine: {}", err),
        }
    }
}

fn build_engine(config: EngineConfig, particles: &[Particle]) -> crate::MpmResult<Engine> {
    let mut engine = Engine::new(config)?;
    engine.add_particles(particles)?;
    engine.make_aos_to_soa();
    Ok(engine)
}

pub fn step_engine(settings: Res<StepSettings>, engine: Option<ResMut<Engine>>) {
    let Some(mut engine) = engine else {
        return;
    };
    if engine.is_finished() {
        return;
    }
    if let Err(err) = engine.integrate(settings.dt) {
        error!("MPM step failed at frame {}: {}", engine.current_frame(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialType;

    #[test]
    fn plugin_steps_until_target_frame() {
        let config = EngineConfig::default()
            .with_resolution(UVec3::splat(16), 1.0 / 16.0)
            .with_target_frame(2);
        let mut app = App::new();
        app.add_plugins(MpmPlugin {
            config,
            particles: vec![Particle::new(Vec3::splat(0.5), MaterialType::Water)],
            dt: 1e-3,
        });

        for _ in 0..4 {
            app.update();
        }
        let engine = app.world().resource::<Engine>();
        assert_eq!(engine.current_frame(), 2);
        assert_eq!(engine.particle_count(), 1);
        assert!(engine.particle(0).is_some_and(|p| p.velocity.y < 0.0));
    }
}
