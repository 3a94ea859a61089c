#![allow(dead_code)]

use bevy::prelude::*;
use mpm3d::{EngineConfig, MaterialType, Particle, Real};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const RESOLUTION: u32 = 32;
pub const CELL: Real = 1.0 / 32.0;

pub fn config() -> EngineConfig {
    EngineConfig::default().with_resolution(UVec3::splat(RESOLUTION), CELL)
}

/// Seeded particle cloud inside `[low, high]^3`, well clear of the boundary
/// band for the defaults above.
pub fn cloud(seed: u64, count: usize, material: MaterialType, low: Real, high: Real) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(low..high),
                rng.random_range(low..high),
                rng.random_range(low..high),
            );
            let velocity = Vec3::new(
                rng.random_range(-0.2..0.2),
                rng.random_range(-0.2..0.2),
                rng.random_range(-0.2..0.2),
            );
            Particle::new(position, material)
                .with_velocity(velocity)
                .with_density(rng.random_range(0.5..1.5) * 1e-5, 1000.0)
        })
        .collect()
}

pub fn total_momentum(particles: &[Particle]) -> Vec3 {
    particles.iter().map(Particle::momentum).sum()
}

pub fn assert_vec_close(a: Vec3, b: Vec3, tolerance: Real) {
    assert!(
        (a - b).length() <= tolerance,
        "{a} and {b} differ by more than {tolerance}"
    );
}
