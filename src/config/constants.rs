// Physical and numerical constants for the MPM engine
use bevy::prelude::*;

use crate::math::Real;

// Global physics
pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Nodes within this many cells of a grid face have their outward velocity removed.
pub const BOUND: u32 = 3;

/// Courant number used when the adaptive timestep is enabled.
pub const CFL_NUMBER: Real = 0.4;

/// FLIP/PIC blend, 1.0 is pure FLIP.
pub const FLIP_BLEND: Real = 0.95;

/// Particle speeds above this are clamped after G2P.
pub const MAX_VELOCITY: Real = 1.0e3;

// Grid defaults
pub const DEFAULT_GRID_RESOLUTION: u32 = 64;
pub const DEFAULT_CELL_SIZE: Real = 1.0 / 64.0;
pub const DEFAULT_TARGET_FRAME: u32 = 1000;

/// Capacity reserved up front for each energy diagnostic sequence.
pub const DIAGNOSTICS_CAPACITY: usize = 1000;
