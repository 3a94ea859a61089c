pub mod config;
pub mod core;
pub mod device;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod materials;
pub mod math;
pub mod plugin;
pub mod solver;

// Public re-exports for clean API
pub use config::{
    BOUND, Device, DomainPolicy, EngineConfig, GRAVITY, GridBackendType, IntegrationScheme,
    TransferScheme,
};
pub use crate::core::{BoundaryHandling, Grid, GridNode, Particle, ParticleSet, ParticleSoa};
pub use device::{DeviceCapability, DeviceState};
pub use diagnostics::{EnergyDiagnostics, EnergySample};
pub use engine::Engine;
pub use error::{MpmError, MpmResult};
pub use materials::{MaterialTable, MaterialType};
pub use math::{Real, Vector};
pub use plugin::{MpmPlugin, StepSettings};
