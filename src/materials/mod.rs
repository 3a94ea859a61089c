//! Materials for MPM simulation
//!
//! Three categories:
//!
//! * `fluids` - Water
//! * `solids` - Elastic jelly and snow
//! * `granular` - Sand with Drucker-Prager plasticity
//!
//! Each material owns exactly one stress function and one projection
//! function. `MaterialType` dispatches on its tag.

pub mod families;
pub mod fluids;
pub mod granular;
pub mod material_types;
pub mod solids;
pub mod utils;

// Re-export the main material type for convenience
pub use families::{ElasticParams, FluidParams, MaterialTable, SandParams, SnowParams};
pub use material_types::{ConstitutiveModel, MaterialState, MaterialType};

// Re-export physics utilities for easy access
pub use utils::check;
pub use utils::physics;
