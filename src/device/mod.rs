//! Secondary execution domain: a worker pool with its own memory.
//!
//! Particle state is mirrored into device buffers, stepped there by parallel
//! kernels and read back at the end of each step.

pub mod atomic;
pub mod buffer;
pub mod capability;
pub mod state;

pub use atomic::{AtomicReal, AtomicVector};
pub use buffer::DeviceBuffer;
pub use capability::DeviceCapability;
pub use state::DeviceState;
