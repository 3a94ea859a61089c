//! Per-frame energy sequences for external monitoring.

use crate::config::DIAGNOSTICS_CAPACITY;
use crate::math::Real;

/// Energies measured at the end of one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergySample {
    /// Frame counter value before the step.
    pub frame: u64,
    pub particle_kinetic: Real,
    pub particle_potential: Real,
    pub grid_kinetic: Real,
    pub grid_potential: Real,
}

impl EnergySample {
    pub fn particle_total(&self) -> Real {
        self.particle_kinetic + self.particle_potential
    }

    pub fn grid_total(&self) -> Real {
        self.grid_kinetic + self.grid_potential
    }
}

/// Append-only energy history. Entry `i` belongs to the `i`-th recorded step.
#[derive(Clone, Debug, Default)]
pub struct EnergyDiagnostics {
    frames: Vec<u64>,
    particle_kinetic: Vec<Real>,
    particle_potential: Vec<Real>,
    grid_kinetic: Vec<Real>,
    grid_potential: Vec<Real>,
}

impl EnergyDiagnostics {
    pub fn new() -> Self {
        Self {
            frames: Vec::with_capacity(DIAGNOSTICS_CAPACITY),
            particle_kinetic: Vec::with_capacity(DIAGNOSTICS_CAPACITY),
            particle_potential: Vec::with_capacity(DIAGNOSTICS_CAPACITY),
            grid_kinetic: Vec::with_capacity(DIAGNOSTICS_CAPACITY),
            grid_potential: Vec::with_capacity(DIAGNOSTICS_CAPACITY),
        }
    }

    pub fn record(&mut self, sample: EnergySample) {
        self.frames.push(sample.frame);
        self.particle_kinetic.push(sample.particle_kinetic);
        self.particle_potential.push(sample.particle_potential);
        self.grid_kinetic.push(sample.grid_kinetic);
        self.grid_potential.push(sample.grid_potential);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[u64] {
        &self.frames
    }

    pub fn particle_kinetic(&self) -> &[Real] {
        &self.particle_kinetic
    }

    pub fn particle_potential(&self) -> &[Real] {
        &self.particle_potential
    }

    pub fn grid_kinetic(&self) -> &[Real] {
        &self.grid_kinetic
    }

    pub fn grid_potential(&self) -> &[Real] {
        &self.grid_potential
    }

    /// Sample recorded for `frame`, if that step ran on the device.
    pub fn sample(&self, frame: u64) -> Option<EnergySample> {
        let index = self.frames.binary_search(&frame).ok()?;
        Some(EnergySample {
            frame,
            particle_kinetic: self.particle_kinetic[index],
            particle_potential: self.particle_potential[index],
            grid_kinetic: self.grid_kinetic[index],
            grid_potential: self.grid_potential[index],
        })
    }

    pub fn latest(&self) -> Option<EnergySample> {
        self.frames.last().and_then(|&frame| self.sample(frame))
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.particle_kinetic.clear();
        self.particle_potential.clear();
        self.grid_kinetic.clear();
        self.grid_potential.clear();
    }
}
