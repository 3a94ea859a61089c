//! Atomic accumulators for the parallel scatter.
//!
//! Floats are stored as their bit pattern in an `AtomicU32` and added with a
//! compare-exchange loop. Only the final sum matters, so `Relaxed` ordering is
//! enough; stage barriers provide visibility.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::math::{Real, Vector, zero_vector};

#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicReal(AtomicU32);

impl AtomicReal {
    pub fn new(value: Real) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> Real {
        Real::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: Real) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Add `value`, returning the previous sum.
    #[inline]
    pub fn fetch_add(&self, value: Real) -> Real {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (Real::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(previous) => return Real::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Three independent atomic components.
#[derive(Debug, Default)]
pub struct AtomicVector {
    x: AtomicReal,
    y: AtomicReal,
    z: AtomicReal,
}

impl AtomicVector {
    #[inline]
    pub fn load(&self) -> Vector {
        Vector::new(self.x.load(), self.y.load(), self.z.load())
    }

    #[inline]
    pub fn store(&self, value: Vector) {
        self.x.store(value.x);
        self.y.store(value.y);
        self.z.store(value.z);
    }

    #[inline]
    pub fn fetch_add(&self, value: Vector) {
        // Skipping zero components saves contention on sparse forces.
        if value.x != 0.0 {
            self.x.fetch_add(value.x);
        }
        if value.y != 0.0 {
            self.y.fetch_add(value.y);
        }
        if value.z != 0.0 {
            self.z.fetch_add(value.z);
        }
    }

    #[inline]
    pub fn reset(&self) {
        self.store(zero_vector());
    }
}
