//! Shared parameter packs for material families.
//!
//! These structs define the vocabulary we use when configuring families of
//! constitutive models. The engine owns one `MaterialTable` and hands it to
//! the transfer kernels by reference.

use crate::error::{MpmError, MpmResult};
use crate::materials::utils::{check, physics};
use crate::math::Real;

/// Isotropic elasticity expressed through Young's modulus and Poisson ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticParams {
    pub young_modulus: Real,
    pub poisson_ratio: Real,
}

impl ElasticParams {
    pub const fn new(young_modulus: Real, poisson_ratio: Real) -> Self {
        Self {
            young_modulus,
            poisson_ratio,
        }
    }

    /// `(lambda, mu)`.
    pub fn lame(&self) -> (Real, Real) {
        physics::lame_lambda_mu(self.young_modulus, self.poisson_ratio)
    }
}

impl Default for ElasticParams {
    fn default() -> Self {
        Self::new(1.0e4, 0.2)
    }
}

/// Snow: elasticity with hardening and singular value clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnowParams {
    pub elastic: ElasticParams,
    pub hardening: Real,
    pub critical_compression: Real,
    pub critical_stretch: Real,
}

impl Default for SnowParams {
    fn default() -> Self {
        Self {
            elastic: ElasticParams::new(1.4e4, 0.2),
            hardening: 10.0,
            critical_compression: 2.5e-2,
            critical_stretch: 7.5e-3,
        }
    }
}

/// Granular material with a Drucker-Prager yield surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandParams {
    pub elastic: ElasticParams,
    /// Internal friction angle in degrees.
    pub friction_angle: Real,
}

impl SandParams {
    /// Drucker-Prager cone coefficient.
    pub fn friction_alpha(&self) -> Real {
        let sin_phi = self.friction_angle.to_radians().sin();
        (2.0 / 3.0 as Real).sqrt() * 2.0 * sin_phi / (3.0 - sin_phi)
    }
}

impl Default for SandParams {
    fn default() -> Self {
        Self {
            elastic: ElasticParams::new(3.5e4, 0.3),
            friction_angle: 30.0,
        }
    }
}

/// Parameters describing a weakly compressible fluid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidParams {
    pub bulk_modulus: Real,
    pub dynamic_viscosity: Real,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            bulk_modulus: 1.0e4,
            dynamic_viscosity: 1.0e-3,
        }
    }
}

/// One parameter pack per material family.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaterialTable {
    pub elastic: ElasticParams,
    pub snow: SnowParams,
    pub sand: SandParams,
    pub fluid: FluidParams,
}

impl MaterialTable {
    pub fn validate(&self) -> MpmResult<()> {
        let packs = [
            ("elastic", self.elastic),
            ("snow", self.snow.elastic),
            ("sand", self.sand.elastic),
        ];
        for (name, pack) in packs {
            if !check::young_modulus_ok(pack.young_modulus)
                || !check::poisson_ratio_ok(pack.poisson_ratio)
            {
                return Err(MpmError::Configuration(format!(
                    "{name}: Young's modulus {} / Poisson ratio {} out of range",
                    pack.young_modulus, pack.poisson_ratio
                )));
            }
        }
        let snow = &self.snow;
        if !(snow.hardening >= 0.0 && snow.hardening.is_finite())
            || !(0.0..1.0).contains(&snow.critical_compression)
            || !(snow.critical_stretch >= 0.0 && snow.critical_stretch.is_finite())
        {
            return Err(MpmError::Configuration(format!(
                "snow hardening {} and critical stretch {} must be finite and non-negative, \
                 critical compression {} must lie in [0, 1)",
                snow.hardening, snow.critical_stretch, snow.critical_compression
            )));
        }
        if !(0.0..90.0).contains(&self.sand.friction_angle) {
            return Err(MpmError::Configuration(format!(
                "sand friction angle {} must lie in [0, 90)",
                self.sand.friction_angle
            )));
        }
        if !(self.fluid.bulk_modulus > 0.0) || !(self.fluid.dynamic_viscosity >= 0.0) {
            return Err(MpmError::Configuration(format!(
                "fluid bulk modulus {} must be positive and viscosity {} non-negative",
                self.fluid.bulk_modulus, self.fluid.dynamic_viscosity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        assert!(MaterialTable::default().validate().is_ok());

        let mut table = MaterialTable::default();
        table.sand.elastic.poisson_ratio = 0.5;
        assert!(table.validate().is_err());

        let mut table = MaterialTable::default();
        table.fluid.bulk_modulus = 0.0;
        assert!(table.validate().is_err());
    }

    #[test]
    fn snow_limits_must_be_finite_and_keep_clamp_positive() {
        let invalid = [
            SnowParams {
                hardening: Real::NAN,
                ..SnowParams::default()
            },
            SnowParams {
                critical_stretch: Real::NAN,
                ..SnowParams::default()
            },
            SnowParams {
                critical_compression: Real::NAN,
                ..SnowParams::default()
            },
            SnowParams {
                critical_compression: 1.0,
                ..SnowParams::default()
            },
            SnowParams {
                critical_stretch: Real::INFINITY,
                ..SnowParams::default()
            },
        ];
        for snow in invalid {
            let table = MaterialTable {
                snow,
                ..MaterialTable::default()
            };
            assert!(matches!(
                table.validate(),
                Err(MpmError::Configuration(_))
            ));
        }

        let table = MaterialTable {
            snow: SnowParams {
                critical_compression: 0.5,
                ..SnowParams::default()
            },
            ..MaterialTable::default()
        };
        assert!(table.validate().is_ok());
    }

    #[test]
    fn friction_alpha_grows_with_angle() {
        let low = SandParams {
            friction_angle: 20.0,
            ..SandParams::default()
        };
        let high = SandParams {
            friction_angle: 40.0,
            ..SandParams::default()
        };
        assert!(low.friction_alpha() > 0.0);
        assert!(high.friction_alpha() > low.friction_alpha());
    }
}
