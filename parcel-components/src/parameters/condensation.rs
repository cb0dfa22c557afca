//! Condensation Parameters
//!
//! Parameters for diffusional growth and evaporation of solution droplets.
//!
//! # Reference
//!
//! Rogers, R. R. and Yau, M. K. (1989), A Short Course in Cloud Physics, chapter 7.

use parcel_core::errors::{ParcelError, ParcelResult};
use serde::{Deserialize, Serialize};

/// Parameters for condensational growth
///
/// The growth law is
///
/// $$\frac{d r^2}{dt} = \frac{2 (S - S_{eq}(r))}{F_k + F_d}$$
///
/// with $F_k$ the heat-conduction term and $F_d$ the vapour-diffusion term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondensationParameters {
    /// Number of substeps each step is split into
    /// default: 2
    pub substeps: usize,

    /// Thermal conductivity of air
    /// unit: W / (m K)
    /// default: 2.4e-2
    pub thermal_conductivity: f64,

    /// Diffusivity of water vapour in air at 273.15 K and 101325 Pa
    /// unit: m^2 / s
    /// default: 2.21e-5
    pub vapour_diffusivity: f64,

    /// Surface tension of the solution
    /// unit: N / m
    /// default: 0.072
    pub surface_tension: f64,

    /// Relative tolerance on the squared radius in the implicit solve
    /// default: 1e-12
    pub rtol: f64,

    /// Maximum bisection iterations per class and substep
    /// default: 200
    pub max_iterations: usize,
}

impl Default for CondensationParameters {
    fn default() -> Self {
        Self {
            substeps: 2,
            thermal_conductivity: 2.4e-2,
            vapour_diffusivity: 2.21e-5,
            surface_tension: 0.072,
            rtol: 1e-12,
            max_iterations: 200,
        }
    }
}

impl CondensationParameters {
    pub fn validate(&self) -> ParcelResult<()> {
        if self.substeps == 0 {
            return Err(invalid("substeps must be at least one"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least one"));
        }
        let positive = [
            ("thermal_conductivity", self.thermal_conductivity),
            ("vapour_diffusivity", self.vapour_diffusivity),
            ("surface_tension", self.surface_tension),
            ("rtol", self.rtol),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(&format!("{} = {} must be positive", name, value)));
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ParcelError {
    ParcelError::InvalidConfiguration(format!("condensation: {}", reason))
}
