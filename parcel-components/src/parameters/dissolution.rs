//! Dissolution Parameters
//!
//! Parameters for the repartitioning of a soluble trace species between size classes.

use parcel_core::errors::{ParcelError, ParcelResult};
use serde::{Deserialize, Serialize};

/// Parameters for trace-species dissolution
///
/// Each class relaxes toward a share of the trace species proportional to its affinity
///
/// $$a_i = H W_i + C_i$$
///
/// where $W_i$ is the class's liquid-water third moment, $C_i$ its insoluble core third
/// moment and $H$ the solubility. The relaxation rate is limited by transfer across the
/// droplet surface, $\lambda_i = 3 k_t / r_{w,i}$.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissolutionParameters {
    /// Mass-transfer velocity across the droplet surface
    /// unit: m / s
    /// default: 1e-6
    pub transfer_velocity: f64,

    /// Affinity of liquid water for the trace species relative to the insoluble core
    /// unit: dimensionless
    /// default: 1e3
    pub solubility: f64,
}

impl Default for DissolutionParameters {
    fn default() -> Self {
        Self {
            transfer_velocity: 1e-6,
            solubility: 1e3,
        }
    }
}

impl DissolutionParameters {
    pub fn validate(&self) -> ParcelResult<()> {
        let non_negative = [
            ("transfer_velocity", self.transfer_velocity),
            ("solubility", self.solubility),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ParcelError::InvalidConfiguration(format!(
                    "dissolution: {} = {} must not be negative",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
