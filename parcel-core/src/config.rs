//! Simulation options
//!
//! [`ParcelConfig`] holds the options of a run. Keys keep their conventional spelling
//! (`T_0`, `RH_0`, `out_bin`, ...).
//!
//! ```rust
//! use parcel_core::config::ParcelConfig;
//!
//! let config = ParcelConfig::from_toml_str(
//!     r#"
//!     dt = 0.5
//!     z_max = 100.0
//!     T_0 = 290.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.n_steps(), 200);
//! assert_eq!(config.outfreq, 500);
//! ```

use crate::bins::OutputBins;
use crate::errors::{ParcelError, ParcelResult};
use crate::population::AerosolMode;
use crate::thermo::{mixing_ratio, saturation_vapour_pressure};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Initial relative humidity used when neither `r_0` nor `RH_0` is given
pub const DEFAULT_RH_0: f64 = 0.95;

/// Options controlling a parcel simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelConfig {
    /// Time step
    /// unit: s
    ///
    /// Default: 0.1
    pub dt: f64,

    /// Vertical velocity of the parcel
    /// unit: m / s
    ///
    /// Default: 1.0
    pub w: f64,

    /// Height at which the ascent stops
    /// unit: m
    ///
    /// Default: 200.0
    pub z_max: f64,

    /// Number of steps between output records
    ///
    /// Default: 500
    pub outfreq: usize,

    /// Initial temperature
    /// unit: K
    ///
    /// Default: 285.2
    #[serde(rename = "T_0")]
    pub t_0: f64,

    /// Initial pressure
    /// unit: Pa
    ///
    /// Default: 95000.0
    pub p_0: f64,

    /// Initial water-vapour mixing ratio
    /// unit: kg / kg dry air
    ///
    /// Mutually exclusive with `RH_0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_0: Option<f64>,

    /// Initial relative humidity
    ///
    /// Mutually exclusive with `r_0`. When neither is given [`DEFAULT_RH_0`] is used.
    #[serde(rename = "RH_0", skip_serializing_if = "Option::is_none")]
    pub rh_0: Option<f64>,

    /// Upper bound on the humidity the aerosol is equilibrated to at the start
    ///
    /// Default: 0.95
    #[serde(rename = "RH_max")]
    pub rh_max: f64,

    /// Number of size classes per aerosol mode
    ///
    /// Default: 64
    pub sd_conc: usize,

    /// Bulk density of the dry aerosol
    /// unit: kg / m^3
    ///
    /// Default: 1.8e3
    pub chem_rho: f64,

    /// Lognormal aerosol modes keyed by name
    ///
    /// Default: a single ammonium-sulphate-like mode
    pub aerosol: BTreeMap<String, AerosolMode>,

    /// Output partitions keyed by name
    ///
    /// Accepts either a table or an `out_bin` JSON string.
    #[serde(deserialize_with = "deserialize_out_bin")]
    pub out_bin: OutputBins,
}

impl Default for ParcelConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            w: 1.0,
            z_max: 200.0,
            outfreq: 500,
            t_0: 285.2,
            p_0: 95000.0,
            r_0: None,
            rh_0: None,
            rh_max: 0.95,
            sd_conc: 64,
            chem_rho: 1.8e3,
            aerosol: BTreeMap::from([(
                "ammonium_sulphate".to_string(),
                AerosolMode::default(),
            )]),
            out_bin: OutputBins::new(),
        }
    }
}

fn deserialize_out_bin<'de, D>(deserializer: D) -> Result<OutputBins, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Json(String),
        Table(OutputBins),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Json(json) => serde_json::from_str(&json).map_err(serde::de::Error::custom),
        Repr::Table(bins) => Ok(bins),
    }
}

impl ParcelConfig {
    /// Parse options from TOML; unspecified keys take their defaults
    ///
    /// The result is not validated; see [`ParcelConfig::validate`].
    pub fn from_toml_str(toml: &str) -> ParcelResult<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Number of steps needed to reach `z_max`
    ///
    /// `floor(z_max / (w dt))`, except that ratios within 1e-9 (relative) of an integer are
    /// rounded to it so that e.g. `200 / (1 * 0.1)` gives 2000 steps. Returns zero for
    /// non-positive or non-finite ratios.
    pub fn n_steps(&self) -> usize {
        let ratio = self.z_max / (self.w * self.dt);
        if !(ratio.is_finite() && ratio > 0.0) {
            return 0;
        }
        let nearest = ratio.round();
        let steps = if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
            nearest
        } else {
            ratio.floor()
        };
        steps as usize
    }

    /// Initial water-vapour mixing ratio from `r_0` or the initial humidity
    pub fn initial_mixing_ratio(&self) -> f64 {
        match self.r_0 {
            Some(r_0) => r_0,
            None => {
                let rh = self.rh_0.unwrap_or(DEFAULT_RH_0);
                mixing_ratio(self.p_0, rh * saturation_vapour_pressure(self.t_0))
            }
        }
    }

    /// Check every option, returning the first problem found
    pub fn validate(&self) -> ParcelResult<()> {
        positive("dt", self.dt)?;
        positive("w", self.w)?;
        positive("z_max", self.z_max)?;
        positive("T_0", self.t_0)?;
        positive("p_0", self.p_0)?;
        positive("chem_rho", self.chem_rho)?;

        if self.outfreq == 0 {
            return Err(invalid("outfreq must be at least one"));
        }
        if self.n_steps() == 0 {
            return Err(invalid(&format!(
                "z_max = {} is reached in less than one step of w * dt = {}",
                self.z_max,
                self.w * self.dt
            )));
        }
        if self.sd_conc == 0 {
            return Err(invalid("sd_conc must be at least one"));
        }

        match (self.r_0, self.rh_0) {
            (Some(_), Some(_)) => return Err(invalid("only one of r_0 and RH_0 may be set")),
            (Some(r_0), None) if !(r_0 >= 0.0 && r_0.is_finite()) => {
                return Err(invalid(&format!("r_0 = {} must not be negative", r_0)))
            }
            (None, Some(rh_0)) => positive("RH_0", rh_0)?,
            _ => {}
        }
        let e = saturation_vapour_pressure(self.t_0) * self.rh_0.unwrap_or(DEFAULT_RH_0);
        if self.r_0.is_none() && e >= self.p_0 {
            return Err(invalid("initial vapour pressure exceeds p_0"));
        }

        if !(self.rh_max > 0.0 && self.rh_max < 1.0) {
            return Err(invalid("RH_max must lie in (0, 1)"));
        }

        if self.aerosol.is_empty() {
            return Err(invalid("at least one aerosol mode is required"));
        }
        for (name, mode) in &self.aerosol {
            mode.validate(name)?;
        }
        for (name, spec) in &self.out_bin {
            spec.registry(name)?;
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> ParcelResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{} = {} must be positive", name, value)))
    }
}

fn invalid(reason: &str) -> ParcelError {
    ParcelError::InvalidConfiguration(reason.to_string())
}
