//! Adiabatic parcel model of cloud droplet growth and aerosol dissolution
//!
//! A single air parcel rises at a constant vertical velocity and cools. Its aerosol
//! population takes up water by condensation and, optionally, exchanges a soluble trace
//! species between particles. Total water and total dry mass are conserved.
//!
//! [`parcel`] runs a complete simulation from [`ParcelOptions`]:
//!
//! ```no_run
//! use parcel::{parcel, ParcelOptions};
//!
//! let options = ParcelOptions::from_toml_str(
//!     r#"
//!     z_max = 100.0
//!     chem_dsl = true
//!     outfile = "parcel.json"
//!     out_bin = '{"radii": {"rght": 1e-4, "left": 1e-10, "drwt": "wet", "lnli": "log", "nbin": 26, "moms": [0, 3]}}'
//!     "#,
//! )
//! .unwrap();
//! let output = parcel(&options).unwrap();
//! println!("{} records", output.records.len());
//! ```

pub mod dataset;

use log::info;
use parcel_components::components::{Condensation, Dissolution};
use parcel_components::parameters::{CondensationParameters, DissolutionParameters};
use parcel_core::config::ParcelConfig;
use parcel_core::errors::ParcelResult;
use parcel_core::model::{ModelBuilder, ParcelModel};
use parcel_core::output::RunOutput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub use dataset::Dataset;
pub use parcel_core::errors::ParcelError;

/// Options for a complete parcel run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelOptions {
    /// Simulation options
    #[serde(flatten)]
    pub config: ParcelConfig,

    /// Where to write the dataset; nothing is written if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outfile: Option<PathBuf>,

    /// Enable dissolution of the trace species
    ///
    /// Default: false
    pub chem_dsl: bool,

    pub condensation: CondensationParameters,

    pub dissolution: DissolutionParameters,
}

impl ParcelOptions {
    /// Parse options from TOML; unspecified keys take their defaults
    pub fn from_toml_str(toml: &str) -> ParcelResult<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Check the process parameters; the simulation options are checked when the model
    /// is built
    pub fn validate(&self) -> ParcelResult<()> {
        self.condensation.validate()?;
        self.dissolution.validate()
    }

    /// Build the model these options describe without running it
    pub fn build_model(&self) -> ParcelResult<ParcelModel> {
        self.validate()?;

        let mut builder = ModelBuilder::new();
        builder
            .with_config(self.config.clone())
            .with_surface_tension(self.condensation.surface_tension)
            .with_process(Arc::new(Condensation::from_parameters(
                self.condensation.clone(),
            )));
        if self.chem_dsl {
            builder.with_process(Arc::new(Dissolution::from_parameters(
                self.dissolution.clone(),
            )));
        }
        builder.build()
    }
}

/// Run a parcel simulation to completion
///
/// When `outfile` is set the dataset is also written there.
///
/// # Errors
///
/// Configuration errors are reported before the first step. A numerical failure
/// during the run aborts it; no partial output is returned.
pub fn parcel(options: &ParcelOptions) -> ParcelResult<RunOutput> {
    let mut model = options.build_model()?;
    model.run()?;
    let output = model.into_output()?;

    if let Some(path) = &options.outfile {
        Dataset::from_output(&output).write(path)?;
        info!("Wrote {} records to {}", output.records.len(), path.display());
    }
    Ok(output)
}
