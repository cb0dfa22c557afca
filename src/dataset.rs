//! Array-oriented persistence of a run
//!
//! A [`Dataset`] has a netCDF-like layout of named dimensions, variables defined over
//! them and global attributes. It is stored as JSON.
//!
//! Variables:
//!
//! - `t`, `z`, `p`, `T`, `r_v`, `rhod`, `RH`, `th_d` over `[t]`
//! - `<partition>_m<order>` over `[t, <partition>]`
//! - `<partition>_r_left`, `<partition>_dr` over `[<partition>]`

use ndarray::{Array1, ArrayD};
use parcel_core::errors::ParcelResult;
use parcel_core::output::{moment_name, RunOutput, SERIES_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Name of the record dimension
pub const TIME_DIMENSION: &str = "t";

/// A variable and the dimensions it is defined over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub dimensions: Vec<String>,
    pub data: ArrayD<f64>,
}

/// Dimensions, variables and global attributes of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub dimensions: BTreeMap<String, usize>,
    pub variables: BTreeMap<String, Variable>,
    pub attributes: BTreeMap<String, f64>,
}

impl Dataset {
    pub fn from_output(output: &RunOutput) -> Self {
        let mut dimensions = BTreeMap::from([(TIME_DIMENSION.to_string(), output.records.len())]);
        let mut variables = BTreeMap::new();

        for name in SERIES_NAMES {
            if let Some(series) = output.series(name) {
                variables.insert(
                    name.to_string(),
                    Variable {
                        dimensions: vec![TIME_DIMENSION.to_string()],
                        data: series.into_dyn(),
                    },
                );
            }
        }

        for partition in &output.partitions {
            let name = &partition.name;
            dimensions.insert(name.clone(), partition.registry.len());

            for order in &partition.spec.moms {
                if let Some(matrix) = output.moment_matrix(name, *order) {
                    variables.insert(
                        moment_name(name, *order),
                        Variable {
                            dimensions: vec![TIME_DIMENSION.to_string(), name.clone()],
                            data: matrix.into_dyn(),
                        },
                    );
                }
            }

            let edges = [
                ("r_left", partition.registry.left_edges()),
                ("dr", partition.registry.widths()),
            ];
            for (suffix, values) in edges {
                variables.insert(
                    format!("{}_{}", name, suffix),
                    Variable {
                        dimensions: vec![name.clone()],
                        data: Array1::from(values).into_dyn(),
                    },
                );
            }
        }

        let attributes = BTreeMap::from([
            ("chem_rho".to_string(), output.chem_rho),
            ("dt".to_string(), output.dt),
            ("w".to_string(), output.w),
            ("z_max".to_string(), output.z_max),
            ("outfreq".to_string(), output.outfreq as f64),
        ]);

        Self {
            dimensions,
            variables,
            attributes,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }

    /// Write the dataset as JSON, replacing any existing file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> ParcelResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a dataset written by [`Dataset::write`]
    pub fn read<P: AsRef<Path>>(path: P) -> ParcelResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
