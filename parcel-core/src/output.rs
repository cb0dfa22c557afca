//! Reduction of the parcel state to output records
//!
//! At output cadence the [`MomentAccumulator`] bins every size class of the population
//! into each configured partition and sums the requested moments per bin. Records are
//! owned snapshots and never alias the running model.

use crate::bins::{BinRegistry, BinSpec, OutputBins};
use crate::errors::ParcelResult;
use crate::process::ParcelContext;
use crate::thermo::ThermodynamicState;
use crate::utils::summation::CompensatedSum;
use crate::Time;
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the scalar series available from [`RunOutput::series`]
pub const SERIES_NAMES: [&str; 8] = ["t", "z", "p", "T", "r_v", "rhod", "RH", "th_d"];

/// Name of the variable holding moment `order` of `partition`
pub fn moment_name(partition: &str, order: u32) -> String {
    format!("{}_m{}", partition, order)
}

/// A named output partition with its edge geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub spec: BinSpec,
    pub registry: BinRegistry,
}

/// Snapshot of the parcel at one output step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub step: usize,
    /// unit: s
    pub time: Time,
    pub state: ThermodynamicState,
    /// Relative humidity
    pub rh: f64,
    /// Dry potential temperature
    /// unit: K
    pub th_d: f64,
    /// Per-bin moments keyed by [`moment_name`]
    pub moments: BTreeMap<String, Vec<f64>>,
}

impl OutputRecord {
    /// Value of a scalar series at this record
    pub fn scalar(&self, name: &str) -> Option<f64> {
        let value = match name {
            "t" => self.time,
            "z" => self.state.z,
            "p" => self.state.p,
            "T" => self.state.t,
            "r_v" => self.state.r_v,
            "rhod" => self.state.rho_d,
            "RH" => self.rh,
            "th_d" => self.th_d,
            _ => return None,
        };
        Some(value)
    }

    pub fn moment(&self, partition: &str, order: u32) -> Option<&[f64]> {
        self.moments
            .get(&moment_name(partition, order))
            .map(|v| v.as_slice())
    }
}

/// Reduces the population to per-bin moments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentAccumulator {
    partitions: Vec<Partition>,
}

impl MomentAccumulator {
    /// Build the bin registries for every configured partition
    pub fn new(bins: &OutputBins) -> ParcelResult<Self> {
        let partitions = bins
            .iter()
            .map(|(name, spec)| {
                Ok(Partition {
                    name: name.clone(),
                    spec: spec.clone(),
                    registry: spec.registry(name)?,
                })
            })
            .collect::<ParcelResult<Vec<_>>>()?;
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Reduce the current context to a record
    ///
    /// Classes whose radius falls outside a partition's bounds do not contribute to it.
    pub fn accumulate(&self, context: &ParcelContext, time: Time) -> OutputRecord {
        let population = &context.population;
        let quantum = population.quantum();
        let mut moments = BTreeMap::new();

        for partition in &self.partitions {
            let kind = partition.spec.drwt;
            let nbin = partition.registry.len();
            let mut sums = vec![vec![CompensatedSum::new(); nbin]; partition.spec.moms.len()];

            for (index, class) in population.classes().iter().enumerate() {
                if class.multiplicity <= 0.0 {
                    continue;
                }
                let radius = class.radius(kind, quantum);
                let Some(bin) = partition.registry.bin_of(radius) else {
                    debug!(
                        "Step {}: class {} with {} radius {:.4e} m is outside partition '{}'",
                        context.step, index, kind, radius, partition.name
                    );
                    continue;
                };
                for (sum, order) in sums.iter_mut().zip(&partition.spec.moms) {
                    sum[bin] += class.moment(kind, *order, quantum);
                }
            }

            for (sum, order) in sums.into_iter().zip(&partition.spec.moms) {
                moments.insert(
                    moment_name(&partition.name, *order),
                    sum.iter().map(|s| s.value()).collect(),
                );
            }
        }

        OutputRecord {
            step: context.step,
            time,
            state: context.state,
            rh: context.state.relative_humidity(),
            th_d: context.state.dry_potential_temperature(),
            moments,
        }
    }
}

/// Result of a complete run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Bulk dry aerosol density
    /// unit: kg / m^3
    pub chem_rho: f64,
    pub dt: f64,
    pub w: f64,
    pub z_max: f64,
    pub outfreq: usize,
    pub partitions: Vec<Partition>,
    pub records: Vec<OutputRecord>,
}

impl RunOutput {
    /// Scalar series over all records, see [`SERIES_NAMES`]
    pub fn series(&self, name: &str) -> Option<Array1<f64>> {
        self.records
            .iter()
            .map(|record| record.scalar(name))
            .collect::<Option<Vec<_>>>()
            .map(Array1::from)
    }

    /// Moment `order` of `partition` with shape `[record, bin]`
    pub fn moment_matrix(&self, partition: &str, order: u32) -> Option<Array2<f64>> {
        let nbin = self.partition(partition)?.registry.len();
        let mut matrix = Array2::zeros((self.records.len(), nbin));
        for (mut row, record) in matrix.rows_mut().into_iter().zip(&self.records) {
            let values = record.moment(partition, order)?;
            row.assign(&Array1::from(values.to_vec()));
        }
        Some(matrix)
    }

    pub fn partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.name == name)
    }
}
