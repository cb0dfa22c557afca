//! Processes acting on the parcel
//!
//! A process advances part of the parcel's state over one time step. Processes are
//! solved in the order they were registered with the
//! [`ModelBuilder`](crate::model::ModelBuilder) and mutate the shared [`ParcelContext`]
//! in place.

use crate::errors::{ParcelError, ParcelResult};
use crate::population::ParticlePopulation;
use crate::thermo::ThermodynamicState;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Everything a process may read or modify
///
/// Owned exclusively by the running model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelContext {
    pub state: ThermodynamicState,
    pub population: ParticlePopulation,
    /// Number of completed steps; while a step is solved, the index of that step
    pub step: usize,
}

impl ParcelContext {
    pub fn new(state: ThermodynamicState, population: ParticlePopulation) -> Self {
        Self {
            state,
            population,
            step: 0,
        }
    }

    /// Total water, vapour plus liquid
    /// unit: kg / kg dry air
    pub fn total_water(&self) -> f64 {
        self.state.r_v + self.population.liquid_water()
    }

    /// Re-derive the dry-air density and check the state and the wet radii for validity
    pub fn refresh(&mut self) -> ParcelResult<()> {
        self.state.refresh_density();
        self.state.check(self.step)?;

        for (i, class) in self.population.classes().iter().enumerate() {
            if !class.wet_radius.is_finite() {
                return Err(ParcelError::NonFinite {
                    step: self.step,
                    quantity: format!("wet radius of class {}", i),
                    value: class.wet_radius,
                });
            }
        }
        Ok(())
    }
}

/// A process that advances the parcel over `[t_current, t_next]`
///
/// Serialisable as a trait object so a built model can be persisted and restored.
#[typetag::serde(tag = "type")]
pub trait Process: Debug + Send + Sync {
    /// Solve the process for a single step
    fn solve(&self, t_current: Time, t_next: Time, context: &mut ParcelContext)
        -> ParcelResult<()>;
}
