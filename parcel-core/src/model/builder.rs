//! Model builder for constructing a parcel model from options and processes.

use crate::config::ParcelConfig;
use crate::errors::ParcelResult;
use crate::kohler::SURFACE_TENSION_WATER;
use crate::output::MomentAccumulator;
use crate::population::ParticlePopulation;
use crate::process::{ParcelContext, Process};
use crate::thermo::ThermodynamicState;
use log::{debug, info};
use std::sync::Arc;

use super::runtime::ParcelModel;
use super::P;

/// Build a new parcel model.
///
/// The builder validates the options, sets up the initial thermodynamic state and the
/// aerosol population in equilibrium with it, and fixes the order in which processes are
/// solved.
pub struct ModelBuilder {
    config: ParcelConfig,
    processes: Vec<P>,
    surface_tension: f64,
}

impl ModelBuilder {
    /// Create a new model builder with default options and no processes.
    pub fn new() -> Self {
        Self {
            config: ParcelConfig::default(),
            processes: vec![],
            surface_tension: SURFACE_TENSION_WATER,
        }
    }

    /// Set the simulation options.
    pub fn with_config(&mut self, config: ParcelConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Register a process with the builder.
    ///
    /// Processes are solved in the order they are registered.
    pub fn with_process(&mut self, process: Arc<dyn Process>) -> &mut Self {
        self.processes.push(process);
        self
    }

    /// Surface tension used to equilibrate the initial aerosol.
    ///
    /// Should match the value used by the condensation process.
    pub fn with_surface_tension(&mut self, surface_tension: f64) -> &mut Self {
        self.surface_tension = surface_tension;
        self
    }

    /// Builds the model.
    ///
    /// # Errors
    ///
    /// If the options are invalid or the initial state cannot be set up.
    pub fn build(&self) -> ParcelResult<ParcelModel> {
        let config = &self.config;
        config.validate()?;

        let state = ThermodynamicState::new(
            config.w,
            config.p_0,
            config.t_0,
            config.initial_mixing_ratio(),
        );
        state.check(0)?;

        let saturation = state.saturation_ratio().min(config.rh_max);
        debug!(
            "Equilibrating aerosol at a saturation ratio of {:.4} (RH_0 = {:.4})",
            saturation,
            state.relative_humidity()
        );
        let population = ParticlePopulation::initialise(
            &config.aerosol,
            config.sd_conc,
            state.rho_d,
            saturation,
            state.t,
            self.surface_tension,
        )?;

        let accumulator = MomentAccumulator::new(&config.out_bin)?;

        info!(
            "Built parcel model: {} steps, {} size classes, {} processes",
            config.n_steps(),
            population.len(),
            self.processes.len()
        );

        Ok(ParcelModel::new(
            config.clone(),
            self.processes.clone(),
            ParcelContext::new(state, population),
            accumulator,
        ))
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
