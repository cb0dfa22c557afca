//! Model struct and runtime execution.

use crate::config::ParcelConfig;
use crate::errors::{ParcelError, ParcelResult};
use crate::output::{MomentAccumulator, OutputRecord, RunOutput};
use crate::process::ParcelContext;
use crate::thermo::ascend;
use crate::Time;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use super::P;

/// A rising parcel and the processes acting on it.
///
/// The model steps from `z = 0` to `z_max` in `n_steps` steps of `dt`. Every step the
/// parcel is lifted and then each process is solved in turn. Records are appended to an
/// in-memory sequence. A failed step is fatal: the model refuses any further steps and
/// yields no output.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParcelModel {
    config: ParcelConfig,
    /// Processes in solve order
    processes: Vec<P>,
    context: ParcelContext,
    accumulator: MomentAccumulator,
    n_steps: usize,
    records: Vec<OutputRecord>,
    /// Step at which the run failed, if it did
    #[serde(default)]
    failed_at: Option<usize>,
}

impl ParcelModel {
    /// Create a model from a validated configuration and its initial context.
    ///
    /// The initial state is recorded immediately.
    pub fn new(
        config: ParcelConfig,
        processes: Vec<P>,
        context: ParcelContext,
        accumulator: MomentAccumulator,
    ) -> Self {
        let n_steps = config.n_steps();
        let mut model = Self {
            config,
            processes,
            context,
            accumulator,
            n_steps,
            records: vec![],
            failed_at: None,
        };
        model.record();
        model
    }

    pub fn config(&self) -> &ParcelConfig {
        &self.config
    }

    /// The current parcel state and population.
    pub fn context(&self) -> &ParcelContext {
        &self.context
    }

    /// Number of completed steps.
    pub fn current_step(&self) -> usize {
        self.context.step
    }

    /// Total number of steps in the run.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Time since the start of the ascent.
    pub fn current_time(&self) -> Time {
        self.time_at(self.context.step)
    }

    fn time_at(&self, step: usize) -> Time {
        step as Time * self.config.dt
    }

    /// Records taken so far.
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    fn record(&mut self) {
        let record = self
            .accumulator
            .accumulate(&self.context, self.current_time());
        debug!(
            "Record at step {}: z = {:.2} m, T = {:.3} K, RH = {:.5}",
            record.step, record.state.z, record.state.t, record.rh
        );
        self.records.push(record);
    }

    /// Steps the model forward one time step.
    ///
    /// # Errors
    ///
    /// If the model has already finished or failed, or the ascent or a process produces
    /// a non-finite or unphysical state. The error names the step being solved.
    pub fn step(&mut self) -> ParcelResult<()> {
        if let Some(step) = self.failed_at {
            return Err(ParcelError::Error(format!(
                "model failed at step {} and cannot continue",
                step
            )));
        }
        if self.finished() {
            return Err(ParcelError::Error(format!(
                "model has already completed all {} steps",
                self.n_steps
            )));
        }

        let result = self.advance();
        if let Err(e) = &result {
            error!("Parcel run aborted at step {}: {}", self.context.step, e);
            self.failed_at = Some(self.context.step);
        }
        result
    }

    fn advance(&mut self) -> ParcelResult<()> {
        let t_current = self.current_time();
        self.context.step += 1;
        let step = self.context.step;
        let t_next = self.time_at(step);

        ascend(&mut self.context.state, self.config.dt, step)?;
        self.context.refresh()?;

        for process in &self.processes {
            process.solve(t_current, t_next, &mut self.context)?;
            self.context.refresh()?;
        }

        if step % self.config.outfreq == 0 || step == self.n_steps {
            self.record();
        }
        Ok(())
    }

    /// Steps the model until `z_max` is reached.
    pub fn run(&mut self) -> ParcelResult<()> {
        info!(
            "Running parcel model from step {} to {}",
            self.context.step, self.n_steps
        );
        while !self.finished() {
            self.step()?;
        }
        info!(
            "Parcel reached z = {:.2} m after {} steps ({} records)",
            self.context.state.z,
            self.n_steps,
            self.records.len()
        );
        Ok(())
    }

    /// Returns true if the model has no more steps to process.
    pub fn finished(&self) -> bool {
        self.context.step >= self.n_steps
    }

    /// Step at which the run failed, if a step has failed
    pub fn failed_at(&self) -> Option<usize> {
        self.failed_at
    }

    /// Consume the model, returning the records and the output metadata.
    ///
    /// # Errors
    ///
    /// If a step has failed; the records of a failed run are not usable.
    pub fn into_output(self) -> ParcelResult<RunOutput> {
        if let Some(step) = self.failed_at {
            return Err(ParcelError::Error(format!(
                "model failed at step {}; no output is available",
                step
            )));
        }
        Ok(RunOutput {
            chem_rho: self.config.chem_rho,
            dt: self.config.dt,
            w: self.config.w,
            z_max: self.config.z_max,
            outfreq: self.config.outfreq,
            partitions: self.accumulator.partitions().to_vec(),
            records: self.records,
        })
    }
}
