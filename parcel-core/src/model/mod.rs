//! A model couples the parcel's ascent with a chain of processes solved on fixed steps.
//!
//! The model owns the [`ParcelContext`](crate::process::ParcelContext) exclusively. Each
//! step the parcel is first lifted adiabatically, after which every registered process is
//! solved in registration order. After each process the dry-air density is re-derived and
//! the state checked, so a numerical failure is reported against the step and the quantity
//! that produced it.
//!
//! Records of the state and the binned population are taken before the first step, every
//! `outfreq` steps and after the final step.

mod builder;
mod runtime;


pub use builder::ModelBuilder;
pub use runtime::ParcelModel;

use crate::process::Process;
use std::sync::Arc;

/// Shared handle to a registered process
pub type P = Arc<dyn Process>;
