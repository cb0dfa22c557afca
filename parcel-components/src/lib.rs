//! Microphysical and chemical processes for the parcel model
//!
//! Each process implements [`parcel_core::process::Process`] and is registered with a
//! [`parcel_core::model::ModelBuilder`] in the order it should be solved.
//!
//! # Parameters
//!
//! Each process has an associated parameters struct in the `parameters` module.

pub mod components;
pub mod parameters;
