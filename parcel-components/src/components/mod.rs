//! Processes acting on the parcel's particle population
//!
//! - `Condensation`: diffusional growth and evaporation coupled to the vapour field
//! - `Dissolution`: repartitioning of a soluble trace species between size classes

mod condensation;
mod dissolution;

pub use condensation::Condensation;
pub use dissolution::{apportion, Dissolution};
