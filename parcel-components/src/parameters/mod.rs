//! Process parameters
//!
//! Each process has an associated parameters struct with defaults suited to warm
//! cloud conditions.

mod condensation;
mod dissolution;

pub use condensation::CondensationParameters;
pub use dissolution::DissolutionParameters;
