pub mod bins;
pub mod config;
pub mod constants;
pub mod kohler;
pub mod model;
pub mod output;
pub mod population;
pub mod process;
pub mod thermo;
pub mod utils;

pub mod errors;

/// Time since the start of the ascent
/// unit: s
pub type Time = f64;
