//! Numerical helpers shared across the crate

pub mod roots;
pub mod summation;
