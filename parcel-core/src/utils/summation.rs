//! Compensated summation
//!
//! Mass budgets in the parcel model are accumulated over hundreds of size classes and
//! thousands of steps. A naive running sum loses the low-order bits of every small
//! contribution added to a large partial sum; the Neumaier variant of Kahan summation
//! carries those bits in a separate compensation term.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::AddAssign;

/// Running sum with Neumaier error compensation
///
/// The result depends on the order in which terms are added, so callers that need
/// reproducible results must add terms in a fixed order.
///
/// ```rust
/// use parcel_core::utils::summation::CompensatedSum;
///
/// let mut total = CompensatedSum::new();
/// total.add(1.0);
/// total.add(1e100);
/// total.add(1.0);
/// total.add(-1e100);
/// assert_eq!(total.value(), 2.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single term
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// The compensated total
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl AddAssign<f64> for CompensatedSum {
    fn add_assign(&mut self, value: f64) {
        self.add(value);
    }
}

impl Sum<f64> for CompensatedSum {
    fn sum<I: Iterator<Item = f64>>(iter: I) -> Self {
        let mut total = CompensatedSum::new();
        iter.for_each(|v| total.add(v));
        total
    }
}

impl<'a> Sum<&'a f64> for CompensatedSum {
    fn sum<I: Iterator<Item = &'a f64>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Sum a slice with compensation, in slice order
pub fn compensated_sum(values: &[f64]) -> f64 {
    values.iter().sum::<CompensatedSum>().value()
}
