//! Radius bins used to report the particle population
//!
//! A [`BinSpec`] is the user-facing description of one output partition, using the same
//! keys as the `out_bin` option string:
//!
//! ```json
//! {"wradii": {"rght": 1e-4, "left": 1e-10, "drwt": "wet", "lnli": "lin", "nbin": 500, "moms": [0, 3]}}
//! ```
//!
//! A [`BinRegistry`] is the immutable edge geometry built from a spec once at setup.
//!
//! # Examples
//!
//! ```rust
//! use parcel_core::bins::{BinRegistry, Spacing};
//!
//! let registry = BinRegistry::new(1e-9, 1e-6, 3, Spacing::Log).unwrap();
//! assert_eq!(registry.len(), 3);
//! assert_eq!(registry.bin_of(2e-9), Some(0));
//! assert_eq!(registry.bin_of(5e-7), Some(2));
//! assert_eq!(registry.bin_of(2e-6), None);
//! ```

use crate::errors::{ParcelError, ParcelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Edge spacing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spacing {
    #[serde(rename = "lin")]
    Lin,
    #[serde(rename = "log")]
    Log,
}

/// Which radius of a particle is binned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadiusKind {
    #[serde(rename = "wet")]
    Wet,
    #[serde(rename = "dry")]
    Dry,
}

impl fmt::Display for RadiusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadiusKind::Wet => write!(f, "wet"),
            RadiusKind::Dry => write!(f, "dry"),
        }
    }
}

/// Specification of one output partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    /// Right (upper) radius bound
    /// unit: m
    pub rght: f64,
    /// Left (lower) radius bound
    /// unit: m
    pub left: f64,
    /// Whether wet or dry radii are binned
    pub drwt: RadiusKind,
    /// Linear or logarithmic spacing
    pub lnli: Spacing,
    /// Number of bins
    pub nbin: usize,
    /// Requested moment orders
    pub moms: Vec<u32>,
}

impl BinSpec {
    /// Validate the spec and build its edge geometry
    pub fn registry(&self, partition: &str) -> ParcelResult<BinRegistry> {
        if self.moms.is_empty() {
            return Err(invalid(partition, "no moments requested"));
        }
        let mut seen = self.moms.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.moms.len() {
            return Err(invalid(partition, "duplicate moment orders"));
        }
        BinRegistry::new(self.left, self.rght, self.nbin, self.lnli).map_err(|e| match e {
            ParcelError::InvalidBinSpec { reason, .. } => invalid(partition, &reason),
            other => other,
        })
    }
}

/// Output partitions keyed by name, ordered by name
pub type OutputBins = BTreeMap<String, BinSpec>;

/// Parse an `out_bin` JSON string and validate every partition
pub fn parse_out_bin(json: &str) -> ParcelResult<OutputBins> {
    let bins: OutputBins = serde_json::from_str(json)?;
    for (name, spec) in &bins {
        spec.registry(name)?;
    }
    Ok(bins)
}

fn invalid(partition: &str, reason: &str) -> ParcelError {
    ParcelError::InvalidBinSpec {
        partition: partition.to_string(),
        reason: reason.to_string(),
    }
}

/// Immutable radius bin edges
///
/// Bins are half-open, `[edge_i, edge_{i+1})`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRegistry {
    edges: Vec<f64>,
    spacing: Spacing,
}

impl BinRegistry {
    /// Build `count` bins between `left` and `right`
    ///
    /// # Errors
    ///
    /// `ParcelError::InvalidBinSpec` if the bounds are not finite and ordered, the count
    /// is zero, or a logarithmic grid has a non-positive left bound.
    pub fn new(left: f64, right: f64, count: usize, spacing: Spacing) -> ParcelResult<Self> {
        if !left.is_finite() || !right.is_finite() {
            return Err(invalid("", "bounds must be finite"));
        }
        if left < 0.0 {
            return Err(invalid("", "left bound must not be negative"));
        }
        if left >= right {
            return Err(invalid(
                "",
                &format!("left bound {} must be below right bound {}", left, right),
            ));
        }
        if count == 0 {
            return Err(invalid("", "bin count must be positive"));
        }
        if spacing == Spacing::Log && left <= 0.0 {
            return Err(invalid("", "logarithmic bins need a positive left bound"));
        }

        let n = count as f64;
        let mut edges: Vec<f64> = match spacing {
            Spacing::Lin => {
                let width = (right - left) / n;
                (0..=count).map(|i| left + i as f64 * width).collect()
            }
            Spacing::Log => {
                let (ln_left, ln_right) = (left.ln(), right.ln());
                let width = (ln_right - ln_left) / n;
                (0..=count)
                    .map(|i| (ln_left + i as f64 * width).exp())
                    .collect()
            }
        };
        // Pin the outer edges to the requested bounds
        edges[0] = left;
        edges[count] = right;

        if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(invalid("", "bins are too narrow to be resolved"));
        }

        Ok(Self { edges, spacing })
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// All `len() + 1` edges
    pub fn all_edges(&self) -> &[f64] {
        &self.edges
    }

    /// Left and right edge of bin `index`
    pub fn edges(&self, index: usize) -> Option<(f64, f64)> {
        if index < self.len() {
            Some((self.edges[index], self.edges[index + 1]))
        } else {
            None
        }
    }

    /// Left edge of every bin
    pub fn left_edges(&self) -> Vec<f64> {
        self.edges[..self.len()].to_vec()
    }

    /// Width of every bin
    pub fn widths(&self) -> Vec<f64> {
        self.edges.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    /// Index of the bin containing `radius`, if any
    pub fn bin_of(&self, radius: f64) -> Option<usize> {
        if radius.is_nan() || radius < self.edges[0] || radius >= self.edges[self.len()] {
            return None;
        }
        // First edge strictly above the radius closes its bin
        let upper = self.edges.partition_point(|edge| *edge <= radius);
        Some(upper - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_edges() {
        let registry = BinRegistry::new(0.0, 1.0, 4, Spacing::Lin).unwrap();
        assert_eq!(registry.all_edges(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(registry.edges(1), Some((0.25, 0.5)));
        assert_eq!(registry.edges(4), None);
    }

    #[test]
    fn logarithmic_edges() {
        let registry = BinRegistry::new(1e-9, 1e-5, 4, Spacing::Log).unwrap();
        let expected = [1e-9, 1e-8, 1e-7, 1e-6, 1e-5];
        for (edge, want) in registry.all_edges().iter().zip(expected) {
            assert_relative_eq!(*edge, want, max_relative = 1e-12);
        }
    }

    #[test]
    fn bins_are_half_open() {
        let registry = BinRegistry::new(0.0, 1.0, 4, Spacing::Lin).unwrap();
        assert_eq!(registry.bin_of(0.0), Some(0));
        assert_eq!(registry.bin_of(0.25), Some(1));
        assert_eq!(registry.bin_of(0.2499), Some(0));
        assert_eq!(registry.bin_of(0.999), Some(3));
        assert_eq!(registry.bin_of(1.0), None);
        assert_eq!(registry.bin_of(-0.1), None);
        assert_eq!(registry.bin_of(f64::NAN), None);
    }

    #[test]
    fn fine_grid_from_the_conservation_scenario() {
        let registry = BinRegistry::new(1e-10, 1e-4, 500, Spacing::Lin).unwrap();
        assert_eq!(registry.len(), 500);
        assert_eq!(registry.widths().len(), 500);
        assert_eq!(registry.bin_of(1e-10), Some(0));
        assert_eq!(registry.bin_of(5e-8), Some(0));
        assert_eq!(registry.bin_of(9.99999e-5), Some(499));
        for index in 0..registry.len() {
            let (left, right) = registry.edges(index).unwrap();
            assert_eq!(registry.bin_of(0.5 * (left + right)), Some(index));
        }
    }

    #[test]
    fn rejects_invalid_geometry() {
        assert!(BinRegistry::new(1.0, 0.5, 4, Spacing::Lin).is_err());
        assert!(BinRegistry::new(0.0, 1.0, 0, Spacing::Lin).is_err());
        assert!(BinRegistry::new(0.0, 1.0, 4, Spacing::Log).is_err());
        assert!(BinRegistry::new(f64::NAN, 1.0, 4, Spacing::Lin).is_err());
    }

    #[test]
    fn parses_out_bin_string() {
        let bins = parse_out_bin(
            r#"{"wradii": {"rght": 1e-4, "left": 1e-10, "drwt": "wet", "lnli": "lin", "nbin": 500, "moms": [0, 3]},
                "dradii": {"rght": 1e-4, "left": 1e-10, "drwt": "dry", "lnli": "lin", "nbin": 500, "moms": [0, 3]}}"#,
        )
        .unwrap();

        assert_eq!(bins.len(), 2);
        let names: Vec<&str> = bins.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["dradii", "wradii"]);
        assert_eq!(bins["wradii"].drwt, RadiusKind::Wet);
        assert_eq!(bins["dradii"].drwt, RadiusKind::Dry);
        assert_eq!(bins["dradii"].lnli, Spacing::Lin);
        assert_eq!(bins["dradii"].moms, vec![0, 3]);
    }

    #[test]
    fn rejects_spec_without_moments() {
        let result = parse_out_bin(
            r#"{"x": {"rght": 1e-4, "left": 1e-10, "drwt": "wet", "lnli": "lin", "nbin": 5, "moms": []}}"#,
        );
        match result {
            Err(ParcelError::InvalidBinSpec { partition, .. }) => assert_eq!(partition, "x"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_spacing() {
        let result = parse_out_bin(
            r#"{"x": {"rght": 1e-4, "left": 1e-10, "drwt": "wet", "lnli": "cubic", "nbin": 5, "moms": [0]}}"#,
        );
        assert!(matches!(result, Err(ParcelError::Serialization(_))));
    }
}
