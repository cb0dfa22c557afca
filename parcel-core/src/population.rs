//! Size-resolved aerosol and droplet population
//!
//! The population is held as a set of size classes, each representing `multiplicity`
//! identical particles per kg of dry air. Output bins are reduced from these classes by
//! the moment accumulator, so the classes are the finer internal resolution.
//!
//! # Dry volume quanta
//!
//! A class's dry third moment `n r_d^3` is not stored as a float. It is counted as an
//! integer number of quanta of a power-of-two size `q`, chosen at initialisation so that
//! the population total stays below 2^53 quanta. Every per-class, per-bin or total dry
//! third moment is then an integer multiple of `q` representable exactly in an `f64`,
//! and every sum of them is exact regardless of summation order. Moving dry mass
//! between classes only moves integers, so the total dry mass is invariant to the last
//! bit.
//!
//! The quanta are split into an insoluble `core` and a mobile `trace` part; only the
//! latter is moved by dissolution.

use crate::bins::RadiusKind;
use crate::constants::{FOUR_THIRDS_PI, RHO_W};
use crate::errors::{ParcelError, ParcelResult};
use crate::kohler::{equilibrium_wet_radius, kelvin_coefficient};
use crate::utils::summation::CompensatedSum;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Largest power of two the total dry quanta may reach
const QUANTA_BITS: i32 = 52;

/// Number of geometric standard deviations covered on either side of a mode's median
const MODE_HALF_WIDTH: f64 = 4.0;

/// Lognormal aerosol mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AerosolMode {
    /// Hygroscopicity parameter (> 0)
    ///
    /// Default: 0.61 (ammonium sulphate)
    pub kappa: f64,

    /// Median dry radius
    /// unit: m
    ///
    /// Default: 0.04e-6
    pub mean_r: f64,

    /// Geometric standard deviation (> 1)
    ///
    /// Default: 2.0
    pub gstdev: f64,

    /// Number concentration at the initial state
    /// unit: 1 / m^3
    ///
    /// Default: 566e6
    pub n_tot: f64,

    /// Fraction of each particle's dry volume held by the soluble trace species
    ///
    /// Must lie in `[0, 1)`; the remainder is an insoluble core.
    /// Default: 0.1
    pub trace_fraction: f64,
}

impl Default for AerosolMode {
    fn default() -> Self {
        Self {
            kappa: 0.61,
            mean_r: 0.04e-6,
            gstdev: 2.0,
            n_tot: 566e6,
            trace_fraction: 0.1,
        }
    }
}

impl AerosolMode {
    pub fn validate(&self, name: &str) -> ParcelResult<()> {
        let fail = |reason: &str| -> ParcelResult<()> {
            Err(ParcelError::InvalidConfiguration(format!(
                "aerosol mode '{}': {}",
                name, reason
            )))
        };
        if !(self.kappa > 0.0 && self.kappa.is_finite()) {
            return fail("kappa must be positive");
        }
        if !(self.mean_r > 0.0 && self.mean_r.is_finite()) {
            return fail("mean_r must be positive");
        }
        if !(self.gstdev > 1.0 && self.gstdev.is_finite()) {
            return fail("gstdev must be greater than one");
        }
        if !(self.n_tot >= 0.0 && self.n_tot.is_finite()) {
            return fail("n_tot must not be negative");
        }
        if !(0.0..1.0).contains(&self.trace_fraction) {
            return fail("trace_fraction must lie in [0, 1)");
        }
        Ok(())
    }

    /// Discretise the mode into `count` classes of equal width in `ln r`
    ///
    /// Returns `(dry_radius, multiplicity)` pairs with multiplicities per unit volume.
    fn discretise(&self, count: usize) -> Vec<(f64, f64)> {
        let ln_sigma = self.gstdev.ln();
        let ln_mu = self.mean_r.ln();
        let lo = ln_mu - MODE_HALF_WIDTH * ln_sigma;
        let width = 2.0 * MODE_HALF_WIDTH * ln_sigma / count as f64;
        let norm = self.n_tot / ((2.0 * PI).sqrt() * ln_sigma);

        (0..count)
            .map(|i| {
                let ln_r = lo + (i as f64 + 0.5) * width;
                let x = (ln_r - ln_mu) / ln_sigma;
                (ln_r.exp(), norm * (-0.5 * x * x).exp() * width)
            })
            .collect()
    }
}

/// A group of identical particles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeClass {
    /// Number of particles per kg of dry air
    pub multiplicity: f64,
    /// Hygroscopicity parameter
    pub kappa: f64,
    /// Insoluble part of the dry third moment, in quanta
    pub core_quanta: u64,
    /// Soluble trace part of the dry third moment, in quanta
    pub trace_quanta: u64,
    /// Wet radius
    /// unit: m
    pub wet_radius: f64,
}

impl SizeClass {
    pub fn dry_quanta(&self) -> u64 {
        self.core_quanta + self.trace_quanta
    }

    /// `n r_d^3`, exact multiple of the quantum
    pub fn dry_third_moment(&self, quantum: f64) -> f64 {
        self.dry_quanta() as f64 * quantum
    }

    /// Dry radius; zero for an empty class
    pub fn dry_radius(&self, quantum: f64) -> f64 {
        if self.multiplicity > 0.0 {
            (self.dry_third_moment(quantum) / self.multiplicity).cbrt()
        } else {
            0.0
        }
    }

    /// `n r_w^3`
    pub fn wet_third_moment(&self) -> f64 {
        self.multiplicity * self.wet_radius.powi(3)
    }

    /// Liquid water third moment, `n (r_w^3 - r_d^3)`
    pub fn water_third_moment(&self, quantum: f64) -> f64 {
        self.wet_third_moment() - self.dry_third_moment(quantum)
    }

    pub fn radius(&self, kind: RadiusKind, quantum: f64) -> f64 {
        match kind {
            RadiusKind::Wet => self.wet_radius,
            RadiusKind::Dry => self.dry_radius(quantum),
        }
    }

    /// Moment `n r^k` of the wet or dry radius
    ///
    /// The dry third moment uses the exact quantised value.
    pub fn moment(&self, kind: RadiusKind, order: u32, quantum: f64) -> f64 {
        if self.multiplicity <= 0.0 {
            return 0.0;
        }
        match (kind, order) {
            (_, 0) => self.multiplicity,
            (RadiusKind::Dry, 3) => self.dry_third_moment(quantum),
            (RadiusKind::Wet, 3) => self.wet_third_moment(),
            _ => self.multiplicity * self.radius(kind, quantum).powi(order as i32),
        }
    }
}

/// The particle population of the parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticlePopulation {
    classes: Vec<SizeClass>,
    /// Size of one dry quantum, a power of two
    /// unit: m^3 / kg dry air
    quantum: f64,
}

impl ParticlePopulation {
    /// Build a population from explicit classes
    ///
    /// # Errors
    ///
    /// If `quantum` is not a positive power of two, the total quanta reach 2^53, or a
    /// class has a negative multiplicity, dry mass without particles, or a wet radius
    /// below its dry radius.
    pub fn from_classes(classes: Vec<SizeClass>, quantum: f64) -> ParcelResult<Self> {
        if !(quantum > 0.0 && quantum.is_finite()) || quantum.log2().fract() != 0.0 {
            return Err(ParcelError::InvalidConfiguration(format!(
                "dry quantum {} is not a power of two",
                quantum
            )));
        }
        let population = Self { classes, quantum };
        if population.total_dry_quanta() >= 1u128 << 53 {
            return Err(ParcelError::InvalidConfiguration(
                "dry quanta exceed the exactly representable range".to_string(),
            ));
        }
        for (i, class) in population.classes.iter().enumerate() {
            if !(class.multiplicity >= 0.0 && class.multiplicity.is_finite()) {
                return Err(ParcelError::InvalidConfiguration(format!(
                    "class {} has invalid multiplicity {}",
                    i, class.multiplicity
                )));
            }
            if class.multiplicity == 0.0 && class.dry_quanta() > 0 {
                return Err(ParcelError::InvalidConfiguration(format!(
                    "class {} holds dry mass but no particles",
                    i
                )));
            }
            if class.wet_radius < class.dry_radius(quantum) {
                return Err(ParcelError::InvalidConfiguration(format!(
                    "class {} has a wet radius below its dry radius",
                    i
                )));
            }
        }
        Ok(population)
    }

    /// Initialise the population from lognormal modes in equilibrium with `saturation`
    ///
    /// # Arguments
    ///
    /// * `modes` - Aerosol modes; their order fixes the class order
    /// * `classes_per_mode` - Number of size classes per mode
    /// * `rho_d` - Initial dry-air density, converting `n_tot` to per kg dry air
    /// * `saturation` - Saturation ratio (< 1) the wet radii equilibrate to
    /// * `temperature` - Initial temperature
    /// * `surface_tension` - Surface tension of the solution
    pub fn initialise(
        modes: &BTreeMap<String, AerosolMode>,
        classes_per_mode: usize,
        rho_d: f64,
        saturation: f64,
        temperature: f64,
        surface_tension: f64,
    ) -> ParcelResult<Self> {
        if classes_per_mode == 0 {
            return Err(ParcelError::InvalidConfiguration(
                "at least one size class per mode is required".to_string(),
            ));
        }

        // (mode, dry radius, multiplicity per kg)
        let mut raw = Vec::new();
        for (name, mode) in modes {
            mode.validate(name)?;
            for (radius, concentration) in mode.discretise(classes_per_mode) {
                raw.push((mode, radius, concentration / rho_d));
            }
        }

        let total: CompensatedSum = raw.iter().map(|(_, r, n)| n * r.powi(3)).sum();
        let total = total.value();
        if !(total > 0.0 && total.is_finite()) {
            return Err(ParcelError::InvalidConfiguration(
                "aerosol modes contain no dry mass".to_string(),
            ));
        }
        let quantum = 2f64.powi(total.log2().ceil() as i32 - QUANTA_BITS);

        let a = kelvin_coefficient(temperature, surface_tension);
        let mut classes = Vec::with_capacity(raw.len());
        for (mode, radius, multiplicity) in raw {
            let quanta = (multiplicity * radius.powi(3) / quantum).round() as u64;
            if quanta == 0 || multiplicity <= 0.0 {
                debug!(
                    "Dropping size class at r_d = {:.3e} m with no resolvable dry mass",
                    radius
                );
                continue;
            }
            let trace = ((quanta as f64 * mode.trace_fraction).round() as u64).min(quanta - 1);

            let mut class = SizeClass {
                multiplicity,
                kappa: mode.kappa,
                core_quanta: quanta - trace,
                trace_quanta: trace,
                wet_radius: 0.0,
            };
            let dry_radius = class.dry_radius(quantum);
            class.wet_radius = equilibrium_wet_radius(saturation, dry_radius, mode.kappa, a)
                .ok_or_else(|| {
                    ParcelError::InvalidConfiguration(format!(
                        "no equilibrium wet radius at saturation ratio {}",
                        saturation
                    ))
                })?
                .max(dry_radius);
            classes.push(class);
        }

        debug!(
            "Initialised {} size classes with a dry quantum of {:e} m^3/kg",
            classes.len(),
            quantum
        );
        Self::from_classes(classes, quantum)
    }

    pub fn classes(&self) -> &[SizeClass] {
        &self.classes
    }

    /// Mutable access to the classes; the set of classes itself is fixed
    pub fn classes_mut(&mut self) -> &mut [SizeClass] {
        &mut self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn quantum(&self) -> f64 {
        self.quantum
    }

    pub fn total_dry_quanta(&self) -> u128 {
        self.classes.iter().map(|c| c.dry_quanta() as u128).sum()
    }

    pub fn total_trace_quanta(&self) -> u128 {
        self.classes.iter().map(|c| c.trace_quanta as u128).sum()
    }

    /// Total dry third moment, exact
    pub fn dry_third_moment(&self) -> f64 {
        self.total_dry_quanta() as f64 * self.quantum
    }

    /// Total wet third moment
    pub fn wet_third_moment(&self) -> f64 {
        self.classes
            .iter()
            .map(|c| c.wet_third_moment())
            .sum::<CompensatedSum>()
            .value()
    }

    /// Liquid water mixing ratio
    /// unit: kg / kg dry air
    pub fn liquid_water(&self) -> f64 {
        let moment: CompensatedSum = self
            .classes
            .iter()
            .map(|c| c.water_third_moment(self.quantum))
            .sum();
        moment.value() * FOUR_THIRDS_PI * RHO_W
    }

    /// Total number of particles per kg of dry air
    pub fn number(&self) -> f64 {
        self.classes
            .iter()
            .map(|c| c.multiplicity)
            .sum::<CompensatedSum>()
            .value()
    }
}
