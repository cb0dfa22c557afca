//! Dissolution Component
//!
//! Moves a soluble trace species between size classes as droplets take up water.
//!
//! # What This Component Does
//!
//! 1. Assigns every class an affinity for the trace species,
//!    $a_i = H W_i + C_i$, from its liquid water $W_i$ and insoluble core $C_i$
//!    (both third moments).
//!
//! 2. Relaxes the trace held by each class toward its equilibrium share
//!    $t^*_i = T a_i / \sum_j a_j$ at a rate limited by transfer across the droplet
//!    surface:
//!
//!    $$t'_i = t_i + (t^*_i - t_i)\left(1 - e^{-3 k_t \Delta t / r_{w,i}}\right)$$
//!
//! 3. Converts the relaxed shares back to whole quanta by cumulative rounding, so the
//!    new shares sum to exactly the same number of quanta as before.
//!
//! 4. Keeps the liquid water of every class unchanged: the wet volume changes by the
//!    dry volume gained or lost.
//!
//! # Conservation
//!
//! The trace is counted in dry-volume quanta (see
//! [`parcel_core::population`]), so the population's dry mass is unchanged to the last
//! bit by every step.

use crate::parameters::DissolutionParameters;
use log::{debug, warn};
use parcel_core::errors::ParcelResult;
use parcel_core::population::SizeClass;
use parcel_core::process::{ParcelContext, Process};
use parcel_core::utils::summation::CompensatedSum;
use parcel_core::Time;
use serde::{Deserialize, Serialize};

/// Redistribution of a soluble trace species between size classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dissolution {
    pub parameters: DissolutionParameters,
}

impl Dissolution {
    pub fn new() -> Self {
        Self::from_parameters(DissolutionParameters::default())
    }

    pub fn from_parameters(parameters: DissolutionParameters) -> Self {
        Self { parameters }
    }

    /// Affinity of a class for the trace species; zero for an empty class
    pub fn affinity(&self, class: &SizeClass, quantum: f64) -> f64 {
        if class.multiplicity <= 0.0 {
            return 0.0;
        }
        let water = class.water_third_moment(quantum).max(0.0);
        self.parameters.solubility * water + class.core_quanta as f64 * quantum
    }

    /// Fraction of the distance to equilibrium covered in `dt`
    pub fn relaxation(&self, wet_radius: f64, dt: Time) -> f64 {
        let rate = 3.0 * self.parameters.transfer_velocity / wet_radius;
        -(-rate * dt).exp_m1()
    }
}

/// Split `total` quanta in proportion to `weights` by cumulative rounding
///
/// The result always sums to `total`, and a zero weight always receives zero quanta.
/// Weights must be non-negative; if they sum to zero, `None` is returned.
pub fn apportion(weights: &[f64], total: u64) -> Option<Vec<u64>> {
    let sum = weights.iter().sum::<CompensatedSum>().value();
    if !(sum > 0.0 && sum.is_finite()) {
        return None;
    }

    // Exactly one when the weights already sum to the total
    let scale = total as f64 / sum;
    // The remainder goes to the last positive weight
    let last = weights.iter().rposition(|w| *w > 0.0)?;

    let mut shares = Vec::with_capacity(weights.len());
    let mut prefix = CompensatedSum::new();
    let mut assigned = 0u64;
    for (i, weight) in weights.iter().enumerate() {
        prefix += *weight;
        let cumulative = if i >= last {
            total
        } else {
            ((prefix.value() * scale).round() as u64).clamp(assigned, total)
        };
        shares.push(cumulative - assigned);
        assigned = cumulative;
    }
    Some(shares)
}

impl Default for Dissolution {
    fn default() -> Self {
        Self::new()
    }
}

#[typetag::serde]
impl Process for Dissolution {
    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        context: &mut ParcelContext,
    ) -> ParcelResult<()> {
        let dt = t_next - t_current;
        let quantum = context.population.quantum();
        let total = context.population.total_trace_quanta() as u64;
        if total == 0 {
            return Ok(());
        }

        let classes = context.population.classes();
        let affinities: Vec<f64> = classes
            .iter()
            .map(|class| self.affinity(class, quantum))
            .collect();
        let affinity_sum = affinities.iter().sum::<CompensatedSum>().value();
        if !(affinity_sum > 0.0) {
            return Ok(());
        }

        let relaxed: Vec<f64> = classes
            .iter()
            .zip(&affinities)
            .map(|(class, affinity)| {
                if class.multiplicity <= 0.0 {
                    return 0.0;
                }
                let current = class.trace_quanta as f64;
                let target = total as f64 * affinity / affinity_sum;
                current + (target - current) * self.relaxation(class.wet_radius, dt)
            })
            .collect();

        let Some(shares) = apportion(&relaxed, total) else {
            return Ok(());
        };

        let mut moved = 0u64;
        for (class, trace) in context.population.classes_mut().iter_mut().zip(shares) {
            if trace == class.trace_quanta {
                continue;
            }
            moved += trace.abs_diff(class.trace_quanta);

            let before = class.dry_third_moment(quantum);
            class.trace_quanta = trace;
            let gained = class.dry_third_moment(quantum) - before;

            let wet_volume = class.wet_radius.powi(3) + gained / class.multiplicity;
            let dry_radius = class.dry_radius(quantum);
            let wet_radius = wet_volume.cbrt();
            if wet_radius < dry_radius * (1.0 - 1e-12) {
                warn!(
                    "Step {}: wet radius {:.6e} m clamped to dry radius {:.6e} m",
                    context.step, wet_radius, dry_radius
                );
            }
            class.wet_radius = wet_radius.max(dry_radius);
        }

        debug!(
            "Step {}: moved {} of {} trace quanta",
            context.step, moved / 2, total
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;
    use parcel_core::kohler::SURFACE_TENSION_WATER;
    use parcel_core::population::{AerosolMode, ParticlePopulation};
    use parcel_core::thermo::ThermodynamicState;
    use std::collections::BTreeMap;

    fn context() -> ParcelContext {
        let state = ThermodynamicState::new(1.0, 90000.0, 283.0, 8e-3);
        let modes = BTreeMap::from([
            ("fine".to_string(), AerosolMode::default()),
            (
                "coarse".to_string(),
                AerosolMode {
                    kappa: 0.1,
                    mean_r: 0.2e-6,
                    n_tot: 50e6,
                    trace_fraction: 0.5,
                    ..AerosolMode::default()
                },
            ),
        ]);
        let population =
            ParticlePopulation::initialise(&modes, 24, state.rho_d, 0.98, 283.0, SURFACE_TENSION_WATER)
                .unwrap();
        ParcelContext::new(state, population)
    }

    // ===== Apportioning Tests =====

    #[test]
    fn test_apportion_sums_to_total() {
        let weights = [0.3, 1.7, 0.0, 2.2, 1e-9, 5.0];
        for total in [0u64, 1, 7, 1000, (1 << 52) + 12345] {
            let shares = apportion(&weights, total).unwrap();
            assert_eq!(shares.iter().sum::<u64>(), total);
            assert_eq!(shares[2], 0);
        }
    }

    #[test]
    fn test_apportion_is_proportional() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let shares = apportion(&weights, 1_000_003).unwrap();
        for (share, weight) in shares.iter().zip(weights) {
            let expected = 1_000_003.0 * weight / 10.0;
            assert!((*share as f64 - expected).abs() <= 1.0);
        }
    }

    #[test]
    fn test_apportion_keeps_integer_weights() {
        let weights = [17.0, 0.0, 123456789.0, 3.0];
        let shares = apportion(&weights, 123456809).unwrap();
        assert_eq!(shares, vec![17, 0, 123456789, 3]);
    }

    #[test]
    fn test_apportion_gives_nothing_to_trailing_zero_weights() {
        let third = 1.0 / 3.0;
        for total in [1u64, 10, 1_000_001, (1 << 52) - 1] {
            let shares = apportion(&[third, third, third, 0.0, 0.0], total).unwrap();
            assert_eq!(shares.iter().sum::<u64>(), total);
            assert_eq!(&shares[3..], &[0, 0]);
        }
    }

    #[test]
    fn test_trailing_empty_class_receives_no_trace() {
        let quantum = 2f64.powi(-90);
        let class = |multiplicity: f64, core: u64, trace: u64, wet_radius: f64| SizeClass {
            multiplicity,
            kappa: 0.5,
            core_quanta: core,
            trace_quanta: trace,
            wet_radius,
        };
        let classes = vec![
            class(1e8, 3 << 20, 1 << 20, 2e-7),
            class(1e7, 5 << 20, 7 << 20, 1e-6),
            class(3e6, 1 << 21, 3, 3e-6),
            class(0.0, 0, 0, 1e-6),
        ];
        let population = ParticlePopulation::from_classes(classes, quantum).unwrap();
        let state = ThermodynamicState::new(1.0, 90000.0, 283.0, 8e-3);
        let mut context = ParcelContext::new(state, population);
        let trace = context.population.total_trace_quanta();

        let component = Dissolution::from_parameters(DissolutionParameters {
            transfer_velocity: 1.0,
            ..DissolutionParameters::default()
        });
        component.solve(0.0, 1.0, &mut context).unwrap();

        let classes = context.population.classes();
        assert_eq!(classes[3].trace_quanta, 0);
        assert_eq!(classes[3].wet_radius, 1e-6);
        assert_eq!(context.population.total_trace_quanta(), trace);
        assert!(classes.iter().all(|c| c.wet_radius.is_finite()));
    }

    #[test]
    fn test_apportion_rejects_zero_weights() {
        assert!(apportion(&[0.0, 0.0], 10).is_none());
    }

    // ===== Process Tests =====

    #[test]
    fn test_dry_mass_is_exact() {
        let component = Dissolution::from_parameters(DissolutionParameters {
            transfer_velocity: 1e-3,
            ..DissolutionParameters::default()
        });
        let mut context = context();
        let quanta = context.population.total_dry_quanta();
        let trace = context.population.total_trace_quanta();
        let dry = context.population.dry_third_moment();

        for step in 0..20 {
            let t = step as f64;
            component.solve(t, t + 1.0, &mut context).unwrap();
        }

        assert_eq!(context.population.total_dry_quanta(), quanta);
        assert_eq!(context.population.total_trace_quanta(), trace);
        assert_eq!(context.population.dry_third_moment(), dry);
    }

    #[test]
    fn test_liquid_water_is_kept() {
        let component = Dissolution::from_parameters(DissolutionParameters {
            transfer_velocity: 1.0,
            ..DissolutionParameters::default()
        });
        let mut context = context();
        let quantum = context.population.quantum();
        let water: Vec<f64> = context
            .population
            .classes()
            .iter()
            .map(|c| c.water_third_moment(quantum))
            .collect();

        component.solve(0.0, 1.0, &mut context).unwrap();

        let classes = context.population.classes();
        for (class, before) in classes.iter().zip(water) {
            assert_relative_eq!(class.water_third_moment(quantum), before, max_relative = 1e-9);
            assert!(class.wet_radius >= class.dry_radius(quantum));
        }
    }

    #[test]
    fn test_fast_transfer_reaches_affinity_share() {
        let component = Dissolution::from_parameters(DissolutionParameters {
            transfer_velocity: 1.0,
            ..DissolutionParameters::default()
        });
        let mut context = context();
        let quantum = context.population.quantum();
        let total = context.population.total_trace_quanta() as f64;
        let affinities: Vec<f64> = context
            .population
            .classes()
            .iter()
            .map(|c| component.affinity(c, quantum))
            .collect();
        let sum: f64 = affinities.iter().sum();

        component.solve(0.0, 10.0, &mut context).unwrap();

        for (class, affinity) in context.population.classes().iter().zip(affinities) {
            let expected = total * affinity / sum;
            assert!(
                (class.trace_quanta as f64 - expected).abs() <= 1.0 + 1e-9 * total,
                "{} vs {}",
                class.trace_quanta,
                expected
            );
        }
    }

    #[test]
    fn test_no_transfer_without_time() {
        let component = Dissolution::new();
        let mut context = context();
        let before = context.population.clone();
        component.solve(5.0, 5.0, &mut context).unwrap();
        assert_eq!(context.population, before);
    }

    #[test]
    fn test_relaxation_limits() {
        let component = Dissolution::new();
        assert_eq!(component.relaxation(1e-6, 0.0), 0.0);
        assert!(is_close!(component.relaxation(1e-6, 1e3), 1.0));
        // Larger droplets equilibrate more slowly
        assert!(component.relaxation(1e-5, 1.0) < component.relaxation(1e-7, 1.0));
    }

    #[test]
    fn test_serialization() {
        let process: Box<dyn Process> = Box::new(Dissolution::new());
        let json = serde_json::to_string(&process).unwrap();
        let restored: Box<dyn Process> = serde_json::from_str(&json).unwrap();
        assert!(format!("{:?}", restored).contains("transfer_velocity: 1e-6"));
    }
}
