//! Condensation Component
//!
//! Grows and evaporates solution droplets by vapour diffusion, exchanging water with
//! the vapour field and heat with the parcel.
//!
//! # What This Component Does
//!
//! 1. Splits the step into `substeps` equal substeps. The ambient temperature,
//!    pressure and saturation ratio are held fixed within a substep.
//!
//! 2. Advances the squared wet radius of every class with the implicit (backward
//!    Euler) form of the growth law
//!
//!    $$x - x_0 = h \frac{2 (S - S_{eq}(\sqrt{x}))}{F_k + F_d}, \quad x = r_w^2$$
//!
//!    solved by bisection between $r_d^2$ and $x_0 + 2 h S / (F_k + F_d)$.
//!
//! 3. Removes the condensed water from the vapour and releases its latent heat:
//!
//!    $$\Delta r_v = -\Delta M, \quad \Delta T = \frac{L_v \Delta M}{c_{pd} + r_v c_{pv}}$$
//!
//! # Conservation
//!
//! $\Delta M$ is accumulated class by class from the exact change in each class's wet
//! third moment with compensated summation, and applied to the vapour once per step.
//! Total water changes only by the rounding of that single update.

use crate::parameters::CondensationParameters;
use log::debug;
use parcel_core::constants::{FOUR_THIRDS_PI, L_V, P_REF, RHO_W, R_V, T_0C};
use parcel_core::errors::ParcelResult;
use parcel_core::kohler::{equilibrium_saturation, kelvin_coefficient};
use parcel_core::process::{ParcelContext, Process};
use parcel_core::thermo::{moist_heat_capacity, saturation_vapour_pressure, vapour_pressure};
use parcel_core::utils::roots::bisect;
use parcel_core::utils::summation::CompensatedSum;
use parcel_core::Time;
use serde::{Deserialize, Serialize};

/// Temperature exponent of the vapour diffusivity
const DIFFUSIVITY_EXPONENT: f64 = 1.94;

/// Condensational growth and evaporation of the particle population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condensation {
    pub parameters: CondensationParameters,
}

impl Condensation {
    pub fn new() -> Self {
        Self::from_parameters(CondensationParameters::default())
    }

    pub fn from_parameters(parameters: CondensationParameters) -> Self {
        Self { parameters }
    }

    /// Vapour diffusivity corrected for temperature and pressure
    /// unit: m^2 / s
    pub fn diffusivity(&self, temperature: f64, pressure: f64) -> f64 {
        self.parameters.vapour_diffusivity
            * (temperature / T_0C).powf(DIFFUSIVITY_EXPONENT)
            * (P_REF / pressure)
    }

    /// Sum of the heat-conduction and vapour-diffusion terms, $F_k + F_d$
    /// unit: s / m^2
    pub fn growth_resistance(&self, temperature: f64, pressure: f64) -> f64 {
        let f_k = (L_V / (R_V * temperature) - 1.0) * L_V * RHO_W
            / (self.parameters.thermal_conductivity * temperature);
        let f_d = RHO_W * R_V * temperature
            / (self.diffusivity(temperature, pressure) * saturation_vapour_pressure(temperature));
        f_k + f_d
    }

    /// Implicit update of a single wet radius over `h` seconds
    ///
    /// `g` is $2 / (F_k + F_d)$ and `a` the Kelvin coefficient. The result is never below
    /// the dry radius.
    #[allow(clippy::too_many_arguments)]
    pub fn grow(
        &self,
        wet_radius: f64,
        dry_radius: f64,
        kappa: f64,
        saturation: f64,
        a: f64,
        g: f64,
        h: Time,
    ) -> f64 {
        let x0 = wet_radius * wet_radius;
        let lo = dry_radius * dry_radius;
        let hi = (x0 + h * g * saturation).max(lo);

        let residual = |x: f64| {
            let s_eq = equilibrium_saturation(x.sqrt(), dry_radius, kappa, a);
            x - x0 - h * g * (saturation - s_eq)
        };

        let x = bisect(
            residual,
            lo,
            hi,
            self.parameters.rtol,
            self.parameters.max_iterations,
        );
        x.sqrt().max(dry_radius)
    }
}

impl Default for Condensation {
    fn default() -> Self {
        Self::new()
    }
}

#[typetag::serde]
impl Process for Condensation {
    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        context: &mut ParcelContext,
    ) -> ParcelResult<()> {
        let substeps = self.parameters.substeps.max(1);
        let h = (t_next - t_current) / substeps as f64;

        let pressure = context.state.p;
        let (r_v0, t0) = (context.state.r_v, context.state.t);
        let quantum = context.population.quantum();
        let water_density = FOUR_THIRDS_PI * RHO_W;

        // Change of the wet third moment over the whole step
        let mut moment = CompensatedSum::new();

        for _ in 0..substeps {
            let condensed = moment.value() * water_density;
            let r_v = r_v0 - condensed;
            let temperature = t0 + L_V * condensed / moist_heat_capacity(r_v);

            let saturation =
                vapour_pressure(pressure, r_v) / saturation_vapour_pressure(temperature);
            let a = kelvin_coefficient(temperature, self.parameters.surface_tension);
            let g = 2.0 / self.growth_resistance(temperature, pressure);

            for class in context.population.classes_mut() {
                if class.multiplicity <= 0.0 {
                    continue;
                }
                let dry_radius = class.dry_radius(quantum);
                let before = class.wet_third_moment();
                class.wet_radius = self.grow(
                    class.wet_radius,
                    dry_radius,
                    class.kappa,
                    saturation,
                    a,
                    g,
                    h,
                );
                moment += class.wet_third_moment() - before;
            }
        }

        let condensed = moment.value() * water_density;
        context.state.r_v = r_v0 - condensed;
        context.state.t = t0 + L_V * condensed / moist_heat_capacity(context.state.r_v);

        debug!(
            "Step {}: condensed {:.4e} kg/kg, T = {:.4} K",
            context.step, condensed, context.state.t
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;
    use parcel_core::kohler::{equilibrium_wet_radius, SURFACE_TENSION_WATER};
    use parcel_core::population::{AerosolMode, ParticlePopulation, SizeClass};
    use parcel_core::thermo::{mixing_ratio, ThermodynamicState};
    use std::collections::BTreeMap;

    const T: f64 = 283.0;
    const P: f64 = 90000.0;
    const KAPPA: f64 = 0.61;

    fn context(saturation: f64) -> ParcelContext {
        let r_v = mixing_ratio(P, saturation * saturation_vapour_pressure(T));
        let state = ThermodynamicState::new(1.0, P, T, r_v);
        let modes = BTreeMap::from([("mode".to_string(), AerosolMode::default())]);
        let population =
            ParticlePopulation::initialise(&modes, 32, state.rho_d, 0.95, T, SURFACE_TENSION_WATER)
                .unwrap();
        ParcelContext::new(state, population)
    }

    // ===== Growth Law Tests =====

    #[test]
    fn test_growth_resistance_magnitude() {
        let component = Condensation::new();
        let resistance = component.growth_resistance(T, P);
        assert!((5e9..2e10).contains(&resistance), "F_k + F_d = {}", resistance);
    }

    #[test]
    fn test_diffusivity_at_reference_conditions() {
        let component = Condensation::new();
        assert!(is_close!(component.diffusivity(T_0C, P_REF), 2.21e-5));
        assert!(component.diffusivity(T_0C, 0.5 * P_REF) > 2.21e-5);
    }

    #[test]
    fn test_supersaturation_grows_droplet() {
        let component = Condensation::new();
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let g = 2.0 / component.growth_resistance(T, P);
        let rw = 5e-6;
        let grown = component.grow(rw, 5e-8, KAPPA, 1.005, a, g, 1.0);
        assert!(grown > rw);
        let shrunk = component.grow(rw, 5e-8, KAPPA, 0.9, a, g, 1.0);
        assert!(shrunk < rw);
    }

    #[test]
    fn test_equilibrium_radius_is_stationary() {
        let component = Condensation::new();
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let g = 2.0 / component.growth_resistance(T, P);
        let rd = 4e-8;
        let rw = equilibrium_wet_radius(0.9, rd, KAPPA, a).unwrap();
        let updated = component.grow(rw, rd, KAPPA, 0.9, a, g, 0.1);
        assert_relative_eq!(updated, rw, max_relative = 1e-6);
    }

    #[test]
    fn test_never_below_dry_radius() {
        let component = Condensation::new();
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let g = 2.0 / component.growth_resistance(T, P);
        let rd = 1e-7;
        let updated = component.grow(2e-7, rd, KAPPA, 0.0, a, g, 1e6);
        assert!(updated >= rd);
    }

    // ===== Process Tests =====

    #[test]
    fn test_solve_conserves_water() {
        let component = Condensation::new();
        let mut context = context(1.01);
        let initial_water = context.total_water();
        let initial = context.state;

        component.solve(0.0, 1.0, &mut context).unwrap();

        assert_relative_eq!(context.total_water(), initial_water, max_relative = 1e-15);
        assert!(context.state.r_v < initial.r_v);
        assert!(context.state.t > initial.t);
    }

    #[test]
    fn test_subsaturation_evaporates() {
        let component = Condensation::new();
        let mut context = context(0.6);
        let initial = context.state;
        let liquid = context.population.liquid_water();

        component.solve(0.0, 1.0, &mut context).unwrap();

        assert!(context.population.liquid_water() < liquid);
        assert!(context.state.r_v > initial.r_v);
        assert!(context.state.t < initial.t);
    }

    #[test]
    fn test_wet_radius_stays_above_dry_radius() {
        let component = Condensation::from_parameters(CondensationParameters {
            substeps: 1,
            ..CondensationParameters::default()
        });
        let mut context = context(0.05);
        component.solve(0.0, 100.0, &mut context).unwrap();

        let quantum = context.population.quantum();
        for class in context.population.classes() {
            assert!(class.wet_radius >= class.dry_radius(quantum));
        }
    }

    #[test]
    fn test_empty_class_is_skipped() {
        let classes = vec![
            SizeClass {
                multiplicity: 0.0,
                kappa: KAPPA,
                core_quanta: 0,
                trace_quanta: 0,
                wet_radius: 1e-6,
            },
            SizeClass {
                multiplicity: 1e8,
                kappa: KAPPA,
                core_quanta: 1 << 20,
                trace_quanta: 0,
                wet_radius: 1e-7,
            },
        ];
        let population = ParticlePopulation::from_classes(classes, 2f64.powi(-90)).unwrap();
        let r_v = mixing_ratio(P, 1.002 * saturation_vapour_pressure(T));
        let mut context = ParcelContext::new(ThermodynamicState::new(1.0, P, T, r_v), population);

        Condensation::new().solve(0.0, 0.5, &mut context).unwrap();

        let classes = context.population.classes();
        assert_eq!(classes[0].wet_radius, 1e-6);
        assert!(classes[1].wet_radius.is_finite());
        assert!(context.state.r_v.is_finite());
    }

    #[test]
    fn test_serialization() {
        let component = Condensation::from_parameters(CondensationParameters {
            substeps: 4,
            ..CondensationParameters::default()
        });
        let process: Box<dyn Process> = Box::new(component);
        let json = serde_json::to_string(&process).unwrap();
        assert!(json.contains("Condensation"));
        let restored: Box<dyn Process> = serde_json::from_str(&json).unwrap();
        assert!(format!("{:?}", restored).contains("substeps: 4"));
    }
}
