//! Thermodynamic state of the parcel
//!
//! The parcel carries six scalars: height, vertical velocity, pressure, temperature,
//! water-vapour mixing ratio and dry-air density. The dry-air density is never evolved
//! on its own; it is re-derived from `(p, T, r_v)` after every update so that it cannot
//! drift away from the moist ideal-gas relation.
//!
//! # Ascent
//!
//! Between microphysics updates the parcel rises adiabatically and hydrostatically:
//!
//! $$ \frac{dz}{dt} = w, \quad \frac{dp}{dt} = -\rho g w, \quad
//!    \frac{dT}{dt} = -\frac{(1 + r_v) g w}{c_{pd} + r_v c_{pv}} $$
//!
//! with $\rho = \rho_d (1 + r_v)$. Latent heating is applied separately by the
//! condensation process.

use crate::constants::{C_PD, C_PV, EPS, G, P_1000, R_D, R_V, T_0C};
use crate::errors::{ParcelError, ParcelResult};
use crate::Time;
use ode_solvers::{Rk4, System, Vector3};
use serde::{Deserialize, Serialize};

/// State vector of the ascent ODE: `[z, p, T]`
pub type AscentState = Vector3<f64>;

/// Saturation vapour pressure over a flat water surface (Bolton, 1980)
/// unit: Pa
pub fn saturation_vapour_pressure(temperature: f64) -> f64 {
    let tc = temperature - T_0C;
    611.2 * (17.67 * tc / (tc + 243.5)).exp()
}

/// Partial pressure of water vapour for a given total pressure and mixing ratio
/// unit: Pa
pub fn vapour_pressure(pressure: f64, r_v: f64) -> f64 {
    pressure * r_v / (r_v + EPS)
}

/// Mixing ratio of water vapour for a given total pressure and vapour pressure
/// unit: kg / kg dry air
pub fn mixing_ratio(pressure: f64, vapour_pressure: f64) -> f64 {
    EPS * vapour_pressure / (pressure - vapour_pressure)
}

/// Dry-air density from the moist ideal-gas law
///
/// $$ p = \rho_d T (R_d + r_v R_v) $$
pub fn dry_air_density(pressure: f64, temperature: f64, r_v: f64) -> f64 {
    pressure / (temperature * (R_D + r_v * R_V))
}

/// Heat capacity of moist air per kg of dry air
/// unit: J / (kg K)
pub fn moist_heat_capacity(r_v: f64) -> f64 {
    C_PD + r_v * C_PV
}

/// Scalar thermodynamic state of the parcel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermodynamicState {
    /// Height above the starting level
    /// unit: m
    pub z: f64,
    /// Vertical velocity
    /// unit: m / s
    pub w: f64,
    /// Pressure
    /// unit: Pa
    pub p: f64,
    /// Temperature
    /// unit: K
    pub t: f64,
    /// Water-vapour mixing ratio
    /// unit: kg / kg dry air
    pub r_v: f64,
    /// Dry-air density
    /// unit: kg / m^3
    pub rho_d: f64,
}

impl ThermodynamicState {
    /// Create a state at height zero with the dry-air density derived from `(p, T, r_v)`
    pub fn new(w: f64, p: f64, t: f64, r_v: f64) -> Self {
        Self {
            z: 0.0,
            w,
            p,
            t,
            r_v,
            rho_d: dry_air_density(p, t, r_v),
        }
    }

    /// Re-derive the dry-air density after `p`, `T` or `r_v` changed
    pub fn refresh_density(&mut self) {
        self.rho_d = dry_air_density(self.p, self.t, self.r_v);
    }

    pub fn vapour_pressure(&self) -> f64 {
        vapour_pressure(self.p, self.r_v)
    }

    /// Saturation ratio `e / e_s(T)`
    pub fn saturation_ratio(&self) -> f64 {
        self.vapour_pressure() / saturation_vapour_pressure(self.t)
    }

    /// Relative humidity, identical to the saturation ratio
    pub fn relative_humidity(&self) -> f64 {
        self.saturation_ratio()
    }

    /// Dry potential temperature, referenced to the partial pressure of dry air
    pub fn dry_potential_temperature(&self) -> f64 {
        let p_d = self.p - self.vapour_pressure();
        self.t * (P_1000 / p_d).powf(R_D / C_PD)
    }

    /// Total air density (dry air plus vapour)
    pub fn air_density(&self) -> f64 {
        self.rho_d * (1.0 + self.r_v)
    }

    /// Check the state for non-finite values and unphysical ranges
    ///
    /// `step` is only used to give the error context.
    pub fn check(&self, step: usize) -> ParcelResult<()> {
        let quantities = [
            ("z", self.z),
            ("w", self.w),
            ("p", self.p),
            ("T", self.t),
            ("r_v", self.r_v),
            ("rho_d", self.rho_d),
        ];
        for (quantity, value) in quantities {
            if !value.is_finite() {
                return Err(ParcelError::NonFinite {
                    step,
                    quantity: quantity.to_string(),
                    value,
                });
            }
        }

        let ranges = [
            ("p", self.p, self.p > 0.0),
            ("T", self.t, self.t > 0.0),
            ("r_v", self.r_v, self.r_v >= 0.0),
            ("rho_d", self.rho_d, self.rho_d > 0.0),
        ];
        for (quantity, value, valid) in ranges {
            if !valid {
                return Err(ParcelError::OutOfRange {
                    step,
                    quantity: quantity.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Hydrostatic, adiabatic ascent at constant vertical velocity
///
/// The vapour mixing ratio is held fixed over one ascent step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ascent {
    pub w: f64,
    pub r_v: f64,
}

impl System<Time, AscentState> for Ascent {
    fn system(&self, _t: Time, y: &AscentState, dy_dt: &mut AscentState) {
        let pressure = y[1];
        let temperature = y[2];

        let rho = dry_air_density(pressure, temperature, self.r_v) * (1.0 + self.r_v);

        dy_dt[0] = self.w;
        dy_dt[1] = -rho * G * self.w;
        dy_dt[2] = -(1.0 + self.r_v) * G * self.w / moist_heat_capacity(self.r_v);
    }
}

/// Advance `state` by one ascent step of length `dt`
///
/// Uses a single fourth-order Runge-Kutta step; `z`, `p` and `T` are updated and the
/// dry-air density refreshed. `step` is only used for error context.
pub fn ascend(state: &mut ThermodynamicState, dt: Time, step: usize) -> ParcelResult<()> {
    let ascent = Ascent {
        w: state.w,
        r_v: state.r_v,
    };
    let y0 = AscentState::new(state.z, state.p, state.t);

    // Integrating over [0, dt] with step dt gives exactly one step
    let mut solver = Rk4::new(ascent, 0.0, y0, dt, dt);
    solver
        .integrate()
        .map_err(|e| ParcelError::IntegrationFailed {
            step,
            reason: format!("{:?}", e),
        })?;

    let (_, y_out) = solver.results().get();
    let y = y_out
        .last()
        .copied()
        .ok_or(ParcelError::IntegrationFailed {
            step,
            reason: "ascent produced no output".to_string(),
        })?;

    state.z = y[0];
    state.p = y[1];
    state.t = y[2];
    state.refresh_density();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;

    fn reference_state() -> ThermodynamicState {
        ThermodynamicState::new(1.0, 95000.0, 285.2, 0.008)
    }

    #[test]
    fn saturation_vapour_pressure_at_freezing() {
        assert_relative_eq!(saturation_vapour_pressure(T_0C), 611.2);
        // ~2339 Pa at 20 C
        let e_s = saturation_vapour_pressure(293.15);
        assert!((2300.0..2360.0).contains(&e_s), "e_s(20C) = {}", e_s);
    }

    #[test]
    fn mixing_ratio_inverts_vapour_pressure() {
        let p = 90000.0;
        let r_v = 0.0123;
        let e = vapour_pressure(p, r_v);
        assert!(is_close!(mixing_ratio(p, e), r_v));
    }

    #[test]
    fn density_consistent_with_gas_law() {
        let state = reference_state();
        let p = state.rho_d * state.t * (R_D + state.r_v * R_V);
        assert_relative_eq!(p, state.p, max_relative = 1e-14);
    }

    #[test]
    fn refresh_density_tracks_mutation() {
        let mut state = reference_state();
        state.t -= 2.0;
        state.r_v -= 1e-3;
        state.refresh_density();
        assert_eq!(state.rho_d, dry_air_density(state.p, state.t, state.r_v));
    }

    #[test]
    fn ascent_cools_and_lowers_pressure() {
        let mut state = reference_state();
        let initial = state;
        for step in 0..100 {
            ascend(&mut state, 1.0, step).unwrap();
        }

        assert_relative_eq!(state.z, 100.0, max_relative = 1e-12);
        assert!(state.p < initial.p);
        // roughly dry adiabatic: ~0.98 K per 100 m
        let cooling = initial.t - state.t;
        assert!((0.9..1.0).contains(&cooling), "cooling = {}", cooling);
        // about 11 hPa per 100 m near the surface
        let dp = initial.p - state.p;
        assert!((1000.0..1200.0).contains(&dp), "dp = {}", dp);
    }

    #[test]
    fn ascent_conserves_potential_temperature() {
        let mut state = reference_state();
        let theta_0 = state.dry_potential_temperature();
        for step in 0..200 {
            ascend(&mut state, 1.0, step).unwrap();
        }
        let theta_1 = state.dry_potential_temperature();
        assert_relative_eq!(theta_0, theta_1, max_relative = 1e-3);
    }

    #[test]
    fn check_rejects_non_finite() {
        let mut state = reference_state();
        state.t = f64::NAN;
        match state.check(7) {
            Err(ParcelError::NonFinite { step, quantity, .. }) => {
                assert_eq!(step, 7);
                assert_eq!(quantity, "T");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn check_rejects_negative_vapour() {
        let mut state = reference_state();
        state.r_v = -1e-6;
        assert!(matches!(
            state.check(3),
            Err(ParcelError::OutOfRange { step: 3, .. })
        ));
    }
}
