//! Equilibrium vapour pressure over solution droplets
//!
//! Uses the single-parameter (kappa) Koehler theory of Petters & Kreidenweis (2007):
//!
//! $$ S_{eq}(r) = \frac{r^3 - r_d^3}{r^3 - r_d^3 (1 - \kappa)} \exp\left(\frac{A}{r}\right),
//!    \quad A = \frac{2 \sigma_w}{\rho_w R_v T} $$
//!
//! The solute term vanishes at the dry radius, so $S_{eq}(r_d) = 0$ for any $\kappa > 0$,
//! rises through a maximum at the critical radius and tends to one for large droplets.

use crate::constants::{RHO_W, R_V};
use crate::utils::roots::bisect;

/// Surface tension of water used when no other value is configured
/// unit: N / m
pub const SURFACE_TENSION_WATER: f64 = 0.072;

/// Kelvin curvature coefficient `A`
/// unit: m
pub fn kelvin_coefficient(temperature: f64, surface_tension: f64) -> f64 {
    2.0 * surface_tension / (RHO_W * R_V * temperature)
}

/// Water activity of a solution droplet
pub fn water_activity(wet_radius: f64, dry_radius: f64, kappa: f64) -> f64 {
    let rw3 = wet_radius.powi(3);
    let rd3 = dry_radius.powi(3);
    (rw3 - rd3) / (rw3 - rd3 * (1.0 - kappa))
}

/// Equilibrium saturation ratio over a droplet
pub fn equilibrium_saturation(wet_radius: f64, dry_radius: f64, kappa: f64, a: f64) -> f64 {
    water_activity(wet_radius, dry_radius, kappa) * (a / wet_radius).exp()
}

/// Approximate critical (activation) radius
///
/// $$ r_c \approx \sqrt{3 \kappa r_d^3 / A} $$
pub fn critical_radius(dry_radius: f64, kappa: f64, a: f64) -> f64 {
    (3.0 * kappa * dry_radius.powi(3) / a).sqrt()
}

/// Wet radius in equilibrium with saturation ratio `saturation` (< 1)
///
/// Searches the stable branch between the dry radius and the critical radius. Returns
/// `None` if `saturation` is not below one, since no stable equilibrium is then
/// guaranteed.
pub fn equilibrium_wet_radius(
    saturation: f64,
    dry_radius: f64,
    kappa: f64,
    a: f64,
) -> Option<f64> {
    if saturation.is_nan() || saturation >= 1.0 || saturation < 0.0 {
        return None;
    }

    let residual = |r: f64| equilibrium_saturation(r, dry_radius, kappa, a) - saturation;

    // Past the critical radius the equilibrium stays above one, so any upper end with a
    // positive residual brackets the root on the stable branch
    let mut hi = critical_radius(dry_radius, kappa, a).max(dry_radius * 1.01);
    let mut expansions = 0;
    while residual(hi) < 0.0 {
        hi *= 2.0;
        expansions += 1;
        if expansions > 64 {
            return None;
        }
    }

    Some(bisect(residual, dry_radius, hi, 1e-14, 200))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const KAPPA: f64 = 0.61;
    const T: f64 = 285.0;

    #[test]
    fn activity_is_zero_at_dry_radius() {
        assert_eq!(water_activity(1e-7, 1e-7, KAPPA), 0.0);
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        assert_eq!(equilibrium_saturation(1e-7, 1e-7, KAPPA, a), 0.0);
    }

    #[test]
    fn large_droplets_approach_saturation() {
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let s = equilibrium_saturation(1e-3, 1e-8, KAPPA, a);
        assert_relative_eq!(s, 1.0, max_relative = 1e-5);
    }

    #[test]
    fn kelvin_coefficient_magnitude() {
        // About one nanometre at typical cloud temperatures
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        assert!((1.0e-9..1.3e-9).contains(&a), "A = {}", a);
    }

    #[test]
    fn equilibrium_radius_matches_target_saturation() {
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let rd = 4e-8;
        let rw = equilibrium_wet_radius(0.95, rd, KAPPA, a).unwrap();
        assert!(rw > rd);
        assert!(rw < critical_radius(rd, KAPPA, a));
        assert_relative_eq!(
            equilibrium_saturation(rw, rd, KAPPA, a),
            0.95,
            max_relative = 1e-10
        );
    }

    #[test]
    fn equilibrium_radius_grows_with_humidity() {
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        let rd = 5e-8;
        let low = equilibrium_wet_radius(0.8, rd, KAPPA, a).unwrap();
        let high = equilibrium_wet_radius(0.98, rd, KAPPA, a).unwrap();
        assert!(high > low);
    }

    #[test]
    fn no_equilibrium_when_supersaturated() {
        let a = kelvin_coefficient(T, SURFACE_TENSION_WATER);
        assert!(equilibrium_wet_radius(1.01, 5e-8, KAPPA, a).is_none());
    }
}
