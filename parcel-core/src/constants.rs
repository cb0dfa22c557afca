//! Physical constants shared by the thermodynamics and the processes
//!
//! Values follow the set commonly used by bin and particle-based cloud models.

/// Universal gas constant
/// unit: J / (mol K)
pub const R_UNIVERSAL: f64 = 8.3144621;

/// Molar mass of dry air
/// unit: kg / mol
pub const M_DRY: f64 = 0.02897;

/// Molar mass of water vapour
/// unit: kg / mol
pub const M_VAPOUR: f64 = 0.01802;

/// Specific gas constant of dry air
/// unit: J / (kg K)
pub const R_D: f64 = R_UNIVERSAL / M_DRY;

/// Specific gas constant of water vapour
/// unit: J / (kg K)
pub const R_V: f64 = R_UNIVERSAL / M_VAPOUR;

/// Ratio of the dry-air and vapour gas constants
pub const EPS: f64 = R_D / R_V;

/// Specific heat of dry air at constant pressure
/// unit: J / (kg K)
pub const C_PD: f64 = 1005.0;

/// Specific heat of water vapour at constant pressure
/// unit: J / (kg K)
pub const C_PV: f64 = 1850.0;

/// Latent heat of vaporisation
/// unit: J / kg
pub const L_V: f64 = 2.5e6;

/// Density of liquid water
/// unit: kg / m^3
pub const RHO_W: f64 = 1e3;

/// Gravitational acceleration
/// unit: m / s^2
pub const G: f64 = 9.81;

/// Reference pressure for potential temperature
/// unit: Pa
pub const P_1000: f64 = 1e5;

/// Melting point, used as the zero of the Celsius scale
/// unit: K
pub const T_0C: f64 = 273.15;

/// Reference pressure at which the vapour diffusivity is specified
/// unit: Pa
pub const P_REF: f64 = 101325.0;

/// `4/3 pi`, the factor between a third radius moment and a volume
pub const FOUR_THIRDS_PI: f64 = 4.0 / 3.0 * std::f64::consts::PI;
