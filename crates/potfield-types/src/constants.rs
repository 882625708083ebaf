// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Newtonian gravitational constant (m³ kg⁻¹ s⁻²)
pub const G_NEWTON: f64 = 6.674_30e-11;

/// m/s² to mGal
pub const SI_TO_MGAL: f64 = 1.0e5;

/// Vacuum permeability (H/m)
pub const MU0_SI: f64 = 1.256_637_062_12e-6;

/// μ0 / 4π, prefactor of the dipole field (T·m/A)
pub const CM: f64 = 1.0e-7;

/// Tesla to nanotesla
pub const T_TO_NT: f64 = 1.0e9;

/// Ratio above which the unregularized normal equations are considered to
/// dominate damping or smoothing on the first iteration.
pub const CONDITIONING_RATIO_LIMIT: f64 = 10.0;

/// Largest initial mesh accepted from a configuration. Every prism adds a row
/// and a column to the dense normal equations.
pub const MAX_INITIAL_PRISMS: usize = 10_000;
