// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Prism Forward Kernels
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field of one homogeneous prism per unit of physical property.
//!
//! Coordinates are x east, y north, z down. Observation points above the
//! surface therefore carry negative z.

use potfield_types::config::{DataType, EarthField, Property};
use potfield_types::constants::{CM, G_NEWTON, MU0_SI, SI_TO_MGAL, T_TO_NT};
use potfield_types::state::Prism;

/// Distance below which an observation is considered to sit on a source.
const MIN_DISTANCE: f64 = 1e-9;

/// Dipole spacing as a fraction of the observation-to-prism distance.
const SPACING_PER_DISTANCE: f64 = 0.5;

/// Upper bound on dipoles per axis of one prism.
const MAX_SUBDIVISIONS: usize = 128;

/// Linear forward operator of a prism: the response at `obs` is the returned
/// value times the prism's property.
pub trait PotentialKernel {
    fn data_type(&self) -> DataType;

    fn supports(&self, property: Property) -> bool;

    /// Response at `obs` per unit of `property` (mGal per kg/m³ for gravity,
    /// nT per SI or per A/m for magnetics).
    fn response(&self, prism: &Prism, property: Property, obs: [f64; 3]) -> f64;
}

/// Vertical attraction of a homogeneous prism, closed form.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GravityKernel;

/// Primitive of the vertical attraction evaluated at one corner.
fn gravity_corner(x: f64, y: f64, z: f64) -> f64 {
    let r = (x * x + y * y + z * z).sqrt();
    let mut value = 0.0;
    if z * r != 0.0 {
        value += z * (x * y / (z * r)).atan();
    }
    if (r + y).abs() > MIN_DISTANCE {
        value -= x * (r + y).ln();
    }
    if (r + x).abs() > MIN_DISTANCE {
        value -= y * (r + x).ln();
    }
    value
}

impl PotentialKernel for GravityKernel {
    fn data_type(&self) -> DataType {
        DataType::Gravity
    }

    fn supports(&self, property: Property) -> bool {
        property == Property::Density
    }

    fn response(&self, prism: &Prism, property: Property, obs: [f64; 3]) -> f64 {
        if property != Property::Density {
            return 0.0;
        }
        let mut sum = 0.0;
        for (i, &xe) in prism.x.iter().enumerate() {
            for (j, &ye) in prism.y.iter().enumerate() {
                for (k, &ze) in prism.z.iter().enumerate() {
                    // -1 at the lower edge, +1 at the upper edge on each axis
                    let sign = if (i + j + k) % 2 == 1 { 1.0 } else { -1.0 };
                    sum += sign * gravity_corner(xe - obs[0], ye - obs[1], ze - obs[2]);
                }
            }
        }
        G_NEWTON * SI_TO_MGAL * sum
    }
}

/// Total-field anomaly of a prism magnetized along the Earth field,
/// approximated by a regular lattice of point dipoles.
///
/// The lattice spacing follows the distance between the observation point
/// and the prism, so wide prisms right below a sensor are sampled finely and
/// distant ones cost a handful of dipoles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagneticKernel {
    pub earth: EarthField,
    /// Minimum dipoles per axis
    pub subdivisions: usize,
    direction: [f64; 3],
}

impl MagneticKernel {
    pub fn new(earth: EarthField) -> Self {
        Self::with_subdivisions(earth, 2)
    }

    pub fn with_subdivisions(earth: EarthField, subdivisions: usize) -> Self {
        MagneticKernel {
            earth,
            subdivisions: subdivisions.max(1),
            direction: earth.direction(),
        }
    }

    /// Dipoles per axis for `prism` seen from `obs`.
    fn lattice(&self, prism: &Prism, obs: [f64; 3]) -> [usize; 3] {
        let gap = |range: [f64; 2], p: f64| (range[0] - p).max(p - range[1]).max(0.0);
        let (gx, gy, gz) = (
            gap(prism.x, obs[0]),
            gap(prism.y, obs[1]),
            gap(prism.z, obs[2]),
        );
        let spacing = SPACING_PER_DISTANCE * (gx * gx + gy * gy + gz * gz).sqrt();
        let ceiling = MAX_SUBDIVISIONS.max(self.subdivisions);
        let count = |size: f64| {
            if spacing <= MIN_DISTANCE {
                return ceiling;
            }
            let n = (size / spacing).ceil().min(ceiling as f64) as usize;
            n.max(self.subdivisions)
        };
        [count(prism.size(0)), count(prism.size(1)), count(prism.size(2))]
    }

    /// Magnetization [A/m] per unit of `property`.
    fn magnetization_per_unit(&self, property: Property) -> f64 {
        match property {
            // M = χ·F/μ0 with F in Tesla
            Property::Susceptibility => self.earth.intensity / T_TO_NT / MU0_SI,
            Property::Remanence => 1.0,
            Property::Density => 0.0,
        }
    }
}

impl PotentialKernel for MagneticKernel {
    fn data_type(&self) -> DataType {
        DataType::Magnetic
    }

    fn supports(&self, property: Property) -> bool {
        property.is_magnetic()
    }

    fn response(&self, prism: &Prism, property: Property, obs: [f64; 3]) -> f64 {
        let magnetization = self.magnetization_per_unit(property);
        if magnetization == 0.0 {
            return 0.0;
        }
        let n = self.lattice(prism, obs);
        let step = [
            prism.size(0) / n[0] as f64,
            prism.size(1) / n[1] as f64,
            prism.size(2) / n[2] as f64,
        ];
        let moment = magnetization * step[0] * step[1] * step[2];
        let f = self.direction;

        let mut sum = 0.0;
        for a in 0..n[0] {
            let rx = obs[0] - (prism.x[0] + (a as f64 + 0.5) * step[0]);
            for b in 0..n[1] {
                let ry = obs[1] - (prism.y[0] + (b as f64 + 0.5) * step[1]);
                for c in 0..n[2] {
                    let rz = obs[2] - (prism.z[0] + (c as f64 + 0.5) * step[2]);
                    let r2 = rx * rx + ry * ry + rz * rz;
                    let r = r2.sqrt();
                    if r < MIN_DISTANCE {
                        continue;
                    }
                    let cos = (f[0] * rx + f[1] * ry + f[2] * rz) / r;
                    sum += (3.0 * cos * cos - 1.0) / (r2 * r);
                }
            }
        }
        CM * T_TO_NT * moment * sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab() -> Prism {
        Prism::new([0.0, 12.0], [-25.0, 25.0], [0.0, 5.0])
    }

    #[test]
    fn test_gravity_positive_above_dense_body() {
        let g = GravityKernel.response(&slab(), Property::Density, [6.0, 0.0, -1.0]);
        assert!(g > 0.0, "attraction above a dense prism must be positive: {g}");
        // Bouguer slab limit 2πGρt for a wide prism close to the surface.
        let bouguer = 2.0 * std::f64::consts::PI * G_NEWTON * 5.0 * SI_TO_MGAL;
        assert!(g < bouguer && g > 0.5 * bouguer, "g={g}, slab={bouguer}");
    }

    #[test]
    fn test_gravity_matches_point_mass_far_away() {
        let p = Prism::new([-1.0, 1.0], [-1.0, 1.0], [99.0, 101.0]);
        let g = GravityKernel.response(&p, Property::Density, [0.0, 0.0, 0.0]);
        let point = G_NEWTON * p.volume() / (100.0 * 100.0) * SI_TO_MGAL;
        assert!((g - point).abs() < 1e-3 * point, "g={g}, point mass={point}");
    }

    #[test]
    fn test_gravity_additive_under_halving() {
        let parent = slab();
        let obs = [25.0, 3.0, -1.0];
        let whole = GravityKernel.response(&parent, Property::Density, obs);
        let mut halves = 0.0;
        for x in [[0.0, 6.0], [6.0, 12.0]] {
            for z in [[0.0, 2.5], [2.5, 5.0]] {
                let child = Prism::new(x, parent.y, z);
                halves += GravityKernel.response(&child, Property::Density, obs);
            }
        }
        assert!((whole - halves).abs() < 1e-12 * whole.abs().max(1e-30) + 1e-18);
    }

    #[test]
    fn test_gravity_ignores_magnetic_properties() {
        let g = GravityKernel.response(&slab(), Property::Susceptibility, [6.0, 0.0, -1.0]);
        assert_eq!(g, 0.0);
        assert!(!GravityKernel.supports(Property::Remanence));
    }

    #[test]
    fn test_magnetic_vertical_field_positive_above() {
        let earth = EarthField {
            intensity: 50_000.0,
            inclination: 90.0,
            declination: 0.0,
        };
        let kernel = MagneticKernel::new(earth);
        let p = Prism::new([-5.0, 5.0], [-5.0, 5.0], [10.0, 20.0]);
        let above = kernel.response(&p, Property::Susceptibility, [0.0, 0.0, -1.0]);
        assert!(above > 0.0);
        // Symmetric field: equal response at mirrored positions.
        let east = kernel.response(&p, Property::Susceptibility, [8.0, 0.0, -1.0]);
        let west = kernel.response(&p, Property::Susceptibility, [-8.0, 0.0, -1.0]);
        assert!((east - west).abs() < 1e-9 * east.abs().max(1e-12));
    }

    #[test]
    fn test_magnetic_far_field_is_dipole() {
        let earth = EarthField {
            intensity: 50_000.0,
            inclination: 90.0,
            declination: 0.0,
        };
        let kernel = MagneticKernel::with_subdivisions(earth, 3);
        let p = Prism::new([-1.0, 1.0], [-1.0, 1.0], [199.0, 201.0]);
        let rem = kernel.response(&p, Property::Remanence, [0.0, 0.0, 0.0]);
        // Point dipole along the axis: 2·CM·m/r³ in nT.
        let expected = 2.0 * CM * p.volume() / 200.0f64.powi(3) * T_TO_NT;
        assert!((rem - expected).abs() < 1e-3 * expected, "rem={rem}, dipole={expected}");

        let sus = kernel.response(&p, Property::Susceptibility, [0.0, 0.0, 0.0]);
        let m_per_si = 50_000.0 / T_TO_NT / MU0_SI;
        assert!((sus - rem * m_per_si).abs() < 1e-9 * sus.abs());
    }

    /// Vertical field and magnetization: by Poisson's relation the anomaly
    /// is CM·M·∂g/∂z / (G·ρ), with ∂g/∂z from the closed-form gravity kernel.
    #[test]
    fn test_magnetic_wide_shallow_prism_matches_poisson() {
        let earth = EarthField {
            intensity: 50_000.0,
            inclination: 90.0,
            declination: 0.0,
        };
        let prism = slab();
        let obs = [6.0, 0.0, -1.0];
        let h = 1e-3;
        let dgdz = (GravityKernel.response(&prism, Property::Density, [obs[0], obs[1], obs[2] + h])
            - GravityKernel.response(&prism, Property::Density, [obs[0], obs[1], obs[2] - h]))
            / (2.0 * h);
        let exact = CM * T_TO_NT * dgdz / (G_NEWTON * SI_TO_MGAL);
        assert!(exact > 0.0);

        let kernel = MagneticKernel::new(earth);
        assert_eq!(kernel.lattice(&prism, obs), [24, 100, 10]);
        let lattice = kernel.response(&prism, Property::Remanence, obs);
        assert!(
            (lattice - exact).abs() < 0.02 * exact,
            "lattice {lattice} vs closed form {exact}"
        );
    }

    #[test]
    fn test_lattice_coarsens_with_distance() {
        let kernel = MagneticKernel::new(EarthField::default());
        let p = Prism::new([0.0, 10.0], [0.0, 10.0], [0.0, 4.0]);
        let near = kernel.lattice(&p, [5.0, 5.0, -1.0]);
        let far = kernel.lattice(&p, [5.0, 5.0, -1000.0]);
        assert_eq!(near, [20, 20, 8]);
        assert_eq!(far, [2, 2, 2]);
        let inside = kernel.lattice(&p, [5.0, 5.0, 2.0]);
        assert_eq!(inside, [MAX_SUBDIVISIONS; 3]);
    }

    #[test]
    fn test_magnetic_ignores_density() {
        let kernel = MagneticKernel::new(EarthField::default());
        assert_eq!(
            kernel.response(&slab(), Property::Density, [0.0, 0.0, -1.0]),
            0.0
        );
        assert_eq!(kernel.data_type(), DataType::Magnetic);
    }
}
