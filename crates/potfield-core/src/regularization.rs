// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Regularization Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Inverse-variance weights of data and parameters.
//!
//! Parameter weights grow (or shrink) with prism depth so that deep prisms,
//! whose sensitivity is weak, are held closer to their current value.

use ndarray::{Array1, Array2};
use potfield_math::linalg::max_entry;
use potfield_types::config::{DataType, PropertySet, UncertaintyConfig};
use potfield_types::constants::CONDITIONING_RATIO_LIMIT;
use potfield_types::state::{ConditioningDiagnostic, Prism};
use tracing::debug;

/// Relative tolerance for treating `depth_ref` as exactly 1.
const DEPTH_REF_RTOL: f64 = 1e-5;
const DEPTH_REF_ATOL: f64 = 1e-8;

/// Depth scaling `f = 1 + z_mid·factor`, inverted for reference depths
/// below 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthWeighting {
    /// `depth_ref == 1`
    Uniform,
    Increasing { factor: f64 },
    Decreasing { factor: f64 },
}

impl DepthWeighting {
    /// `zmax` is the bottom of the model.
    pub fn new(depth_ref: f64, zmax: f64) -> Self {
        if (depth_ref - 1.0).abs() <= DEPTH_REF_ATOL + DEPTH_REF_RTOL || zmax <= 0.0 {
            DepthWeighting::Uniform
        } else if depth_ref > 1.0 {
            DepthWeighting::Increasing {
                factor: (depth_ref - 1.0) / zmax,
            }
        } else {
            DepthWeighting::Decreasing {
                factor: (1.0 / depth_ref - 1.0) / zmax,
            }
        }
    }

    /// Multiplier at mid-depth `z_mid`, before raising to the property's
    /// exponent.
    pub fn scale(&self, z_mid: f64) -> f64 {
        match *self {
            DepthWeighting::Uniform => 1.0,
            DepthWeighting::Increasing { factor } => 1.0 + z_mid * factor,
            DepthWeighting::Decreasing { factor } => 1.0 / (1.0 + z_mid * factor),
        }
    }
}

/// Diagonal weights of one linearized solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    /// One entry per observation
    pub sigma_data: Array1<f64>,
    /// One entry per parameter plus a trailing 0 for the constant term
    pub sigma_param: Array1<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularizationModel {
    pub data_type: DataType,
    pub properties: PropertySet,
    pub uncertainty: UncertaintyConfig,
}

impl RegularizationModel {
    pub fn new(
        data_type: DataType,
        properties: PropertySet,
        uncertainty: UncertaintyConfig,
    ) -> Self {
        RegularizationModel {
            data_type,
            properties,
            uncertainty,
        }
    }

    pub fn depth_weighting(&self, zmax: f64) -> DepthWeighting {
        DepthWeighting::new(self.uncertainty.depth_ref, zmax)
    }

    /// Weights for `n_data` observations and `prisms` in parameter order.
    pub fn weights(&self, n_data: usize, prisms: &[Prism], zmax: f64) -> Weights {
        let sigma_d = self.uncertainty.sigma_data(self.data_type);
        let sigma_data = Array1::from_elem(n_data, 1.0 / (sigma_d * sigma_d));

        let depth = self.depth_weighting(zmax);
        let props = self.properties.properties();
        let mut sigma_param = Array1::zeros(prisms.len() * props.len() + 1);
        for (ip, &property) in props.iter().enumerate() {
            let sigma_p = self.uncertainty.sigma_property(property);
            let base = 1.0 / (sigma_p * sigma_p);
            let p = property.depth_exponent();
            for (i, prism) in prisms.iter().enumerate() {
                sigma_param[ip * prisms.len() + i] = base * depth.scale(prism.mid_depth()).powi(p);
            }
        }
        debug!(
            "weights: {} data, {} parameters, depth weighting {:?}",
            n_data,
            sigma_param.len() - 1,
            depth
        );
        Weights {
            sigma_data,
            sigma_param,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        f64::INFINITY
    }
}

/// Compare the unregularized normal matrix with the damping and smoothing
/// terms that will be added to it.
pub fn conditioning_diagnostic(
    normal: &Array2<f64>,
    weights: &Weights,
    smoothing: &Array2<f64>,
    lambda: f64,
    gamma: f64,
) -> ConditioningDiagnostic {
    let m_g = max_entry(&normal.view());
    let m_sig = weights
        .sigma_param
        .iter()
        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(lambda * v));
    let m_smo = smoothing
        .iter()
        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(gamma * v));
    ConditioningDiagnostic {
        frechet_to_regularization: ratio(m_g, m_sig),
        frechet_to_smoothing: ratio(m_g, m_smo),
        lambda,
        gamma,
    }
}

/// `true` when damping or smoothing is negligible against the data term.
pub fn is_ill_conditioned(diagnostic: &ConditioningDiagnostic) -> bool {
    diagnostic.is_ill_conditioned(CONDITIONING_RATIO_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn layered_prisms() -> Vec<Prism> {
        vec![
            Prism::new([0.0, 10.0], [0.0, 10.0], [0.0, 10.0]),
            Prism::new([0.0, 10.0], [0.0, 10.0], [10.0, 20.0]),
        ]
    }

    #[test]
    fn test_uniform_when_depth_ref_is_one() {
        assert_eq!(DepthWeighting::new(1.0, 100.0), DepthWeighting::Uniform);
        assert_eq!(DepthWeighting::new(1.0 + 1e-9, 100.0).scale(50.0), 1.0);
    }

    #[test]
    fn test_depth_scaling_directions() {
        let up = DepthWeighting::new(3.0, 20.0);
        // factor = 2/20, scale at z_mid = 20 reaches depth_ref
        assert!((up.scale(20.0) - 3.0).abs() < 1e-12);
        let down = DepthWeighting::new(0.5, 20.0);
        // factor = (2 - 1)/20, inverted
        assert!((down.scale(20.0) - 0.5).abs() < 1e-12);
        assert!((down.scale(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_density_weights_use_square() {
        let mut u = UncertaintyConfig::default();
        u.sigma_rho = 2.0;
        u.depth_ref = 3.0;
        let model = RegularizationModel::new(DataType::Gravity, PropertySet::Density, u);
        let w = model.weights(4, &layered_prisms(), 20.0);
        assert_eq!(w.sigma_data.len(), 4);
        assert_eq!(w.sigma_param.len(), 3);
        // mid depths 5 and 15, factor 0.1
        assert!((w.sigma_param[0] - 0.25 * 1.5f64.powi(2)).abs() < 1e-12);
        assert!((w.sigma_param[1] - 0.25 * 2.5f64.powi(2)).abs() < 1e-12);
        assert_eq!(w.sigma_param[2], 0.0);
    }

    #[test]
    fn test_magnetic_weights_use_cube() {
        let mut u = UncertaintyConfig::default();
        u.sigma_mag = 0.5;
        u.sigma_sus = 0.01;
        u.depth_ref = 3.0;
        let model = RegularizationModel::new(DataType::Magnetic, PropertySet::Susceptibility, u);
        let w = model.weights(2, &layered_prisms(), 20.0);
        assert!((w.sigma_data[0] - 4.0).abs() < 1e-12);
        assert!((w.sigma_param[1] - 1e4 * 2.5f64.powi(3)).abs() < 1e-6);
    }

    #[test]
    fn test_conditioning_ratios() {
        let normal = array![[100.0, 1.0], [1.0, 50.0]];
        let weights = Weights {
            sigma_data: array![1.0],
            sigma_param: array![2.0, 0.0],
        };
        let smoothing = array![[1.0, 0.0], [0.0, 0.0]];
        let d = conditioning_diagnostic(&normal, &weights, &smoothing, 10.0, 5.0);
        assert!((d.frechet_to_regularization - 5.0).abs() < 1e-12);
        assert!((d.frechet_to_smoothing - 20.0).abs() < 1e-12);
        assert!(is_ill_conditioned(&d));
    }

    #[test]
    fn test_zero_damping_is_flagged() {
        let normal = array![[1.0]];
        let weights = Weights {
            sigma_data: array![1.0],
            sigma_param: array![0.0],
        };
        let smoothing = array![[0.0]];
        let d = conditioning_diagnostic(&normal, &weights, &smoothing, 0.0, 0.0);
        assert!(d.frechet_to_regularization.is_infinite());
        assert!(is_ill_conditioned(&d));
    }
}
