// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Refinement Selector
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Choice of the prisms to split between iterations.
//!
//! For every sensor block and every inverted property, the contribution of a
//! prism at a residual maximum `i` is `|G[i, j]|·|r_i|`. Contributions are
//! normalized by their largest value within the block and property; prisms
//! above the amplitude threshold that can still be halved are selected.

use crate::mesh::PrismMesh;
use ndarray::{s, Array1, Array2, ArrayView2};
use potfield_math::extrema::{local_maxima_1d, local_maxima_2d};
use potfield_types::config::{PropertySet, RefinementConfig};
use potfield_types::error::{PotfieldError, PotfieldResult};
use potfield_types::state::{BlockShape, PrismId};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementSelector {
    pub window_half_width: usize,
    pub amplitude_threshold: f64,
}

impl From<&RefinementConfig> for RefinementSelector {
    fn from(cfg: &RefinementConfig) -> Self {
        RefinementSelector {
            window_half_width: cfg.window_half_width,
            amplitude_threshold: cfg.amplitude_threshold,
        }
    }
}

impl RefinementSelector {
    /// Flat indices (within the block) of the local maxima of `|residual|`.
    pub fn residual_maxima(&self, residual: &Array1<f64>, block: &BlockShape) -> Vec<usize> {
        let magnitude = residual
            .slice(s![block.offset..block.offset + block.len()])
            .mapv(f64::abs);
        if block.rows <= 1 {
            return local_maxima_1d(&magnitude.view(), self.window_half_width);
        }
        match magnitude.into_shape_with_order((block.rows, block.cols)) {
            Ok(map) => local_maxima_2d(&map.view(), self.window_half_width)
                .into_iter()
                .map(|(r, c)| r * block.cols + c)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Column indices (within `columns`) selected at the given maxima.
    fn significant_columns(
        &self,
        residual: &Array1<f64>,
        columns: &ArrayView2<'_, f64>,
        maxima: &[usize],
    ) -> Vec<usize> {
        let n_cols = columns.ncols();
        let mut contribution = Array2::<f64>::zeros((maxima.len(), n_cols));
        let mut largest = 0.0f64;
        for (m, &i) in maxima.iter().enumerate() {
            let r = residual[i].abs();
            for j in 0..n_cols {
                let c = columns[[i, j]].abs() * r;
                contribution[[m, j]] = c;
                largest = largest.max(c);
            }
        }
        if !(largest > 0.0) {
            return Vec::new();
        }
        (0..n_cols)
            .filter(|&j| {
                contribution
                    .column(j)
                    .iter()
                    .any(|&c| c / largest > self.amplitude_threshold)
            })
            .collect()
    }

    /// Unique ids of the prisms to split this iteration, in ascending order.
    ///
    /// `frechet` is the full sensitivity matrix (constant column included),
    /// `residual` the current median-centred residual.
    pub fn select<M: PrismMesh + ?Sized>(
        &self,
        residual: &Array1<f64>,
        frechet: &Array2<f64>,
        blocks: &[BlockShape],
        properties: PropertySet,
        mesh: &M,
    ) -> PotfieldResult<BTreeSet<PrismId>> {
        let ids = mesh.prism_ids();
        let n_prisms = ids.len();
        let expected_cols = n_prisms * properties.n_properties() + 1;
        if frechet.ncols() != expected_cols {
            return Err(PotfieldError::DimensionMismatch {
                context: "refinement: Frechet columns".to_string(),
                expected: expected_cols,
                got: frechet.ncols(),
            });
        }
        if frechet.nrows() != residual.len() {
            return Err(PotfieldError::DimensionMismatch {
                context: "refinement: residual length".to_string(),
                expected: frechet.nrows(),
                got: residual.len(),
            });
        }

        let mut selected = BTreeSet::new();
        for (iblock, block) in blocks.iter().enumerate() {
            if block.offset + block.len() > residual.len() {
                return Err(PotfieldError::DimensionMismatch {
                    context: format!("refinement: sensor block {}", iblock + 1),
                    expected: block.offset + block.len(),
                    got: residual.len(),
                });
            }
            let maxima = self.residual_maxima(residual, block);
            if maxima.is_empty() {
                continue;
            }
            let rows = block.range();
            let block_residual = residual.slice(s![rows.clone()]).to_owned();
            for ip in 0..properties.n_properties() {
                let cols = ip * n_prisms..(ip + 1) * n_prisms;
                let sub = frechet.slice(s![rows.clone(), cols]);
                for j in self.significant_columns(&block_residual, &sub, &maxima) {
                    let id = ids[j];
                    if mesh.can_split(id) {
                        selected.insert(id);
                    }
                }
            }
            debug!(
                "sensor {}: {} residual maxima, {} prisms selected so far",
                iblock + 1,
                maxima.len(),
                selected.len()
            );
        }
        Ok(selected)
    }
}
