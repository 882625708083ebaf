// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Linear Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linear algebra utilities.
//!
//! Dense direct inversion and weighting for the small normal-equation systems of
//! the prism inversion (a few tens to a few thousand unknowns).

use ndarray::{Array2, ArrayView1, ArrayView2};
use potfield_types::error::{PotfieldError, PotfieldResult};

/// Relative pivot size below which a matrix is treated as singular.
const SINGULAR_PIVOT_RTOL: f64 = 1e-14;

fn require_square(a: &ArrayView2<'_, f64>, context: &str) -> PotfieldResult<usize> {
    let (m, n) = a.dim();
    if m != n {
        return Err(PotfieldError::DimensionMismatch {
            context: format!("{context}: square matrix"),
            expected: m,
            got: n,
        });
    }
    if n == 0 {
        return Err(PotfieldError::LinAlg(format!("{context}: empty matrix")));
    }
    Ok(n)
}

fn pivot_floor(a: &ArrayView2<'_, f64>) -> f64 {
    let scale = a.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    scale * SINGULAR_PIVOT_RTOL
}

/// Inverse of a square matrix by Gauss-Jordan elimination with partial
/// pivoting.
///
/// Matches `numpy.linalg.inv` up to rounding for well-conditioned input.
pub fn invert(a: &Array2<f64>) -> PotfieldResult<Array2<f64>> {
    let view = a.view();
    let n = require_square(&view, "invert")?;
    let floor = pivot_floor(&view);

    let mut work = a.clone();
    let mut inv = Array2::eye(n);

    for col in 0..n {
        // Partial pivot
        let mut pivot_row = col;
        let mut pivot_abs = work[[col, col]].abs();
        for row in (col + 1)..n {
            let v = work[[row, col]].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs <= floor {
            return Err(PotfieldError::LinAlg(format!(
                "singular matrix: pivot {pivot_abs:e} in column {col}"
            )));
        }
        if pivot_row != col {
            for j in 0..n {
                work.swap([col, j], [pivot_row, j]);
                inv.swap([col, j], [pivot_row, j]);
            }
        }

        let inv_pivot = 1.0 / work[[col, col]];
        for j in 0..n {
            work[[col, j]] *= inv_pivot;
            inv[[col, j]] *= inv_pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[[row, j]] -= factor * work[[col, j]];
                inv[[row, j]] -= factor * inv[[col, j]];
            }
        }
    }

    Ok(inv)
}

/// `Gᵗ · diag(w)`: transpose of `g` with column `i` scaled by `w[i]`.
pub fn weighted_transpose(
    g: &ArrayView2<'_, f64>,
    w: &ArrayView1<'_, f64>,
) -> PotfieldResult<Array2<f64>> {
    let (rows, cols) = g.dim();
    if w.len() != rows {
        return Err(PotfieldError::DimensionMismatch {
            context: "weighted_transpose: weights".to_string(),
            expected: rows,
            got: w.len(),
        });
    }
    let mut out = Array2::zeros((cols, rows));
    for i in 0..rows {
        let wi = w[i];
        for j in 0..cols {
            out[[j, i]] = g[[i, j]] * wi;
        }
    }
    Ok(out)
}

/// Largest entry (signed) of a matrix, `-inf` when empty.
pub fn max_entry(a: &ArrayView2<'_, f64>) -> f64 {
    a.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
}
