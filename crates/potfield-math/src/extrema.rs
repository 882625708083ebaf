// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Local Extrema
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Strict local maxima of profiles and maps.
//!
//! A sample is a maximum when it is larger than every other sample inside a
//! window of `half_width` samples on each side (a square window for maps).
//! The window is clipped at the array edges. Plateaus yield no maximum.
//! Non-finite samples never qualify and never block a neighbour.

use ndarray::{ArrayView1, ArrayView2};

/// Indices of the strict local maxima of a profile, in increasing order.
pub fn local_maxima_1d(values: &ArrayView1<'_, f64>, half_width: usize) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();
    for i in 0..n {
        let v = values[i];
        if !v.is_finite() {
            continue;
        }
        let lo = i.saturating_sub(half_width);
        let hi = (i + half_width).min(n - 1);
        let blocked = (lo..=hi).any(|k| k != i && values[k] >= v);
        if !blocked {
            maxima.push(i);
        }
    }
    maxima
}

/// `(row, col)` of the strict local maxima of a map, in row-major order.
pub fn local_maxima_2d(map: &ArrayView2<'_, f64>, half_width: usize) -> Vec<(usize, usize)> {
    let (rows, cols) = map.dim();
    let mut maxima = Vec::new();
    for r in 0..rows {
        let r_lo = r.saturating_sub(half_width);
        let r_hi = (r + half_width).min(rows - 1);
        for c in 0..cols {
            let v = map[[r, c]];
            if !v.is_finite() {
                continue;
            }
            let c_lo = c.saturating_sub(half_width);
            let c_hi = (c + half_width).min(cols - 1);
            let mut dominant = true;
            'window: for rr in r_lo..=r_hi {
                for cc in c_lo..=c_hi {
                    if (rr, cc) != (r, c) && map[[rr, cc]] >= v {
                        dominant = false;
                        break 'window;
                    }
                }
            }
            if dominant {
                maxima.push((r, c));
            }
        }
    }
    maxima
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn test_single_peak_1d() {
        let v: Array1<f64> = (0..21)
            .map(|i| (-((i as f64 - 10.0) / 3.0).powi(2)).exp())
            .collect();
        assert_eq!(local_maxima_1d(&v.view(), 3), vec![10]);
    }

    #[test]
    fn test_window_separates_peaks_1d() {
        let v = array![0.0, 3.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        // Half-width 1 sees every bump.
        assert_eq!(local_maxima_1d(&v.view(), 1), vec![1, 3, 8]);
        // Half-width 2 lets the peak at 1 suppress the one at 3.
        assert_eq!(local_maxima_1d(&v.view(), 2), vec![1, 8]);
    }

    #[test]
    fn test_plateau_is_not_a_maximum() {
        let v = array![0.0, 1.0, 1.0, 0.0];
        assert!(local_maxima_1d(&v.view(), 1).is_empty());
    }

    #[test]
    fn test_edges_qualify() {
        let v = array![5.0, 1.0, 0.0, 1.0, 6.0];
        assert_eq!(local_maxima_1d(&v.view(), 2), vec![0, 4]);
    }

    #[test]
    fn test_nan_ignored() {
        let v = array![1.0, f64::NAN, 2.0, 0.5];
        assert_eq!(local_maxima_1d(&v.view(), 1), vec![0, 2]);
    }

    #[test]
    fn test_single_peak_2d() {
        let mut m = Array2::<f64>::zeros((7, 9));
        for r in 0..7 {
            for c in 0..9 {
                let dr = r as f64 - 3.0;
                let dc = c as f64 - 5.0;
                m[[r, c]] = (-(dr * dr + dc * dc) / 4.0).exp();
            }
        }
        assert_eq!(local_maxima_2d(&m.view(), 2), vec![(3, 5)]);
    }

    #[test]
    fn test_square_window_uses_diagonals() {
        let m = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]];
        // The diagonal neighbour dominates the centre.
        assert_eq!(local_maxima_2d(&m.view(), 1), vec![(2, 2)]);
    }
}
