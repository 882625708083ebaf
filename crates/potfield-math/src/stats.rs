// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Robust Statistics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Reductions over observation vectors.
//!
//! Non-finite samples (gaps in gridded surveys) are skipped.

use ndarray::ArrayView1;

/// Median of the finite samples, `None` when there are none.
pub fn median(values: &ArrayView1<'_, f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let n = finite.len();
    let mid = n / 2;
    if n % 2 == 1 {
        Some(finite[mid])
    } else {
        Some(0.5 * (finite[mid - 1] + finite[mid]))
    }
}

/// Mean of the finite samples, `None` when there are none.
pub fn mean(values: &ArrayView1<'_, f64>) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Population standard deviation (divisor `n`) of the finite samples.
pub fn std_population(values: &ArrayView1<'_, f64>) -> Option<f64> {
    let mu = mean(values)?;
    let (ss, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), &v| (s + (v - mu) * (v - mu), c + 1));
    Some((ss / count as f64).sqrt())
}
