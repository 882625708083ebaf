// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Dense Inverse Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Array2};
use potfield_math::linalg::{invert, weighted_transpose};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

/// Symmetric positive definite normal-equation matrix of size `n`.
fn normal_matrix(n: usize, rng: &mut StdRng) -> Array2<f64> {
    let g = Array2::from_shape_fn((2 * n, n), |_| rng.gen_range(-1.0..1.0));
    let mut a = g.t().dot(&g);
    for i in 0..n {
        a[[i, i]] += 1e-3;
    }
    a
}

fn bench_invert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("gauss_jordan_invert");
    group.sample_size(10);
    for &n in &[41usize, 161, 321] {
        let a = normal_matrix(n, &mut rng);
        group.bench_function(format!("n{n}"), |b| {
            b.iter(|| {
                let inv = invert(&a).unwrap();
                black_box(inv[[0, 0]]);
            })
        });
    }
    group.finish();
}

fn bench_normal_equations(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let (n_data, n_params) = (400, 161);
    let g = Array2::from_shape_fn((n_data, n_params), |_| rng.gen_range(-1.0..1.0));
    let w = Array1::from_shape_fn(n_data, |_| rng.gen_range(0.5..2.0));
    let rhs = Array1::from_shape_fn(n_data, |_| rng.gen_range(-1.0..1.0));

    let mut group = c.benchmark_group("normal_equations_400x161");
    group.sample_size(10);
    group.bench_function("form_and_invert", |b| {
        b.iter(|| {
            let gct = weighted_transpose(&g.view(), &w.view()).unwrap();
            let mut normal = gct.dot(&g);
            for i in 0..n_params {
                normal[[i, i]] += 1e-3;
            }
            let x = invert(&normal).unwrap().dot(&gct.dot(&rhs));
            black_box(x[0]);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_invert, bench_normal_equations);
criterion_main!(benches);
