//! Estimator benchmarks
//!
//! Fit cost of each registry estimator on a synthetic gravity design:
//! - Closed-form linear models (OLS, Ridge)
//! - Coordinate-descent Lasso
//! - Histogram tree ensembles across training sizes
//!
//! Measure before optimizing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gravity_lab::models::{
    GradientBoostingRegressor, Lasso, LinearRegression, RandomForestRegressor, Regressor, Ridge,
};
use gravity_lab::parallel::Workers;
use gravity_lab::split::{FeatureMatrix, BASE_FEATURES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Synthetic log-linear gravity data with noise
fn gravity_design(n_rows: usize) -> (FeatureMatrix, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let names: Vec<String> = BASE_FEATURES.iter().map(ToString::to_string).collect();
    let mut values = Vec::with_capacity(n_rows * names.len());
    let mut y = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let log_gdp_o = rng.gen_range(20.0..30.0);
        let log_gdp_d = rng.gen_range(20.0..30.0);
        let log_dist = rng.gen_range(4.0..9.5);
        let contig = f64::from(u8::from(rng.gen_bool(0.1)));
        let comlang = f64::from(u8::from(rng.gen_bool(0.2)));
        let log_pop_o = rng.gen_range(12.0..21.0);
        let log_pop_d = rng.gen_range(12.0..21.0);
        values.extend([log_gdp_o, log_gdp_d, log_dist, contig, comlang, log_pop_o, log_pop_d]);
        y.push(
            0.9 * log_gdp_o + 0.8 * log_gdp_d - 1.1 * log_dist + 0.5 * contig + 0.3 * comlang
                - 25.0
                + rng.gen_range(-0.5..0.5),
        );
    }

    (FeatureMatrix::new(names, values).unwrap(), y)
}

fn bench_linear(c: &mut Criterion) {
    let (x, y) = gravity_design(20_000);
    let mut group = c.benchmark_group("linear_fit");

    group.bench_function("ols", |b| {
        b.iter(|| {
            let mut model = LinearRegression::new();
            model.fit(black_box(&x), black_box(&y)).unwrap();
        });
    });
    group.bench_function("ridge", |b| {
        b.iter(|| {
            let mut model = Ridge::new(1.0);
            model.fit(black_box(&x), black_box(&y)).unwrap();
        });
    });
    group.bench_function("lasso", |b| {
        b.iter(|| {
            let mut model = Lasso::new(0.001).with_max_iter(10_000);
            model.fit(black_box(&x), black_box(&y)).unwrap();
        });
    });

    group.finish();
}

fn bench_ensembles(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble_fit");
    group.sample_size(10);

    for &n_rows in &[1_000usize, 10_000] {
        let (x, y) = gravity_design(n_rows);

        group.bench_with_input(BenchmarkId::new("random_forest_50", n_rows), &n_rows, |b, _| {
            b.iter(|| {
                let mut model = RandomForestRegressor::new(42).with_n_estimators(50);
                model.fit(black_box(&x), black_box(&y)).unwrap();
            });
        });
        group.bench_with_input(
            BenchmarkId::new("random_forest_50_sequential", n_rows),
            &n_rows,
            |b, _| {
                b.iter(|| {
                    let mut model = RandomForestRegressor::new(42)
                        .with_n_estimators(50)
                        .with_workers(Workers::Sequential);
                    model.fit(black_box(&x), black_box(&y)).unwrap();
                });
            },
        );
        group.bench_with_input(BenchmarkId::new("gradient_boosting_100", n_rows), &n_rows, |b, _| {
            b.iter(|| {
                let mut model = GradientBoostingRegressor::new(42).with_n_estimators(100);
                model.fit(black_box(&x), black_box(&y)).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_linear, bench_ensembles);
criterion_main!(benches);
