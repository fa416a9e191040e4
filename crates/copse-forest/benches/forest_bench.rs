//! Criterion benchmarks for copse-forest: ensemble training and variance
//! estimation.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use copse_forest::{ForestConfig, Resampling, Task, VarIjOptions, VarUOptions};

fn make_regression(n_samples: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut response = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>()).collect();
        let y = 2.0 * row[0] + row[1] + 0.1 * rng.r#gen::<f64>();
        features.push(row);
        response.push(y);
    }
    (features, response)
}

fn bench_subsample_train(c: &mut Criterion) {
    let (features, response) = make_regression(300, 5, 42);
    let cfg = ForestConfig::new(Task::Regression)
        .with_ntree(1000)
        .with_blocks(25)
        .with_seed(42);

    c.bench_function("forest_train_subsample_300x5_1000trees", |b| {
        b.iter(|| cfg.fit(&features, &response).unwrap());
    });
}

fn bench_var_u(c: &mut Criterion) {
    let (features, response) = make_regression(300, 5, 42);
    let fit = ForestConfig::new(Task::Regression)
        .with_ntree(1000)
        .with_blocks(25)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();
    let matrix = fit.forest().predict_matrix(&features).unwrap();

    c.bench_function("var_u_300targets_1000trees", |b| {
        b.iter(|| fit.variance_u(&matrix, VarUOptions::new().with_separate(true)).unwrap());
    });
}

fn bench_var_ij(c: &mut Criterion) {
    let (features, response) = make_regression(300, 5, 42);
    let fit = ForestConfig::new(Task::Regression)
        .with_resampling(Resampling::Bootstrap)
        .with_ntree(500)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();
    let matrix = fit.forest().predict_matrix(&features).unwrap();

    c.bench_function("var_ij_300targets_500trees", |b| {
        b.iter(|| fit.variance_ij(&matrix, VarIjOptions::new()).unwrap());
    });
}

criterion_group!(benches, bench_subsample_train, bench_var_u, bench_var_ij);
criterion_main!(benches);
