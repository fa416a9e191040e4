//! End-to-end variance regression tests for copse-forest.
//!
//! These tests exercise the full training → prediction-matrix → variance
//! pipeline on a deterministic synthetic dataset and pin down the estimator
//! contracts: block structure, matrix shapes, non-negativity, and the decay
//! of Monte Carlo noise with ensemble size.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use copse_forest::{
    ForestConfig, Resampling, Task, VarIjOptions, VarUOptions,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic regression dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 5-feature regression dataset.
///
/// The response is a smooth function of features 0 and 1 plus a step in
/// feature 0 and bounded noise; features 2-4 are pure noise.
fn make_regression() -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 5;

    let mut features = Vec::with_capacity(n_samples);
    let mut response = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.r#gen::<f64>()).collect();
        let y = 2.0 * row[0] + row[1].sin() + if row[0] > 0.5 { 1.0 } else { 0.0 }
            + 0.1 * rng.r#gen::<f64>();
        features.push(row);
        response.push(y);
    }
    (features, response)
}

// ---------------------------------------------------------------------------
// a) ustat_end_to_end_shapes_and_nonnegativity
// ---------------------------------------------------------------------------

/// ntree=5000 with 25 blocks on 300 rows: trees-per-block derives to 200,
/// the prediction matrix is (5000, 300), OOB covers every sample, and all
/// U-statistic variances are non-negative.
#[test]
fn ustat_end_to_end_shapes_and_nonnegativity() {
    let (features, response) = make_regression();
    let fit = ForestConfig::new(Task::Regression)
        .with_ntree(5000)
        .with_blocks(25)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();

    let design = fit.forest().block_design().unwrap();
    assert_eq!(design.trees_per_block(), 200);
    assert_eq!(design.n_blocks() * design.trees_per_block(), 5000);

    assert_eq!(fit.oob().n_covered(), 300, "subsampled OOB must cover all");

    let matrix = fit.forest().predict_matrix(&features).unwrap();
    assert_eq!(matrix.n_trees(), 5000);
    assert_eq!(matrix.n_targets(), 300);

    let result = fit.variance_u(&matrix, VarUOptions::new()).unwrap();
    assert_eq!(result.estimates().len(), 300);
    for (j, est) in result.estimates().iter().enumerate() {
        assert!(est.variance >= 0.0, "target {j}: {}", est.variance);
        assert!(est.variance.is_finite(), "target {j}");
    }
}

// ---------------------------------------------------------------------------
// b) infjack_end_to_end_finite_table
// ---------------------------------------------------------------------------

/// ntree=1000 bootstrap on the same data: the infinitesimal-jackknife table
/// has one finite, non-negative row per training observation.
#[test]
fn infjack_end_to_end_finite_table() {
    let (features, response) = make_regression();
    let fit = ForestConfig::new(Task::Regression)
        .with_resampling(Resampling::Bootstrap)
        .with_ntree(1000)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();

    let matrix = fit.forest().predict_matrix(&features).unwrap();
    let result = fit.variance_ij(&matrix, VarIjOptions::new()).unwrap();

    assert_eq!(result.estimates().len(), 300);
    for (j, est) in result.estimates().iter().enumerate() {
        assert!(!est.variance.is_nan(), "target {j} variance is NaN");
        assert!(!est.point.is_nan(), "target {j} point is NaN");
        assert!(est.variance >= 0.0, "target {j}: {}", est.variance);
    }
}

// ---------------------------------------------------------------------------
// c) monte_carlo_component_decays_with_ensemble_size
// ---------------------------------------------------------------------------

/// With the block count fixed at 25, growing the ensemble must monotonically
/// shrink the mean Monte Carlo component of the U-statistic decomposition
/// (the total variance carries no such guarantee).
#[test]
fn monte_carlo_component_decays_with_ensemble_size() {
    let (features, response) = make_regression();

    let mean_monte_carlo = |ntree: usize| -> f64 {
        let fit = ForestConfig::new(Task::Regression)
            .with_ntree(ntree)
            .with_blocks(25)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();
        let matrix = fit.forest().predict_matrix(&features).unwrap();
        let result = fit
            .variance_u(&matrix, VarUOptions::new().with_separate(true))
            .unwrap();
        let total: f64 = result
            .estimates()
            .iter()
            .map(|e| e.monte_carlo_component.expect("separate mode"))
            .sum();
        total / result.estimates().len() as f64
    };

    let mc_1000 = mean_monte_carlo(1000);
    let mc_3000 = mean_monte_carlo(3000);
    let mc_5000 = mean_monte_carlo(5000);

    assert!(
        mc_1000 > mc_3000 && mc_3000 > mc_5000,
        "monte carlo components not decreasing: {mc_1000} {mc_3000} {mc_5000}"
    );
}

// ---------------------------------------------------------------------------
// d) ustat_covariance_diagonal_matches_on_test_points
// ---------------------------------------------------------------------------

/// Covariance over a held-out target set: diagonal equals the variance
/// vector exactly, for both estimators.
#[test]
fn covariance_diagonal_matches_on_test_points() {
    let (features, response) = make_regression();
    let test_points: Vec<Vec<f64>> = features.iter().take(20).cloned().collect();

    let fit_u = ForestConfig::new(Task::Regression)
        .with_ntree(500)
        .with_blocks(25)
        .with_seed(7)
        .fit(&features, &response)
        .unwrap();
    let matrix_u = fit_u.forest().predict_matrix(&test_points).unwrap();
    let result_u = fit_u
        .variance_u(&matrix_u, VarUOptions::new().with_covariance(true))
        .unwrap();
    let cov_u = result_u.covariance().unwrap();
    for (j, est) in result_u.estimates().iter().enumerate() {
        assert_eq!(cov_u.value(j, j), est.variance, "ustat target {j}");
    }

    let fit_ij = ForestConfig::new(Task::Regression)
        .with_resampling(Resampling::Bootstrap)
        .with_ntree(200)
        .with_seed(7)
        .fit(&features, &response)
        .unwrap();
    let matrix_ij = fit_ij.forest().predict_matrix(&test_points).unwrap();
    let result_ij = fit_ij
        .variance_ij(&matrix_ij, VarIjOptions::new().with_covariance(true))
        .unwrap();
    let cov_ij = result_ij.covariance().unwrap();
    for (j, est) in result_ij.estimates().iter().enumerate() {
        assert_eq!(cov_ij.value(j, j), est.variance, "infjack target {j}");
    }
}

// ---------------------------------------------------------------------------
// e) oob_estimates_reconstruct_from_inbag
// ---------------------------------------------------------------------------

/// OOB point estimates must equal the mean over exactly the trees whose bag
/// excludes the observation, reconstructed independently from the in-bag
/// matrix and the full prediction matrix.
#[test]
fn oob_estimates_reconstruct_from_inbag() {
    let (features, response) = make_regression();
    let fit = ForestConfig::new(Task::Regression)
        .with_ntree(200)
        .with_blocks(25)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();

    let forest = fit.forest();
    let inbag = fit.inbag();
    let matrix = forest.predict_matrix(&features).unwrap();

    for (i, point) in fit.oob().point().iter().enumerate() {
        let contributing: Vec<f64> = (0..forest.n_trees())
            .filter(|&t| !inbag.is_in_bag(t, i))
            .map(|t| matrix.value(t, i))
            .collect();
        let p = point.expect("subsampled bags leave every sample out somewhere");
        let expected = contributing.iter().sum::<f64>() / contributing.len() as f64;
        assert!((p - expected).abs() < 1e-12, "sample {i}");
    }
}

// ---------------------------------------------------------------------------
// f) binary_classification_pipeline
// ---------------------------------------------------------------------------

/// A 0/1-coded response flows through the same pipeline: probabilities stay
/// in [0, 1], variances stay non-negative, and the OOB accuracy is sane on a
/// separable dataset.
#[test]
fn binary_classification_pipeline() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n = 200;
    let mut features = Vec::with_capacity(n);
    let mut response = Vec::with_capacity(n);
    for _ in 0..n {
        let row: Vec<f64> = (0..4).map(|_| rng.r#gen::<f64>()).collect();
        let label = f64::from(u8::from(row[0] + 0.2 * row[1] > 0.6));
        features.push(row);
        response.push(label);
    }

    let fit = ForestConfig::new(Task::BinaryClassification)
        .with_ntree(600)
        .with_blocks(20)
        .with_seed(42)
        .fit(&features, &response)
        .unwrap();

    let matrix = fit.forest().predict_matrix(&features).unwrap();
    for j in 0..matrix.n_targets() {
        for t in 0..matrix.n_trees() {
            let p = matrix.value(t, j);
            assert!((0.0..=1.0).contains(&p), "tree {t} target {j}: {p}");
        }
    }

    let result = fit
        .variance_u(&matrix, VarUOptions::new().with_separate(true))
        .unwrap();
    for est in result.estimates() {
        assert!(est.variance >= 0.0);
        assert!((0.0..=1.0).contains(&est.point));
    }

    match fit.oob().score() {
        Some(copse_forest::OobScore::Accuracy(acc)) => {
            assert!(acc > 0.75, "oob accuracy {acc}");
        }
        other => panic!("expected accuracy score, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// g) deterministic_variance_tables
// ---------------------------------------------------------------------------

/// Same config and seed must produce identical variance tables across two
/// independent runs.
#[test]
fn deterministic_variance_tables() {
    let (features, response) = make_regression();
    let config = ForestConfig::new(Task::Regression)
        .with_ntree(300)
        .with_blocks(25)
        .with_seed(99);

    let run = || {
        let fit = config.clone().fit(&features, &response).unwrap();
        let matrix = fit.forest().predict_matrix(&features).unwrap();
        fit.variance_u(&matrix, VarUOptions::new()).unwrap().variances()
    };

    assert_eq!(run(), run(), "variance tables differ across runs");
}
