//! Infinitesimal-jackknife variance estimation for bootstrapped ensembles.
//!
//! The estimate for a target observation is
//!
//! ```text
//! variance = Σᵢ Covᵢ²  −  n · V̄(N) · v̂ / ntree
//! ```
//!
//! where `Covᵢ` is the covariance, across trees, between training sample
//! `i`'s in-bag count and the tree's prediction, `V̄(N)` the mean across-tree
//! count variance, and `v̂` the variance of the tree predictions. The
//! subtracted term removes the upward Monte Carlo bias of a finite ensemble;
//! it can overshoot for small ensembles, in which case the result is clipped
//! to zero. Stable behavior needs `ntree` on the order of `sqrt(n)` up to
//! `n / log(n)`; smaller ensembles still execute.
//!
//! For classification forests the matrix entries are per-tree class-1
//! probabilities (leaf means), so the same covariance formula applies
//! unchanged — no vote-label matrix is involved.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::error::ForestError;
use crate::forest::SamplingMode;
use crate::inbag::InBagMatrix;
use crate::predict::PredictionMatrix;
use crate::result::{CovarianceMatrix, ForestFit, VarianceEstimate, VarianceResult};

/// Options for the infinitesimal-jackknife variance estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarIjOptions {
    pub(crate) covariance: bool,
    pub(crate) calibrate: bool,
}

impl VarIjOptions {
    /// Create options with covariance and calibration disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compute the full covariance matrix over the target set.
    #[must_use]
    pub fn with_covariance(mut self, covariance: bool) -> Self {
        self.covariance = covariance;
        self
    }

    /// Stabilize the estimates by empirical-Bayes shrinkage.
    ///
    /// The Monte Carlo noise level is measured by re-running the estimator on
    /// half the ensemble; the estimates are then shrunk toward the
    /// method-of-moments prior fitted to their deconvolved distribution,
    /// which pulls anomalously low raw values up toward the bulk.
    #[must_use]
    pub fn with_calibrate(mut self, calibrate: bool) -> Self {
        self.calibrate = calibrate;
        self
    }

    /// Return whether the covariance matrix is requested.
    #[must_use]
    pub fn covariance(&self) -> bool {
        self.covariance
    }

    /// Return whether calibration is requested.
    #[must_use]
    pub fn calibrate(&self) -> bool {
        self.calibrate
    }
}

/// Per-target pieces of the jackknife computation over one tree subset.
struct IjTarget {
    mean: f64,
    /// Centered predictions, one per subset tree.
    centered: Vec<f64>,
    /// Per training sample: across-tree covariance between in-bag count and
    /// prediction.
    cov_inbag: Vec<f64>,
}

/// Compute per-target jackknife statistics over a subset of trees.
fn ij_targets(
    predictions: &PredictionMatrix,
    inbag: &InBagMatrix,
    trees: &[usize],
) -> Vec<IjTarget> {
    let m = trees.len() as f64;
    let n_train = inbag.n_samples();

    (0..predictions.n_targets())
        .into_par_iter()
        .map(|j| {
            let column = predictions.target_column(j);
            let mean = trees.iter().map(|&t| column[t]).sum::<f64>() / m;
            let centered: Vec<f64> = trees.iter().map(|&t| column[t] - mean).collect();

            // Centered predictions sum to zero, so the mean-count term of the
            // covariance vanishes and a plain weighted sum remains.
            let mut cov_inbag = vec![0.0f64; n_train];
            for (idx, &t) in trees.iter().enumerate() {
                let w = centered[idx];
                for (i, &count) in inbag.row(t).iter().enumerate() {
                    cov_inbag[i] += f64::from(count) * w;
                }
            }
            for c in &mut cov_inbag {
                *c /= m;
            }

            IjTarget {
                mean,
                centered,
                cov_inbag,
            }
        })
        .collect()
}

/// Mean across training samples of the across-tree count variance.
fn mean_count_variance(inbag: &InBagMatrix, trees: &[usize]) -> f64 {
    let m = trees.len() as f64;
    let n_train = inbag.n_samples();
    let mut sum = vec![0.0f64; n_train];
    let mut sum_sq = vec![0.0f64; n_train];
    for &t in trees {
        for (i, &count) in inbag.row(t).iter().enumerate() {
            let c = f64::from(count);
            sum[i] += c;
            sum_sq[i] += c * c;
        }
    }
    let total: f64 = (0..n_train)
        .map(|i| {
            let mean = sum[i] / m;
            sum_sq[i] / m - mean * mean
        })
        .sum();
    total / n_train as f64
}

/// Bias-corrected (unclipped) variance estimates for every target.
fn corrected_variances(targets: &[IjTarget], mean_count_var: f64, n_train: usize) -> Vec<f64> {
    targets
        .iter()
        .map(|target| {
            let m = target.centered.len() as f64;
            let raw: f64 = target.cov_inbag.iter().map(|&c| c * c).sum();
            let boot_var: f64 = target.centered.iter().map(|&c| c * c).sum::<f64>() / m;
            raw - n_train as f64 * mean_count_var * boot_var / m
        })
        .collect()
}

/// Linear empirical-Bayes shrinkage toward the method-of-moments prior.
fn shrink_toward_prior(vars: &[f64], sigma2: f64) -> Vec<f64> {
    if sigma2 <= 0.0 || vars.len() < 2 {
        return vars.to_vec();
    }
    let n = vars.len() as f64;
    let prior_mean = vars.iter().sum::<f64>() / n;
    let empirical_var =
        vars.iter().map(|&v| (v - prior_mean) * (v - prior_mean)).sum::<f64>() / (n - 1.0);
    let prior_var = (empirical_var - sigma2).max(0.0);
    if prior_var == 0.0 {
        return vec![prior_mean; vars.len()];
    }
    let lambda = prior_var / (prior_var + sigma2);
    vars.iter()
        .map(|&v| prior_mean + lambda * (v - prior_mean))
        .collect()
}

impl ForestFit {
    /// Estimate the prediction variance of a bootstrapped ensemble via the
    /// infinitesimal jackknife.
    ///
    /// Per target: the point estimate (mean over all trees) and the
    /// bias-corrected variance, clipped at zero. With
    /// [`VarIjOptions::with_covariance`] the full symmetric covariance matrix
    /// over the target set is also produced; its diagonal equals the
    /// per-target variances exactly. With [`VarIjOptions::with_calibrate`]
    /// the variances are stabilized by empirical-Bayes shrinkage before
    /// clipping (ensembles of fewer than four trees skip calibration).
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                         |
    /// |------------------------------------------|------------------------------|
    /// | [`ForestError::BootstrapForestRequired`] | forest was subsample-trained |
    /// | [`ForestError::MatrixShapeMismatch`]     | matrix rows != ensemble size |
    pub fn variance_ij(
        &self,
        predictions: &PredictionMatrix,
        options: VarIjOptions,
    ) -> Result<VarianceResult, ForestError> {
        let forest = self.forest();
        if forest.sampling_mode() != SamplingMode::Bootstrap {
            return Err(ForestError::BootstrapForestRequired);
        }
        if predictions.n_trees() != forest.n_trees() {
            return Err(ForestError::MatrixShapeMismatch {
                expected_trees: forest.n_trees(),
                got_trees: predictions.n_trees(),
            });
        }

        let inbag = self.inbag();
        let n_train = forest.n_train();
        let ntree = forest.n_trees();

        let all_trees: Vec<usize> = (0..ntree).collect();
        let targets = ij_targets(predictions, inbag, &all_trees);
        let mean_count_var = mean_count_variance(inbag, &all_trees);
        let mut variances = corrected_variances(&targets, mean_count_var, n_train);

        if options.calibrate {
            if ntree >= 4 {
                // Noise level from a half-ensemble re-run: trees are
                // exchangeable, so every other tree is as good as a random
                // half and keeps the run deterministic.
                let half: Vec<usize> = (0..ntree).step_by(2).collect();
                let half_targets = ij_targets(predictions, inbag, &half);
                let half_count_var = mean_count_variance(inbag, &half);
                let half_vars = corrected_variances(&half_targets, half_count_var, n_train);

                let sigma2_half = variances
                    .iter()
                    .zip(&half_vars)
                    .map(|(&v, &h)| (h - v) * (h - v))
                    .sum::<f64>()
                    / variances.len() as f64;
                let delta = half.len() as f64 / ntree as f64;
                let sigma2 = (delta * delta + (1.0 - delta) * (1.0 - delta))
                    / (2.0 * (1.0 - delta) * (1.0 - delta))
                    * sigma2_half;

                variances = shrink_toward_prior(&variances, sigma2);
            } else {
                debug!(ntree, "ensemble too small to calibrate; skipping");
            }
        }

        let estimates: Vec<VarianceEstimate> = targets
            .iter()
            .zip(&variances)
            .map(|(target, &variance)| VarianceEstimate {
                point: target.mean,
                variance: variance.max(0.0),
                sampling_component: None,
                monte_carlo_component: None,
            })
            .collect();

        let covariance = if options.covariance {
            let n_targets = targets.len();
            let scale = n_train as f64 * mean_count_var;
            let rows: Vec<Vec<f64>> = (0..n_targets)
                .into_par_iter()
                .map(|a| {
                    (a..n_targets)
                        .map(|b| {
                            if a == b {
                                return estimates[a].variance;
                            }
                            let m = ntree as f64;
                            let raw: f64 = targets[a]
                                .cov_inbag
                                .iter()
                                .zip(&targets[b].cov_inbag)
                                .map(|(&ca, &cb)| ca * cb)
                                .sum();
                            let boot_cov: f64 = targets[a]
                                .centered
                                .iter()
                                .zip(&targets[b].centered)
                                .map(|(&ca, &cb)| ca * cb)
                                .sum::<f64>()
                                / m;
                            raw - scale * boot_cov / m
                        })
                        .collect()
                })
                .collect();
            Some(CovarianceMatrix::from_upper_triangle(rows))
        } else {
            None
        };

        Ok(VarianceResult::new(estimates, covariance))
    }
}
