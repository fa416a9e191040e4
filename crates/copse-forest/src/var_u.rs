//! U-statistic variance estimation for subsampled ensembles.
//!
//! Trees drawn without replacement in the block/pivot design behave as an
//! incomplete U-statistic: block means are exchangeable replicates whose
//! spread identifies the sampling variability, while the spread of individual
//! trees identifies the Monte Carlo noise of a finite ensemble. Per target
//! observation the estimate decomposes as
//!
//! ```text
//! variance = (k²/n) · max(0, ζ̂₁ − ζ̂ₖ/L)  +  ζ̂ₖ/ntree
//!            └──────── sampling ────────┘    └ Monte Carlo ┘
//! ```
//!
//! where `ζ̂₁` is the between-block variance of block means, `ζ̂ₖ` the variance
//! across all tree predictions, `k` the subsample size, and `n` the training
//! set size. The `ζ̂ₖ/L` term removes the Monte Carlo noise baked into the raw
//! block means; subtracting it can drive the sampling component negative for
//! small effective block counts, in which case it is clipped to zero. The
//! clipping is a deliberate bias of the otherwise unbiased estimator.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ForestError;
use crate::predict::PredictionMatrix;
use crate::result::{CovarianceMatrix, ForestFit, VarianceEstimate, VarianceResult};

/// Options for the U-statistic variance estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarUOptions {
    pub(crate) covariance: bool,
    pub(crate) separate: bool,
}

impl VarUOptions {
    /// Create options with covariance and component separation disabled.
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

    /// Report the sampling and Monte Carlo components individually.
    #[must_use]
    pub fn with_separate(mut self, separate: bool) -> Self {
        self.separate = separate;
        self
    }

    /// Return whether the covariance matrix is requested.
    #[must_use]
    pub fn covariance(&self) -> bool {
        self.covariance
    }

    /// Return whether separated components are requested.
    #[must_use]
    pub fn separate(&self) -> bool {
        self.separate
    }
}

/// Per-target sufficient statistics for the pairwise computation.
struct TargetStats {
    mean: f64,
    block_means: Vec<f64>,
}

/// Raw (unclipped) sampling component and Monte Carlo component for a pair
/// of targets.
fn pair_components(
    stats_i: &TargetStats,
    stats_j: &TargetStats,
    col_i: &[f64],
    col_j: &[f64],
    trees_per_block: usize,
    scale: f64,
) -> (f64, f64) {
    let n_blocks = stats_i.block_means.len();
    let m = col_i.len();

    let cov_blocks: f64 = stats_i
        .block_means
        .iter()
        .zip(&stats_j.block_means)
        .map(|(&bi, &bj)| (bi - stats_i.mean) * (bj - stats_j.mean))
        .sum::<f64>()
        / (n_blocks - 1) as f64;

    let cov_trees: f64 = col_i
        .iter()
        .zip(col_j)
        .map(|(&pi, &pj)| (pi - stats_i.mean) * (pj - stats_j.mean))
        .sum::<f64>()
        / (m - 1) as f64;

    let sampling_raw = scale * (cov_blocks - cov_trees / trees_per_block as f64);
    let monte_carlo = cov_trees / m as f64;
    (sampling_raw, monte_carlo)
}

impl ForestFit {
    /// Estimate the prediction variance of a subsampled ensemble.
    ///
    /// Per target: the point estimate (mean over all trees), the total
    /// variance, and — with [`VarUOptions::with_separate`] — the sampling and
    /// Monte Carlo components whose sum is the total. With
    /// [`VarUOptions::with_covariance`] the full symmetric covariance matrix
    /// over the target set is also produced; its diagonal equals the
    /// per-target variances exactly.
    ///
    /// Negative raw sampling components (a finite-sample artifact of the
    /// Monte Carlo correction) are clipped to zero.
    ///
    /// # Errors
    ///
    /// | Variant                                   | When                                   |
    /// |-------------------------------------------|----------------------------------------|
    /// | [`ForestError::SubsampleForestRequired`]  | forest was bootstrap-trained           |
    /// | [`ForestError::InsufficientBlocks`]       | fewer than 2 blocks                    |
    /// | [`ForestError::MatrixShapeMismatch`]      | matrix rows != ensemble size           |
    pub fn variance_u(
        &self,
        predictions: &PredictionMatrix,
        options: VarUOptions,
    ) -> Result<VarianceResult, ForestError> {
        let forest = self.forest();
        let design = forest
            .block_design()
            .copied()
            .ok_or(ForestError::SubsampleForestRequired)?;
        if predictions.n_trees() != forest.n_trees() {
            return Err(ForestError::MatrixShapeMismatch {
                expected_trees: forest.n_trees(),
                got_trees: predictions.n_trees(),
            });
        }
        if design.n_blocks() < 2 {
            return Err(ForestError::InsufficientBlocks {
                n_blocks: design.n_blocks(),
            });
        }

        let n_targets = predictions.n_targets();
        let trees_per_block = design.trees_per_block();
        let k = forest.sample_size() as f64;
        let scale = k * k / forest.n_train() as f64;

        // Per-target means and block means, computed once.
        let stats: Vec<TargetStats> = (0..n_targets)
            .into_par_iter()
            .map(|j| {
                let column = predictions.target_column(j);
                let mean = column.iter().sum::<f64>() / column.len() as f64;
                let block_means: Vec<f64> = (0..design.n_blocks())
                    .map(|b| {
                        let range = design.trees_in(b);
                        column[range].iter().sum::<f64>() / trees_per_block as f64
                    })
                    .collect();
                TargetStats { mean, block_means }
            })
            .collect();

        let estimates: Vec<VarianceEstimate> = (0..n_targets)
            .map(|j| {
                let column = predictions.target_column(j);
                let (sampling_raw, monte_carlo) =
                    pair_components(&stats[j], &stats[j], column, column, trees_per_block, scale);
                let sampling = sampling_raw.max(0.0);
                VarianceEstimate {
                    point: stats[j].mean,
                    variance: sampling + monte_carlo,
                    sampling_component: options.separate.then_some(sampling),
                    monte_carlo_component: options.separate.then_some(monte_carlo),
                }
            })
            .collect();

        let covariance = if options.covariance {
            // Upper triangle, mirrored; the diagonal reuses the clipped
            // scalar path so it matches the variance vector exactly.
            let rows: Vec<Vec<f64>> = (0..n_targets)
                .into_par_iter()
                .map(|i| {
                    let col_i = predictions.target_column(i);
                    (i..n_targets)
                        .map(|j| {
                            if i == j {
                                return estimates[i].variance;
                            }
                            let col_j = predictions.target_column(j);
                            let (sampling_raw, monte_carlo) = pair_components(
                                &stats[i],
                                &stats[j],
                                col_i,
                                col_j,
                                trees_per_block,
                                scale,
                            );
                            sampling_raw + monte_carlo
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
