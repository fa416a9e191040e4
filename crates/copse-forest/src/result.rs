//! Training and variance-estimation result types.

use crate::forest::Forest;
use crate::inbag::InBagMatrix;
use crate::oob::OobPredictions;

/// Metadata about the training run.
#[derive(Debug, Clone)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub ntree: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Resolved per-tree bag size.
    pub sample_size: usize,
    /// Resolved max_features value used.
    pub max_features_resolved: usize,
    /// Number of blocks, for subsampled ensembles.
    pub n_blocks: Option<usize>,
    /// Trees per block, for subsampled ensembles.
    pub trees_per_block: Option<usize>,
}

/// Result of forest training.
///
/// Owns the fitted forest, its in-bag matrix, and the eagerly computed
/// out-of-bag estimates. All parts are immutable after construction, so a
/// `ForestFit` may be shared across concurrent prediction and variance
/// requests without locking.
#[derive(Debug)]
pub struct ForestFit {
    forest: Forest,
    inbag: InBagMatrix,
    oob: OobPredictions,
    metadata: TrainingMetadata,
}

impl ForestFit {
    pub(crate) fn new(
        forest: Forest,
        inbag: InBagMatrix,
        oob: OobPredictions,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            inbag,
            oob,
            metadata,
        }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the fit and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Return the in-bag count matrix.
    #[must_use]
    pub fn inbag(&self) -> &InBagMatrix {
        &self.inbag
    }

    /// Return the out-of-bag point estimates.
    #[must_use]
    pub fn oob(&self) -> &OobPredictions {
        &self.oob
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}

/// Variance estimate for a single target observation.
#[derive(Debug, Clone, Copy)]
pub struct VarianceEstimate {
    /// Mean prediction over all trees.
    pub point: f64,
    /// Total variance estimate (non-negative after clipping).
    pub variance: f64,
    /// Sampling-variability component; present in `separate` mode.
    pub sampling_component: Option<f64>,
    /// Monte Carlo noise component; present in `separate` mode.
    pub monte_carlo_component: Option<f64>,
}

/// Symmetric covariance matrix over a target observation set.
#[derive(Debug, Clone)]
pub struct CovarianceMatrix {
    values: Vec<f64>,
    n: usize,
}

impl CovarianceMatrix {
    /// Build from upper-triangle rows: `rows[i]` holds entries for columns
    /// `i..n`. The lower triangle is mirrored.
    pub(crate) fn from_upper_triangle(rows: Vec<Vec<f64>>) -> Self {
        let n = rows.len();
        let mut values = vec![0.0f64; n * n];
        for (i, row) in rows.iter().enumerate() {
            debug_assert_eq!(row.len(), n - i);
            for (offset, &v) in row.iter().enumerate() {
                let j = i + offset;
                values[i * n + j] = v;
                values[j * n + i] = v;
            }
        }
        Self { values, n }
    }

    /// Return the number of target observations.
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.n
    }

    /// Return the covariance between targets `i` and `j`.
    #[must_use]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Return the diagonal as a vector.
    #[must_use]
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.value(i, i)).collect()
    }
}

/// Terminal output of a variance estimator.
#[derive(Debug, Clone)]
pub struct VarianceResult {
    estimates: Vec<VarianceEstimate>,
    covariance: Option<CovarianceMatrix>,
}

impl VarianceResult {
    pub(crate) fn new(
        estimates: Vec<VarianceEstimate>,
        covariance: Option<CovarianceMatrix>,
    ) -> Self {
        Self {
            estimates,
            covariance,
        }
    }

    /// Return the per-target estimates.
    #[must_use]
    pub fn estimates(&self) -> &[VarianceEstimate] {
        &self.estimates
    }

    /// Return the covariance matrix, if requested.
    #[must_use]
    pub fn covariance(&self) -> Option<&CovarianceMatrix> {
        self.covariance.as_ref()
    }

    /// Return the per-target variances as a vector.
    #[must_use]
    pub fn variances(&self) -> Vec<f64> {
        self.estimates.iter().map(|e| e.variance).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CovarianceMatrix;

    #[test]
    fn upper_triangle_mirrors() {
        let m = CovarianceMatrix::from_upper_triangle(vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0],
            vec![6.0],
        ]);
        assert_eq!(m.n_targets(), 3);
        assert_eq!(m.value(0, 2), 3.0);
        assert_eq!(m.value(2, 0), 3.0);
        assert_eq!(m.value(1, 2), 5.0);
        assert_eq!(m.value(2, 1), 5.0);
        assert_eq!(m.diagonal(), vec![1.0, 4.0, 6.0]);
    }
}
