use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the heterogeneity of a node's response values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Mean squared error: `Σ(y_i - ȳ)² / n`, the response variance.
    Mse,
    /// Gini impurity over a 0/1-coded response: `2·p·(1-p)` where `p = ȳ`.
    ///
    /// On a 0/1 response this equals exactly twice the MSE impurity, so the
    /// two criteria rank candidate splits identically.
    Gini,
}

/// Running response moments for one side of a candidate split.
///
/// `sum_sq` tracks `Σy²`; for a 0/1 response `sum_sq == sum`, which is what
/// makes the Gini/MSE factor-of-two identity exact.
#[derive(Debug, Clone)]
pub(crate) struct ResponseMoments {
    n: usize,
    sum: f64,
    sum_sq: f64,
}

impl ResponseMoments {
    pub(crate) fn empty() -> Self {
        Self {
            n: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub(crate) fn from_samples(response: &[f64], sample_indices: &[usize]) -> Self {
        let mut moments = Self::empty();
        for &si in sample_indices {
            moments.add(response[si]);
        }
        moments
    }

    pub(crate) fn add(&mut self, y: f64) {
        self.n += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    pub(crate) fn remove(&mut self, y: f64) {
        self.n -= 1;
        self.sum -= y;
        self.sum_sq -= y * y;
    }

    /// Mean response; 0.0 for an empty node.
    pub(crate) fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum / self.n as f64
    }

    pub(crate) fn n(&self) -> usize {
        self.n
    }
}

impl SplitCriterion {
    /// Compute the impurity of a node from its response moments.
    ///
    /// Returns `Impurity::new(0.0)` when the node is empty.
    ///
    /// For `Mse`: `Σy²/n - ȳ²`, clamped at zero against rounding.
    /// For `Gini`: `2·p·(1-p)` with `p = ȳ`; only meaningful on a 0/1 response.
    #[must_use]
    pub fn impurity(&self, moments: &ResponseMoments) -> Impurity {
        if moments.n == 0 {
            return Impurity::new(0.0);
        }
        let n = moments.n as f64;
        let mean = moments.sum / n;
        let value = match self {
            SplitCriterion::Mse => (moments.sum_sq / n - mean * mean).max(0.0),
            SplitCriterion::Gini => 2.0 * mean * (1.0 - mean),
        };
        Impurity::new(value)
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitCandidate {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the
/// `(value, response)` pairs, scans left-to-right with incremental moment
/// updates, and tracks the globally best split by weighted impurity decrease.
///
/// Returns `None` when no valid split exists (all values identical, or any
/// split would violate `min_samples_leaf`).
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `sample_indices` are indices into these inner Vecs.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    response: &[f64],
    sample_indices: &[usize],
    criterion: &SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitCandidate> {
    let n_features = features.len();
    let n_samples = sample_indices.len();

    if n_samples == 0 || n_features == 0 {
        return None;
    }

    let parent_moments = ResponseMoments::from_samples(response, sample_indices);
    let parent_impurity = criterion.impurity(&parent_moments);

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }
    let selected_features = &feature_order[..take];

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in selected_features {
        let feat_col = &features[feat_idx];

        // Collect (value, sample_index) pairs for this feature.
        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left = ResponseMoments::empty();
        let mut right = parent_moments.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            let y_i = response[si];

            // Move sample i from right to left.
            left.add(y_i);
            right.remove(y_i);

            // Skip if next value is identical (no valid boundary here).
            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            if left.n() < min_samples_leaf || right.n() < min_samples_leaf {
                continue;
            }

            let left_impurity = criterion.impurity(&left);
            let right_impurity = criterion.impurity(&right);

            let decrease = (n_samples as f64) * parent_impurity.value()
                - (left.n() as f64) * left_impurity.value()
                - (right.n() as f64) * right_impurity.value();

            if decrease > best_decrease {
                best_decrease = decrease;
                let threshold = (val_i + val_next) / 2.0;
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (best_feature, threshold) = best?;

    // Partition sample_indices into left/right.
    let feat_col = &features[best_feature.index()];
    let mut left_indices = Vec::with_capacity(n_samples / 2);
    let mut right_indices = Vec::with_capacity(n_samples / 2);
    for &si in sample_indices {
        if feat_col[si] <= threshold {
            left_indices.push(si);
        } else {
            right_indices.push(si);
        }
    }

    Some(SplitCandidate {
        feature: best_feature,
        threshold,
        left_indices,
        right_indices,
    })
}
