//! Prediction collection for the forest ensemble.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::Task;
use crate::error::ForestError;
use crate::forest::Forest;

/// Per-tree predictions for a target observation set.
///
/// Shape is `(n_trees, n_targets)`; entry `(t, j)` is tree `t`'s prediction
/// for target `j` (a class-1 probability for classification forests). Built
/// fresh per prediction request and consumed by the variance estimators.
#[derive(Debug, Clone)]
pub struct PredictionMatrix {
    // Stored target-major so each target's tree column is contiguous.
    values: Vec<f64>,
    n_trees: usize,
    n_targets: usize,
}

impl PredictionMatrix {
    pub(crate) fn from_columns(columns: Vec<Vec<f64>>, n_trees: usize) -> Self {
        let n_targets = columns.len();
        let mut values = Vec::with_capacity(n_trees * n_targets);
        for column in columns {
            debug_assert_eq!(column.len(), n_trees);
            values.extend(column);
        }
        Self {
            values,
            n_trees,
            n_targets,
        }
    }

    /// Return the number of trees (rows).
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the number of target observations (columns).
    #[must_use]
    pub fn n_targets(&self) -> usize {
        self.n_targets
    }

    /// Return tree `tree`'s prediction for `target`.
    #[must_use]
    pub fn value(&self, tree: usize, target: usize) -> f64 {
        self.values[target * self.n_trees + tree]
    }

    /// Return all tree predictions for one target.
    #[must_use]
    pub fn target_column(&self, target: usize) -> &[f64] {
        &self.values[target * self.n_trees..(target + 1) * self.n_trees]
    }

    /// Return the mean prediction for one target.
    #[must_use]
    pub fn mean(&self, target: usize) -> f64 {
        let column = self.target_column(target);
        column.iter().sum::<f64>() / column.len() as f64
    }
}

impl Forest {
    fn validate_targets(&self, targets: &[Vec<f64>]) -> Result<(), ForestError> {
        for row in targets {
            if row.len() != self.n_features {
                return Err(ForestError::PredictionFeatureMismatch {
                    expected: self.n_features,
                    got: row.len(),
                });
            }
        }
        Ok(())
    }

    /// Evaluate every tree on every target observation.
    ///
    /// This is the raw material for both variance estimators; use
    /// [`Forest::predict`] when only the aggregated means are needed.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if any target row
    /// has the wrong feature count.
    pub fn predict_matrix(&self, targets: &[Vec<f64>]) -> Result<PredictionMatrix, ForestError> {
        self.validate_targets(targets)?;
        let columns: Vec<Vec<f64>> = targets
            .par_iter()
            .map(|sample| {
                self.trees
                    .iter()
                    .map(|tree| {
                        tree.predict(sample)
                            .expect("targets pre-validated against n_features")
                    })
                    .collect()
            })
            .collect();
        Ok(PredictionMatrix::from_columns(columns, self.n_trees()))
    }

    /// Predict the mean response for each target observation.
    ///
    /// All trees contribute; the result is the ensemble average (a class-1
    /// probability for classification forests).
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if any target row
    /// has the wrong feature count.
    pub fn predict(&self, targets: &[Vec<f64>]) -> Result<Vec<f64>, ForestError> {
        self.validate_targets(targets)?;
        let n = self.n_trees() as f64;
        Ok(targets
            .par_iter()
            .map(|sample| {
                let sum: f64 = self
                    .trees
                    .iter()
                    .map(|tree| {
                        tree.predict(sample)
                            .expect("targets pre-validated against n_features")
                    })
                    .sum();
                sum / n
            })
            .collect())
    }

    /// Predict majority class labels for a classification forest.
    ///
    /// A target is labeled 1 when its mean class-1 probability is at least
    /// one half.
    ///
    /// # Errors
    ///
    /// | Variant                                        | When                              |
    /// |------------------------------------------------|-----------------------------------|
    /// | [`ForestError::LabelsRequireClassification`]   | forest was trained for regression |
    /// | [`ForestError::PredictionFeatureMismatch`]     | wrong feature count               |
    pub fn predict_labels(&self, targets: &[Vec<f64>]) -> Result<Vec<u8>, ForestError> {
        if self.task != Task::BinaryClassification {
            return Err(ForestError::LabelsRequireClassification);
        }
        Ok(self
            .predict(targets)?
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::PredictionMatrix;
    use crate::config::{ForestConfig, Task};
    use crate::error::ForestError;

    fn make_binary(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::with_capacity(n);
        let mut response = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = i as f64 / n as f64;
            features.push(vec![x0, (i % 5) as f64]);
            response.push(if x0 > 0.5 { 1.0 } else { 0.0 });
        }
        (features, response)
    }

    #[test]
    fn matrix_layout_roundtrip() {
        let m = PredictionMatrix::from_columns(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2);
        assert_eq!(m.n_trees(), 2);
        assert_eq!(m.n_targets(), 2);
        assert_eq!(m.value(0, 0), 1.0);
        assert_eq!(m.value(1, 0), 2.0);
        assert_eq!(m.value(0, 1), 3.0);
        assert_eq!(m.target_column(1), &[3.0, 4.0]);
        assert!((m.mean(0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn matrix_shape_matches_request() {
        let (features, response) = make_binary(40);
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(12)
            .with_blocks(3)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        let matrix = fit.forest().predict_matrix(&features).unwrap();
        assert_eq!(matrix.n_trees(), 12);
        assert_eq!(matrix.n_targets(), 40);
    }

    #[test]
    fn aggregated_mean_matches_matrix_mean() {
        let (features, response) = make_binary(40);
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(12)
            .with_blocks(3)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        let forest = fit.forest();
        let matrix = forest.predict_matrix(&features).unwrap();
        let means = forest.predict(&features).unwrap();
        for (j, &mean) in means.iter().enumerate() {
            assert!((matrix.mean(j) - mean).abs() < 1e-12, "target {j}");
        }
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let (features, response) = make_binary(40);
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(12)
            .with_blocks(3)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        for p in fit.forest().predict(&features).unwrap() {
            assert!((0.0..=1.0).contains(&p), "probability {p} out of range");
        }
    }

    #[test]
    fn labels_follow_probability_threshold() {
        let (features, response) = make_binary(40);
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(12)
            .with_blocks(3)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        let forest = fit.forest();
        let probs = forest.predict(&features).unwrap();
        let labels = forest.predict_labels(&features).unwrap();
        for (p, l) in probs.iter().zip(&labels) {
            assert_eq!(*l, u8::from(*p >= 0.5));
        }
    }

    #[test]
    fn labels_rejected_for_regression() {
        let features = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let response = vec![0.0, 1.0, 2.0, 3.0];
        let fit = ForestConfig::new(Task::Regression)
            .with_ntree(4)
            .with_blocks(2)
            .fit(&features, &response)
            .unwrap();
        let err = fit.forest().predict_labels(&features).unwrap_err();
        assert!(matches!(err, ForestError::LabelsRequireClassification));
    }

    #[test]
    fn wrong_feature_count_rejected() {
        let (features, response) = make_binary(40);
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(4)
            .with_blocks(2)
            .fit(&features, &response)
            .unwrap();
        let err = fit.forest().predict(&[vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            ForestError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }
}
