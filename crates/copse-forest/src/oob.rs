//! Out-of-bag point estimates.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::warn;

use crate::config::Task;
use crate::forest::Forest;
use crate::inbag::InBagMatrix;

/// Aggregate out-of-bag error measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OobScore {
    /// Mean squared error over covered samples (regression).
    MeanSquaredError(f64),
    /// Fraction of covered samples whose majority label matches (binary
    /// classification).
    Accuracy(f64),
}

/// Out-of-bag point estimates over the training set.
///
/// A sample's estimate is the mean over exactly the trees whose bag excludes
/// it. `None` marks a sample no tree leaves out of bag — expected under small
/// ensembles, reported rather than raised.
#[derive(Debug, Clone)]
pub struct OobPredictions {
    point: Vec<Option<f64>>,
    n_oob_trees: Vec<usize>,
    score: Option<OobScore>,
    n_covered: usize,
}

impl OobPredictions {
    /// Return the per-sample OOB point estimates.
    #[must_use]
    pub fn point(&self) -> &[Option<f64>] {
        &self.point
    }

    /// Return, per sample, how many trees contributed to its estimate.
    #[must_use]
    pub fn n_oob_trees(&self) -> &[usize] {
        &self.n_oob_trees
    }

    /// Return the aggregate error measure, if any sample was covered.
    #[must_use]
    pub fn score(&self) -> Option<OobScore> {
        self.score
    }

    /// Return the number of samples with at least one OOB tree.
    #[must_use]
    pub fn n_covered(&self) -> usize {
        self.n_covered
    }
}

/// Compute out-of-bag point estimates and the aggregate error measure.
///
/// For each training sample, only trees whose bag excludes the sample
/// contribute; their predictions are averaged.
pub(crate) fn compute_oob(
    forest: &Forest,
    inbag: &InBagMatrix,
    features: &[Vec<f64>],
    response: &[f64],
) -> OobPredictions {
    let n_samples = features.len();
    let n_trees = forest.n_trees();

    let per_sample: Vec<(Option<f64>, usize)> = (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let mut sum = 0.0;
            let mut n_oob = 0usize;
            for t in 0..n_trees {
                if !inbag.is_in_bag(t, i) {
                    sum += forest.trees[t]
                        .predict(&features[i])
                        .expect("training data pre-validated");
                    n_oob += 1;
                }
            }
            let point = (n_oob > 0).then(|| sum / n_oob as f64);
            (point, n_oob)
        })
        .collect();

    let mut point = Vec::with_capacity(n_samples);
    let mut n_oob_trees = Vec::with_capacity(n_samples);
    for (p, n) in per_sample {
        point.push(p);
        n_oob_trees.push(n);
    }

    let n_covered = point.iter().filter(|p| p.is_some()).count();
    if n_covered < n_samples {
        warn!(
            n_uncovered = n_samples - n_covered,
            "samples with no out-of-bag trees; their estimates are undefined"
        );
    }

    let score = (n_covered > 0).then(|| match forest.task() {
        Task::Regression => {
            let sse: f64 = point
                .iter()
                .zip(response)
                .filter_map(|(p, &y)| p.map(|p| (p - y) * (p - y)))
                .sum();
            OobScore::MeanSquaredError(sse / n_covered as f64)
        }
        Task::BinaryClassification => {
            let correct = point
                .iter()
                .zip(response)
                .filter_map(|(p, &y)| p.map(|p| f64::from(u8::from(p >= 0.5)) == y))
                .filter(|&c| c)
                .count();
            OobScore::Accuracy(correct as f64 / n_covered as f64)
        }
    });

    OobPredictions {
        point,
        n_oob_trees,
        score,
        n_covered,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ForestConfig, Resampling, Task};
    use crate::oob::OobScore;

    fn make_regression(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::with_capacity(n);
        let mut response = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = i as f64 / n as f64;
            features.push(vec![x0, ((i * 3) % n) as f64 / n as f64]);
            response.push(if x0 > 0.5 { 2.0 } else { -1.0 });
        }
        (features, response)
    }

    #[test]
    fn oob_mean_reconstructs_from_inbag() {
        let (features, response) = make_regression(50);
        let fit = ForestConfig::new(Task::Regression)
            .with_ntree(30)
            .with_blocks(6)
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
            match point {
                Some(p) => {
                    let expected = contributing.iter().sum::<f64>() / contributing.len() as f64;
                    assert!((p - expected).abs() < 1e-12, "sample {i}");
                    assert_eq!(fit.oob().n_oob_trees()[i], contributing.len());
                }
                None => assert!(contributing.is_empty(), "sample {i}"),
            }
        }
    }

    #[test]
    fn subsampled_forest_covers_everything() {
        // Bags of ~sqrt(n) leave nearly every sample out of nearly every
        // tree, so coverage must be total.
        let (features, response) = make_regression(50);
        let fit = ForestConfig::new(Task::Regression)
            .with_ntree(30)
            .with_blocks(6)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        assert_eq!(fit.oob().n_covered(), 50);
        assert!(matches!(
            fit.oob().score(),
            Some(OobScore::MeanSquaredError(_))
        ));
    }

    #[test]
    fn uncovered_samples_are_consistent_with_inbag() {
        // A 2-tree bootstrap forest usually leaves some samples in every bag.
        let (features, response) = make_regression(30);
        let fit = ForestConfig::new(Task::Regression)
            .with_resampling(Resampling::Bootstrap)
            .with_ntree(2)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        let inbag = fit.inbag();
        for (i, point) in fit.oob().point().iter().enumerate() {
            let all_in_bag = (0..2).all(|t| inbag.is_in_bag(t, i));
            assert_eq!(point.is_none(), all_in_bag, "sample {i}");
        }
    }

    #[test]
    fn classification_score_is_accuracy() {
        let n = 50;
        let mut features = Vec::with_capacity(n);
        let mut response = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = i as f64 / n as f64;
            features.push(vec![x0]);
            response.push(f64::from(u8::from(x0 > 0.5)));
        }
        let fit = ForestConfig::new(Task::BinaryClassification)
            .with_ntree(30)
            .with_blocks(6)
            .with_seed(42)
            .fit(&features, &response)
            .unwrap();

        match fit.oob().score() {
            Some(OobScore::Accuracy(acc)) => {
                assert!(acc > 0.8, "oob accuracy {acc}");
            }
            other => panic!("expected accuracy score, got {other:?}"),
        }
    }
}
