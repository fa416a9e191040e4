//! Configuration builder for forest training.

use crate::error::ForestError;
use crate::result::ForestFit;

/// Kind of response the forest is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Task {
    /// Continuous response; trees split on mean squared error.
    Regression,
    /// 0/1-coded response; trees split on Gini impurity and leaf values are
    /// class-1 probabilities.
    BinaryClassification,
}

/// Strategy for determining the per-tree subsample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSize {
    /// Square root of the training set size (the usual order for the
    /// U-statistic regime).
    Sqrt,
    /// A fraction of the training set size (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
}

/// Resampling discipline used to draw each tree's bag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resampling {
    /// `n_train` draws with replacement per tree; multiplicities are
    /// retained for the infinitesimal-jackknife estimator.
    Bootstrap,
    /// Distinct indices drawn without replacement, organized into blocks of
    /// trees sharing a pivot subset; feeds the U-statistic estimator.
    Subsample {
        /// Per-tree bag size strategy.
        sample_size: SampleSize,
    },
}

/// Strategy for determining the number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// Log base 2 of total features.
    Log2,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

/// Configuration for forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods. The
/// ensemble size is set through `with_ntree`, `with_blocks`, and
/// `with_trees_per_block`: in subsample mode any two of the three determine
/// the third via `ntree = blocks * trees_per_block`; in bootstrap mode only
/// `with_ntree` applies.
///
/// # Defaults
///
/// | Parameter           | Default                          |
/// |---------------------|----------------------------------|
/// | `resampling`        | `Subsample { SampleSize::Sqrt }` |
/// | `max_features`      | `Sqrt`                           |
/// | `max_depth`         | `None`                           |
/// | `min_samples_split` | 2                                |
/// | `min_samples_leaf`  | 1                                |
/// | `seed`              | 42                               |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) task: Task,
    pub(crate) resampling: Resampling,
    pub(crate) ntree: Option<usize>,
    pub(crate) n_blocks: Option<usize>,
    pub(crate) trees_per_block: Option<usize>,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) seed: u64,
}

impl ForestConfig {
    /// Create a new config for the given task with default values.
    #[must_use]
    pub fn new(task: Task) -> Self {
        Self {
            task,
            resampling: Resampling::Subsample {
                sample_size: SampleSize::Sqrt,
            },
            ntree: None,
            n_blocks: None,
            trees_per_block: None,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }

    // --- Setters ---

    /// Set the resampling discipline.
    #[must_use]
    pub fn with_resampling(mut self, resampling: Resampling) -> Self {
        self.resampling = resampling;
        self
    }

    /// Set the ensemble size.
    #[must_use]
    pub fn with_ntree(mut self, ntree: usize) -> Self {
        self.ntree = Some(ntree);
        self
    }

    /// Set the number of blocks (the `B` of the block design).
    #[must_use]
    pub fn with_blocks(mut self, n_blocks: usize) -> Self {
        self.n_blocks = Some(n_blocks);
        self
    }

    /// Set the number of trees per block (the `L` of the block design).
    #[must_use]
    pub fn with_trees_per_block(mut self, trees_per_block: usize) -> Self {
        self.trees_per_block = Some(trees_per_block);
        self
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the task.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Return the resampling discipline.
    #[must_use]
    pub fn resampling(&self) -> Resampling {
        self.resampling
    }

    /// Return the requested ensemble size, if set.
    #[must_use]
    pub fn ntree(&self) -> Option<usize> {
        self.ntree
    }

    /// Return the requested block count, if set.
    #[must_use]
    pub fn n_blocks(&self) -> Option<usize> {
        self.n_blocks
    }

    /// Return the requested trees-per-block count, if set.
    #[must_use]
    pub fn trees_per_block(&self) -> Option<usize> {
        self.trees_per_block
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout.
    /// `response[sample_idx]` — continuous values, or 0/1 codes for
    /// [`Task::BinaryClassification`].
    ///
    /// Out-of-bag point estimates are computed eagerly and returned on the
    /// [`ForestFit`].
    ///
    /// # Errors
    ///
    /// | Variant                                     | When                                          |
    /// |---------------------------------------------|-----------------------------------------------|
    /// | [`ForestError::EmptyDataset`]               | `features` is empty                           |
    /// | [`ForestError::ZeroFeatures`]               | rows have zero feature columns                |
    /// | [`ForestError::FeatureCountMismatch`]       | rows have inconsistent lengths                |
    /// | [`ForestError::ResponseLengthMismatch`]     | `response.len() != features.len()`            |
    /// | [`ForestError::NonFiniteValue`]             | any feature value is NaN or infinite          |
    /// | [`ForestError::NonFiniteResponse`]          | any response value is NaN or infinite         |
    /// | [`ForestError::NonBinaryResponse`]          | classification response outside {0.0, 1.0}    |
    /// | [`ForestError::TreeCountRequired`]          | bootstrap mode without `with_ntree`           |
    /// | [`ForestError::BlockParametersWithBootstrap`] | `B`/`L` supplied in bootstrap mode          |
    /// | [`ForestError::BlockParametersMissing`]     | fewer than two of ntree/`B`/`L` in subsample  |
    /// | [`ForestError::BlockPartitionIndivisible`]  | derived block structure is not exact          |
    /// | [`ForestError::BlockPartitionMismatch`]     | supplied triple is inconsistent               |
    /// | [`ForestError::InvalidSampleSize`]          | subsample size outside [2, n_samples]         |
    /// | [`ForestError::InvalidSampleFraction`]      | subsample fraction outside (0.0, 1.0]         |
    /// | [`ForestError::InvalidMaxFeatures`]         | resolved max_features outside [1, n_features] |
    /// | other config variants                       | tree shape parameters out of range            |
    pub fn fit(&self, features: &[Vec<f64>], response: &[f64]) -> Result<ForestFit, ForestError> {
        crate::forest::train(self, features, response)
    }
}
