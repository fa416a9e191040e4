//! Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use copse_tree::{CartTree, CartTreeConfig, SplitCriterion};

use crate::config::{ForestConfig, MaxFeatures, Resampling, SampleSize, Task};
use crate::design::{BlockDesign, PivotTable};
use crate::error::ForestError;
use crate::inbag::InBagMatrix;
use crate::oob::compute_oob;
use crate::result::{ForestFit, TrainingMetadata};
use crate::sample::{bootstrap_counts, draw_pivot, subsample_with_pivot};

/// Resolved resampling discipline of a fitted forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SamplingMode {
    /// Distinct indices without replacement, block/pivot structured.
    Subsample,
    /// Full-size draws with replacement.
    Bootstrap,
}

/// A fitted forest ensemble.
///
/// Immutable after training: concurrent prediction and variance requests may
/// share a `Forest` freely.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Forest {
    pub(crate) trees: Vec<CartTree>,
    pub(crate) task: Task,
    pub(crate) mode: SamplingMode,
    pub(crate) n_features: usize,
    pub(crate) n_train: usize,
    pub(crate) sample_size: usize,
    pub(crate) design: Option<BlockDesign>,
    pub(crate) pivots: Option<PivotTable>,
}

impl Forest {
    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the task this forest was trained for.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Return the resampling discipline the forest was trained with.
    #[must_use]
    pub fn sampling_mode(&self) -> SamplingMode {
        self.mode
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of training samples.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// Return the per-tree bag size (`n_train` under bootstrap).
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Return the block design, if the forest was subsample-trained.
    #[must_use]
    pub fn block_design(&self) -> Option<&BlockDesign> {
        self.design.as_ref()
    }

    /// Return the block-to-pivot lookup table, if subsample-trained.
    #[must_use]
    pub fn pivots(&self) -> Option<&PivotTable> {
        self.pivots.as_ref()
    }
}

/// Resolve `MaxFeatures` to a concrete count.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_features: usize,
) -> Result<usize, ForestError> {
    let resolved = match max_features {
        MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        MaxFeatures::Log2 => (n_features as f64).log2().ceil().max(1.0) as usize,
        MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
        MaxFeatures::Fixed(n) => n,
        MaxFeatures::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(ForestError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Resolve `SampleSize` to a concrete subsample size.
pub(crate) fn resolve_sample_size(
    sample_size: SampleSize,
    n_samples: usize,
) -> Result<usize, ForestError> {
    let resolved = match sample_size {
        SampleSize::Sqrt => (n_samples as f64).sqrt().ceil() as usize,
        SampleSize::Fraction(f) => {
            if f <= 0.0 || f > 1.0 {
                return Err(ForestError::InvalidSampleFraction { fraction: f });
            }
            (n_samples as f64 * f).ceil() as usize
        }
        SampleSize::Fixed(k) => k,
    };
    if resolved < 2 || resolved > n_samples {
        return Err(ForestError::InvalidSampleSize {
            sample_size: resolved,
            n_samples,
        });
    }
    Ok(resolved)
}

/// Train the forest ensemble.
#[instrument(skip_all, fields(n_samples = features.len()))]
pub(crate) fn train(
    config: &ForestConfig,
    features: &[Vec<f64>],
    response: &[f64],
) -> Result<ForestFit, ForestError> {
    // --- Validate inputs ---
    if features.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    let n_samples = features.len();
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ForestError::ZeroFeatures);
    }
    if response.len() != n_samples {
        return Err(ForestError::ResponseLengthMismatch {
            expected: n_samples,
            got: response.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        for (feature_index, &val) in row.iter().enumerate() {
            if !val.is_finite() {
                return Err(ForestError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
    }
    for (sample_index, &y) in response.iter().enumerate() {
        if !y.is_finite() {
            return Err(ForestError::NonFiniteResponse { sample_index });
        }
        if config.task == Task::BinaryClassification && y != 0.0 && y != 1.0 {
            return Err(ForestError::NonBinaryResponse {
                sample_index,
                value: y,
            });
        }
    }

    // --- Validate config ---
    if let Some(d) = config.max_depth
        && d == 0
    {
        return Err(ForestError::InvalidMaxDepth { max_depth: 0 });
    }
    if config.min_samples_split < 2 {
        return Err(ForestError::InvalidMinSamplesSplit {
            min_samples_split: config.min_samples_split,
        });
    }
    if config.min_samples_leaf < 1 {
        return Err(ForestError::InvalidMinSamplesLeaf {
            min_samples_leaf: config.min_samples_leaf,
        });
    }
    let max_features_resolved = resolve_max_features(config.max_features, n_features)?;

    // --- Resolve resampling structure ---
    let (mode, ntree, design, sample_size) = match config.resampling {
        Resampling::Bootstrap => {
            if config.n_blocks.is_some() || config.trees_per_block.is_some() {
                return Err(ForestError::BlockParametersWithBootstrap);
            }
            let ntree = config.ntree.ok_or(ForestError::TreeCountRequired)?;
            if ntree == 0 {
                return Err(ForestError::InvalidTreeCount { ntree });
            }
            (SamplingMode::Bootstrap, ntree, None, n_samples)
        }
        Resampling::Subsample { sample_size } => {
            let design =
                BlockDesign::resolve(config.ntree, config.n_blocks, config.trees_per_block)?;
            let resolved = resolve_sample_size(sample_size, n_samples)?;
            (SamplingMode::Subsample, design.ntree(), Some(design), resolved)
        }
    };

    let criterion = match config.task {
        Task::Regression => SplitCriterion::Mse,
        Task::BinaryClassification => SplitCriterion::Gini,
    };

    info!(
        ntree,
        n_samples,
        n_features,
        sample_size,
        max_features = max_features_resolved,
        n_blocks = design.map(|d| d.n_blocks()),
        "training forest"
    );

    // One pivot draw per block, then per-tree seeds, all from the master RNG
    // so the whole construction is reproducible from a single seed.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let pivot_len = sample_size / 2;
    let pivots: Option<Vec<Vec<usize>>> = design.map(|d| {
        (0..d.n_blocks())
            .map(|_| draw_pivot(n_samples, pivot_len, &mut master_rng))
            .collect()
    });
    let tree_seeds: Vec<u64> = (0..ntree).map(|_| master_rng.r#gen()).collect();

    // Capture config fields needed in the closure.
    let max_depth = config.max_depth;
    let min_samples_split = config.min_samples_split;
    let min_samples_leaf = config.min_samples_leaf;
    let pivots_ref = pivots.as_deref();

    // Parallel tree training.
    let tree_results: Vec<(CartTree, Vec<u32>)> = tree_seeds
        .into_par_iter()
        .enumerate()
        .map(|(tree_idx, seed)| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let (bag_indices, counts) = match mode {
                SamplingMode::Bootstrap => {
                    let counts = bootstrap_counts(n_samples, n_samples, &mut rng);
                    let bag: Vec<usize> = counts
                        .iter()
                        .enumerate()
                        .flat_map(|(i, &c)| std::iter::repeat_n(i, c as usize))
                        .collect();
                    (bag, counts)
                }
                SamplingMode::Subsample => {
                    let design = design.expect("subsample mode has a block design");
                    let pivot = &pivots_ref.expect("subsample mode has pivots")
                        [design.block_of(tree_idx)];
                    let bag = subsample_with_pivot(n_samples, sample_size, pivot, &mut rng);
                    let mut counts = vec![0u32; n_samples];
                    for &i in &bag {
                        counts[i] = 1;
                    }
                    (bag, counts)
                }
            };

            // Build the bag dataset: row-major features plus response.
            let bag_features: Vec<Vec<f64>> =
                bag_indices.iter().map(|&i| features[i].clone()).collect();
            let bag_response: Vec<f64> = bag_indices.iter().map(|&i| response[i]).collect();

            let tree_config = CartTreeConfig::new()
                .with_criterion(criterion)
                .with_max_depth(max_depth)
                .with_min_samples_split(min_samples_split)
                .with_min_samples_leaf(min_samples_leaf)
                .with_max_features(Some(max_features_resolved))
                .with_seed(rng.r#gen());

            // All inputs are pre-validated — fit cannot fail on data errors.
            let tree = tree_config
                .fit(&bag_features, &bag_response)
                .expect("tree fit should not fail on pre-validated data");

            (tree, counts)
        })
        .collect();

    let mut trees = Vec::with_capacity(ntree);
    let mut count_rows = Vec::with_capacity(ntree);
    for (tree, counts) in tree_results {
        trees.push(tree);
        count_rows.push(counts);
    }
    let inbag = InBagMatrix::from_rows(count_rows);

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let forest = Forest {
        trees,
        task: config.task,
        mode,
        n_features,
        n_train: n_samples,
        sample_size,
        design,
        pivots: pivots.map(PivotTable::new),
    };

    // OOB point estimates are part of every training result.
    let oob = compute_oob(&forest, &inbag, features, response);

    let metadata = TrainingMetadata {
        ntree,
        n_features,
        n_samples,
        sample_size,
        max_features_resolved,
        n_blocks: design.map(|d| d.n_blocks()),
        trees_per_block: design.map(|d| d.trees_per_block()),
    };

    info!(
        oob_covered = oob.n_covered(),
        "forest training complete"
    );

    Ok(ForestFit::new(forest, inbag, oob, metadata))
}
