use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    TreeError,
    node::{Node, NodeIndex},
    split::{ResponseMoments, SplitCriterion, find_best_split},
};

/// Configuration for a single CART tree.
///
/// Construct via [`CartTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Mse`                 |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct CartTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl CartTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Mse,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until all leaves are pure or stopping conditions
    /// are met. `Some(d)` limits depth to `d` levels (root is depth 0).
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

    /// Set the maximum number of features to consider at each split.
    ///
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
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

    /// Return the maximum features to consider per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a CART tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout.
    /// `response[sample_idx]` — continuous values, or 0/1 codes for binary
    /// classification.
    ///
    /// # Errors
    ///
    /// | Variant                                | When                                            |
    /// |----------------------------------------|-------------------------------------------------|
    /// | [`TreeError::EmptyDataset`]            | `features` is empty                             |
    /// | [`TreeError::ZeroFeatures`]            | rows have zero feature columns                  |
    /// | [`TreeError::FeatureCountMismatch`]    | rows have inconsistent lengths                  |
    /// | [`TreeError::ResponseLengthMismatch`]  | `response.len() != features.len()`              |
    /// | [`TreeError::NonFiniteValue`]          | any feature value is NaN or infinite            |
    /// | [`TreeError::NonFiniteResponse`]       | any response value is NaN or infinite           |
    /// | [`TreeError::InvalidMaxDepth`]         | `max_depth` is `Some(0)`                        |
    /// | [`TreeError::InvalidMinSamplesSplit`]  | `min_samples_split` < 2                         |
    /// | [`TreeError::InvalidMinSamplesLeaf`]   | `min_samples_leaf` < 1                          |
    /// | [`TreeError::InvalidMaxFeatures`]      | `max_features` resolves outside [1, n_features] |
    #[instrument(skip(self, features, response), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], response: &[f64]) -> Result<CartTree, TreeError> {
        // --- Validate inputs ---
        if features.is_empty() {
            return Err(TreeError::EmptyDataset);
        }

        let n_samples = features.len();
        let n_features = features[0].len();

        if n_features == 0 {
            return Err(TreeError::ZeroFeatures);
        }
        if response.len() != n_samples {
            return Err(TreeError::ResponseLengthMismatch {
                expected: n_samples,
                got: response.len(),
            });
        }

        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(TreeError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            for (feature_index, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(TreeError::NonFiniteValue {
                        sample_index,
                        feature_index,
                    });
                }
            }
        }
        for (sample_index, &y) in response.iter().enumerate() {
            if !y.is_finite() {
                return Err(TreeError::NonFiniteResponse { sample_index });
            }
        }

        // --- Validate config ---
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
        }

        if self.min_samples_split < 2 {
            return Err(TreeError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }

        if self.min_samples_leaf < 1 {
            return Err(TreeError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(TreeError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        debug!(n_samples, n_features, max_features, "fitting cart tree");

        // Convert to column-major layout for find_best_split.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();

        let root = build_tree(
            &col_features,
            response,
            &sample_indices,
            self,
            0,
            &mut rng,
            &mut arena,
            max_features,
        );

        debug!(
            root_index = root.index(),
            n_nodes = arena.len(),
            "cart tree built"
        );

        Ok(CartTree {
            nodes: arena,
            n_features,
        })
    }
}

impl Default for CartTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively build the arena-based tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
#[allow(clippy::too_many_arguments)]
fn build_tree(
    col_features: &[Vec<f64>],
    response: &[f64],
    sample_indices: &[usize],
    config: &CartTreeConfig,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
    max_features: usize,
) -> NodeIndex {
    let n_samples = sample_indices.len();

    let moments = ResponseMoments::from_samples(response, sample_indices);
    let impurity = config.criterion.impurity(&moments);
    let value = moments.mean();

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let idx = arena.len();
        arena.push(Node::Leaf {
            value,
            impurity,
            n_samples,
        });
        NodeIndex::new(idx)
    };

    // Stopping conditions → leaf.
    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    let too_few = n_samples < config.min_samples_split;
    let pure = impurity.value() == 0.0;

    if too_few || pure || depth_exceeded {
        return make_leaf(arena);
    }

    let split_result = find_best_split(
        col_features,
        response,
        sample_indices,
        &config.criterion,
        max_features,
        config.min_samples_leaf,
        rng,
    );

    let split = match split_result {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    // Arena pattern: reserve index, recurse, then overwrite with the split.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        value,
        impurity,
        n_samples,
    });

    let left_idx = build_tree(
        col_features,
        response,
        &split.left_indices,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    let right_idx = build_tree(
        col_features,
        response,
        &split.right_indices,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: left_idx,
        right: right_idx,
        impurity,
        n_samples,
    };

    NodeIndex::new(node_idx)
}

/// A fitted CART tree with mean-response leaves.
///
/// Stored as an arena-based `Vec<Node>` with index references for
/// cache-friendly traversal and trivial serialization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CartTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl CartTree {
    /// Predict the response for a single sample.
    ///
    /// Traverses from the root (index 0): at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise. The returned value is
    /// the leaf mean (the class-1 probability for a 0/1-coded response).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<f64, TreeError> {
        if sample.len() != self.n_features {
            return Err(TreeError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let leaf = self.traverse(sample);
        match &self.nodes[leaf] {
            Node::Leaf { value, .. } => Ok(*value),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        // BFS: (node_index, current_depth)
        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => {
                    if d > max_depth {
                        max_depth = d;
                    }
                }
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if sample[feature.index()] <= *threshold {
                        idx = left.index();
                    } else {
                        idx = right.index();
                    }
                }
            }
        }
    }
}
