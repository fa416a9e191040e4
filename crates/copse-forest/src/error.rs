use std::path::PathBuf;

/// Errors from forest training, prediction, and variance estimation.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when ntree is zero.
    #[error("ntree must be at least 1, got {ntree}")]
    InvalidTreeCount {
        /// The invalid ntree value provided.
        ntree: usize,
    },

    /// Returned when bootstrap mode is requested without an ntree.
    #[error("bootstrap resampling requires ntree to be set")]
    TreeCountRequired,

    /// Returned when fewer than two of ntree, blocks, and trees-per-block
    /// are supplied for a subsampled ensemble.
    #[error("subsample resampling requires two of: ntree, blocks, trees per block")]
    BlockParametersMissing,

    /// Returned when block parameters are supplied alongside bootstrap mode.
    #[error("block parameters only apply to subsample resampling")]
    BlockParametersWithBootstrap,

    /// Returned when the number of blocks is zero.
    #[error("block count must be at least 1, got {n_blocks}")]
    InvalidBlockCount {
        /// The invalid block count provided.
        n_blocks: usize,
    },

    /// Returned when the trees-per-block count is zero.
    #[error("trees per block must be at least 1, got {trees_per_block}")]
    InvalidTreesPerBlock {
        /// The invalid trees-per-block value provided.
        trees_per_block: usize,
    },

    /// Returned when ntree cannot be split into equal-size blocks by the
    /// supplied factor.
    #[error("ntree {ntree} is not an exact multiple of {factor}")]
    BlockPartitionIndivisible {
        /// The requested ensemble size.
        ntree: usize,
        /// The block count or trees-per-block value that fails to divide it.
        factor: usize,
    },

    /// Returned when a fully specified (ntree, blocks, trees-per-block)
    /// triple is internally inconsistent.
    #[error("inconsistent block structure: ntree {ntree} != {n_blocks} blocks x {trees_per_block} trees")]
    BlockPartitionMismatch {
        /// The requested ensemble size.
        ntree: usize,
        /// The requested number of blocks.
        n_blocks: usize,
        /// The requested number of trees per block.
        trees_per_block: usize,
    },

    /// Returned when the U-statistic estimator is given fewer than two blocks.
    #[error("u-statistic variance needs at least 2 blocks, got {n_blocks}")]
    InsufficientBlocks {
        /// The number of blocks in the fitted forest.
        n_blocks: usize,
    },

    /// Returned when the resolved subsample size is outside [2, n_samples].
    #[error("subsample size resolved to {sample_size}, but must be in [2, {n_samples}]")]
    InvalidSampleSize {
        /// The resolved subsample size.
        sample_size: usize,
        /// The number of training samples.
        n_samples: usize,
    },

    /// Returned when a subsample fraction is not in (0.0, 1.0].
    #[error("subsample fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidSampleFraction {
        /// The invalid fraction provided.
        fraction: f64,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when the response vector length differs from the sample count.
    #[error("response has {got} entries, expected {expected}")]
    ResponseLengthMismatch {
        /// The number of training samples.
        expected: usize,
        /// The actual response vector length.
        got: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a response value is NaN or infinite.
    #[error("non-finite response at sample {sample_index}")]
    NonFiniteResponse {
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a classification response is not coded 0.0 or 1.0.
    #[error("response at sample {sample_index} is {value}, expected 0.0 or 1.0")]
    NonBinaryResponse {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The offending response value.
        value: f64,
    },

    /// Returned when a sample has the wrong feature count at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when class labels are requested from a regression forest.
    #[error("class labels require a binary-classification forest")]
    LabelsRequireClassification,

    /// Returned when the U-statistic estimator is applied to a forest not
    /// trained with subsample resampling.
    #[error("u-statistic variance requires a subsample-resampled forest")]
    SubsampleForestRequired,

    /// Returned when the infinitesimal-jackknife estimator is applied to a
    /// forest not trained with bootstrap resampling.
    #[error("infinitesimal-jackknife variance requires a bootstrap-resampled forest")]
    BootstrapForestRequired,

    /// Returned when a prediction matrix does not match the ensemble size.
    #[error("prediction matrix has {got_trees} tree rows, expected {expected_trees}")]
    MatrixShapeMismatch {
        /// The ensemble size of the fitted forest.
        expected_trees: usize,
        /// The number of tree rows in the supplied matrix.
        got_trees: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the model file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
