//! Random-forest ensembles with honest variance estimates.
//!
//! Trains CART ensembles under two resampling disciplines and quantifies the
//! uncertainty of their averaged predictions, separating sampling variability
//! (finite training data) from Monte Carlo noise (finite ensemble):
//!
//! - **Subsample mode**: trees drawn without replacement in a block/pivot
//!   design feed the U-statistic estimator ([`ForestFit::variance_u`]).
//! - **Bootstrap mode**: trees drawn with replacement, with in-bag counts
//!   retained, feed the infinitesimal-jackknife estimator
//!   ([`ForestFit::variance_ij`]).
//!
//! Tree construction is parallel via rayon, deterministic from a single seed,
//! and the fitted [`Forest`] plus [`InBagMatrix`] are immutable afterwards.
//!
//! ```no_run
//! use copse_forest::{ForestConfig, Task, VarUOptions};
//!
//! # fn main() -> Result<(), copse_forest::ForestError> {
//! # let (features, response): (Vec<Vec<f64>>, Vec<f64>) = (vec![], vec![]);
//! let fit = ForestConfig::new(Task::Regression)
//!     .with_ntree(5000)
//!     .with_blocks(25)
//!     .fit(&features, &response)?;
//!
//! let matrix = fit.forest().predict_matrix(&features)?;
//! let result = fit.variance_u(&matrix, VarUOptions::new().with_separate(true))?;
//! # Ok(())
//! # }
//! ```

mod config;
mod design;
mod error;
mod forest;
mod inbag;
mod oob;
mod predict;
mod result;
mod sample;
mod serialize;
mod var_ij;
mod var_u;

pub use config::{ForestConfig, MaxFeatures, Resampling, SampleSize, Task};
pub use design::{BlockDesign, PivotTable};
pub use error::ForestError;
pub use forest::{Forest, SamplingMode};
pub use inbag::InBagMatrix;
pub use oob::{OobPredictions, OobScore};
pub use predict::PredictionMatrix;
pub use result::{
    CovarianceMatrix, ForestFit, TrainingMetadata, VarianceEstimate, VarianceResult,
};
pub use var_ij::VarIjOptions;
pub use var_u::VarUOptions;
