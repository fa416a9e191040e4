//! Single CART trees over a continuous or 0/1-coded response.
//!
//! Provides the base learner for copse ensembles: an arena-stored binary
//! regression tree with mean-response leaves, trained with either
//! mean-squared-error or Gini-impurity splitting. Binary classification is
//! handled as regression on a 0/1 response, so a leaf value doubles as the
//! class-1 probability.

mod error;
mod node;
mod split;
mod tree;

pub use error::TreeError;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use split::SplitCriterion;
pub use tree::{CartTree, CartTreeConfig};
