//! Block structure for subsampled ensembles.
//!
//! Trees trained without replacement are organized into blocks: all trees in
//! a block share one pivot subset of training indices, and a fresh pivot is
//! drawn per block. The U-statistic variance estimator relies on this
//! exchangeability structure, so the block partition is resolved and recorded
//! explicitly rather than recomputed from sampling state.

use crate::error::ForestError;

/// The resolved block partition of a subsampled ensemble.
///
/// Invariant: `ntree == n_blocks * trees_per_block`, with trees assigned to
/// blocks in contiguous index order (trees `[b*L, (b+1)*L)` form block `b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockDesign {
    n_blocks: usize,
    trees_per_block: usize,
}

impl BlockDesign {
    /// Resolve the `(ntree, B, L)` triple into a block partition.
    ///
    /// Any two of the three determine the third via `ntree = B * L`. A fully
    /// specified triple is accepted only when consistent.
    ///
    /// # Errors
    ///
    /// | Variant                                      | When                                 |
    /// |----------------------------------------------|--------------------------------------|
    /// | [`ForestError::BlockParametersMissing`]      | fewer than two parameters supplied   |
    /// | [`ForestError::InvalidTreeCount`]            | `ntree` is zero                      |
    /// | [`ForestError::InvalidBlockCount`]           | `B` is zero                          |
    /// | [`ForestError::InvalidTreesPerBlock`]        | `L` is zero                          |
    /// | [`ForestError::BlockPartitionIndivisible`]   | `ntree` not an exact multiple        |
    /// | [`ForestError::BlockPartitionMismatch`]      | supplied triple is inconsistent      |
    pub fn resolve(
        ntree: Option<usize>,
        n_blocks: Option<usize>,
        trees_per_block: Option<usize>,
    ) -> Result<Self, ForestError> {
        if let Some(ntree) = ntree
            && ntree == 0
        {
            return Err(ForestError::InvalidTreeCount { ntree });
        }
        if let Some(n_blocks) = n_blocks
            && n_blocks == 0
        {
            return Err(ForestError::InvalidBlockCount { n_blocks });
        }
        if let Some(trees_per_block) = trees_per_block
            && trees_per_block == 0
        {
            return Err(ForestError::InvalidTreesPerBlock { trees_per_block });
        }

        match (ntree, n_blocks, trees_per_block) {
            (Some(ntree), Some(n_blocks), Some(trees_per_block)) => {
                if ntree != n_blocks * trees_per_block {
                    return Err(ForestError::BlockPartitionMismatch {
                        ntree,
                        n_blocks,
                        trees_per_block,
                    });
                }
                Ok(Self {
                    n_blocks,
                    trees_per_block,
                })
            }
            (Some(ntree), Some(n_blocks), None) => {
                if ntree % n_blocks != 0 {
                    return Err(ForestError::BlockPartitionIndivisible {
                        ntree,
                        factor: n_blocks,
                    });
                }
                Ok(Self {
                    n_blocks,
                    trees_per_block: ntree / n_blocks,
                })
            }
            (Some(ntree), None, Some(trees_per_block)) => {
                if ntree % trees_per_block != 0 {
                    return Err(ForestError::BlockPartitionIndivisible {
                        ntree,
                        factor: trees_per_block,
                    });
                }
                Ok(Self {
                    n_blocks: ntree / trees_per_block,
                    trees_per_block,
                })
            }
            (None, Some(n_blocks), Some(trees_per_block)) => Ok(Self {
                n_blocks,
                trees_per_block,
            }),
            _ => Err(ForestError::BlockParametersMissing),
        }
    }

    /// Return the total number of trees.
    #[must_use]
    pub fn ntree(&self) -> usize {
        self.n_blocks * self.trees_per_block
    }

    /// Return the number of blocks (`B`).
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Return the number of trees per block (`L`).
    #[must_use]
    pub fn trees_per_block(&self) -> usize {
        self.trees_per_block
    }

    /// Return the block a tree belongs to.
    #[must_use]
    pub fn block_of(&self, tree: usize) -> usize {
        tree / self.trees_per_block
    }

    /// Return the contiguous tree index range forming a block.
    #[must_use]
    pub fn trees_in(&self, block: usize) -> std::ops::Range<usize> {
        let start = block * self.trees_per_block;
        start..start + self.trees_per_block
    }
}

/// Lookup table from block id to the pivot index set its trees share.
///
/// Recorded at training time so the estimators and tests can inspect the
/// incidence structure without re-deriving it from sampling state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PivotTable {
    pivots: Vec<Vec<usize>>,
}

impl PivotTable {
    pub(crate) fn new(pivots: Vec<Vec<usize>>) -> Self {
        Self { pivots }
    }

    /// Return the number of blocks.
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.pivots.len()
    }

    /// Return the pivot index set shared by the trees of `block`.
    #[must_use]
    pub fn pivot(&self, block: usize) -> &[usize] {
        &self.pivots[block]
    }
}
