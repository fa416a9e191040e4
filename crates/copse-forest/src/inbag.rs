//! Per-tree resampling multiplicities.

/// Matrix of in-bag counts with shape `(n_trees, n_samples)`.
///
/// Entry `(t, i)` records how many times training sample `i` was drawn into
/// tree `t`'s bag — 0/1 under subsampling, any count under bootstrap.
/// Immutable after training; OOB determination and the
/// infinitesimal-jackknife estimator both read from it.
#[derive(Debug, Clone)]
pub struct InBagMatrix {
    counts: Vec<u32>,
    n_trees: usize,
    n_samples: usize,
}

impl InBagMatrix {
    pub(crate) fn from_rows(rows: Vec<Vec<u32>>) -> Self {
        let n_trees = rows.len();
        let n_samples = rows.first().map_or(0, Vec::len);
        let mut counts = Vec::with_capacity(n_trees * n_samples);
        for row in rows {
            debug_assert_eq!(row.len(), n_samples);
            counts.extend(row);
        }
        Self {
            counts,
            n_trees,
            n_samples,
        }
    }

    /// Return the number of trees (rows).
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the number of training samples (columns).
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return how many times `sample` was drawn into `tree`'s bag.
    #[must_use]
    pub fn count(&self, tree: usize, sample: usize) -> u32 {
        self.counts[tree * self.n_samples + sample]
    }

    /// Return `true` if `sample` was drawn into `tree`'s bag at least once.
    #[must_use]
    pub fn is_in_bag(&self, tree: usize, sample: usize) -> bool {
        self.count(tree, sample) > 0
    }

    /// Return the number of trees for which `sample` is out of bag.
    #[must_use]
    pub fn n_oob_trees(&self, sample: usize) -> usize {
        (0..self.n_trees)
            .filter(|&t| !self.is_in_bag(t, sample))
            .count()
    }

    /// Return the count row for one tree.
    pub(crate) fn row(&self, tree: usize) -> &[u32] {
        &self.counts[tree * self.n_samples..(tree + 1) * self.n_samples]
    }
}

#[cfg(test)]
mod tests {
    use super::InBagMatrix;

    fn sample_matrix() -> InBagMatrix {
        InBagMatrix::from_rows(vec![vec![2, 0, 1], vec![0, 1, 0], vec![1, 1, 1]])
    }

    #[test]
    fn shape_and_counts() {
        let m = sample_matrix();
        assert_eq!(m.n_trees(), 3);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.count(0, 0), 2);
        assert_eq!(m.count(1, 2), 0);
    }

    #[test]
    fn membership_from_counts() {
        let m = sample_matrix();
        assert!(m.is_in_bag(0, 0));
        assert!(!m.is_in_bag(0, 1));
    }

    #[test]
    fn oob_tree_counts() {
        let m = sample_matrix();
        assert_eq!(m.n_oob_trees(0), 1);
        assert_eq!(m.n_oob_trees(1), 1);
        assert_eq!(m.n_oob_trees(2), 1);
    }
}
