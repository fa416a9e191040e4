//! Bag drawing for bootstrap and subsample resampling.

use rand::Rng;
use rand::seq::SliceRandom;

/// Draw `draw_count` indices with replacement and return per-sample counts.
///
/// The counts (not just membership) are what the infinitesimal-jackknife
/// estimator consumes.
pub(crate) fn bootstrap_counts(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> Vec<u32> {
    let mut counts = vec![0u32; n_samples];
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        counts[idx] += 1;
    }
    counts
}

/// Draw `pivot_len` distinct indices from `0..n_samples`.
pub(crate) fn draw_pivot(n_samples: usize, pivot_len: usize, rng: &mut impl Rng) -> Vec<usize> {
    let indices: Vec<usize> = (0..n_samples).collect();
    let mut pivot: Vec<usize> = indices
        .choose_multiple(rng, pivot_len)
        .copied()
        .collect();
    pivot.sort_unstable();
    pivot
}

/// Draw a bag of `sample_size` distinct indices containing the given pivot.
///
/// The remaining `sample_size - pivot.len()` indices are drawn without
/// replacement from the complement of the pivot.
pub(crate) fn subsample_with_pivot(
    n_samples: usize,
    sample_size: usize,
    pivot: &[usize],
    rng: &mut impl Rng,
) -> Vec<usize> {
    debug_assert!(pivot.len() <= sample_size);
    debug_assert!(sample_size <= n_samples);

    let mut in_pivot = vec![false; n_samples];
    for &i in pivot {
        in_pivot[i] = true;
    }
    let complement: Vec<usize> = (0..n_samples).filter(|&i| !in_pivot[i]).collect();

    let mut bag: Vec<usize> = pivot.to_vec();
    bag.extend(
        complement
            .choose_multiple(rng, sample_size - pivot.len())
            .copied(),
    );
    bag
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{bootstrap_counts, draw_pivot, subsample_with_pivot};

    #[test]
    fn bootstrap_counts_sum_to_draw_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let counts = bootstrap_counts(50, 50, &mut rng);
        assert_eq!(counts.len(), 50);
        assert_eq!(counts.iter().map(|&c| c as usize).sum::<usize>(), 50);
    }

    #[test]
    fn bootstrap_leaves_some_samples_out() {
        // With n draws from n samples, roughly 1/e of samples stay out.
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let counts = bootstrap_counts(200, 200, &mut rng);
        let n_out = counts.iter().filter(|&&c| c == 0).count();
        assert!(n_out > 40, "only {n_out} samples out of bag");
    }

    #[test]
    fn pivot_is_distinct_and_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pivot = draw_pivot(30, 8, &mut rng);
        assert_eq!(pivot.len(), 8);
        let mut seen = vec![false; 30];
        for &i in &pivot {
            assert!(i < 30);
            assert!(!seen[i], "duplicate pivot index {i}");
            seen[i] = true;
        }
    }

    #[test]
    fn subsample_contains_pivot_and_is_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pivot = vec![2, 5, 11];
        let bag = subsample_with_pivot(30, 10, &pivot, &mut rng);
        assert_eq!(bag.len(), 10);
        for &p in &pivot {
            assert!(bag.contains(&p), "pivot index {p} missing from bag");
        }
        let mut seen = vec![false; 30];
        for &i in &bag {
            assert!(!seen[i], "duplicate bag index {i}");
            seen[i] = true;
        }
    }

    #[test]
    fn full_size_subsample_is_permutation_of_all() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pivot = vec![0, 1];
        let mut bag = subsample_with_pivot(5, 5, &pivot, &mut rng);
        bag.sort_unstable();
        assert_eq!(bag, vec![0, 1, 2, 3, 4]);
    }
}
