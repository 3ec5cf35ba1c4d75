//! Sampling and weighting helpers shared by the tree ensembles.
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::ClassWeight;
use crate::data_handling::class_counts;

/// Per-row sample weights for a class weighting rule.
pub fn sample_weights(y: ArrayView1<usize>, class_weight: ClassWeight) -> Array1<f32> {
    match class_weight {
        ClassWeight::None => Array1::ones(y.len()),
        ClassWeight::Balanced => {
            let (negatives, positives) = class_counts(y);
            let n = y.len() as f32;
            let weight = |count: usize| if count == 0 { 0.0 } else { n / (2.0 * count as f32) };
            let (w0, w1) = (weight(negatives), weight(positives));
            y.mapv(|label| if label == 1 { w1 } else { w0 })
        }
    }
}

/// `n_draws` row indices drawn with replacement from `0..n`.
pub fn bootstrap_indices(n: usize, n_draws: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..n_draws).map(|_| rng.gen_range(0..n)).collect()
}

/// Rows of `0..n` that do not appear in `drawn`.
pub fn out_of_bag(n: usize, drawn: &[usize]) -> Vec<usize> {
    let mut in_bag = vec![false; n];
    for &i in drawn {
        in_bag[i] = true;
    }
    (0..n).filter(|&i| !in_bag[i]).collect()
}

/// `k` distinct column indices out of `n_features`, ascending.
pub fn sample_features(n_features: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    if k >= n_features {
        return (0..n_features).collect();
    }
    let mut picked = rand::seq::index::sample(rng, n_features, k).into_vec();
    picked.sort_unstable();
    picked
}

/// Scale non-negative values so they sum to one. An all-zero vector stays zero.
pub fn normalize(mut values: Array1<f64>) -> Array1<f64> {
    let total = values.sum();
    if total > 0.0 {
        values /= total;
    }
    values
}

/// `floor(share * n)`, at least one.
pub fn share_of(share: f64, n: usize) -> usize {
    ((share * n as f64).floor() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn balanced_weights_equalise_class_mass() {
        let y = array![1, 1, 1, 0];
        let w = sample_weights(y.view(), ClassWeight::Balanced);
        let positive_mass: f32 = w.iter().take(3).sum();
        assert!((positive_mass - w[3]).abs() < 1e-6);
        assert!((w.sum() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn out_of_bag_complements_bootstrap() {
        let mut rng = StdRng::seed_from_u64(1);
        let drawn = bootstrap_indices(50, 50, &mut rng);
        let oob = out_of_bag(50, &drawn);
        assert!(oob.iter().all(|i| !drawn.contains(i)));
        assert!(!oob.is_empty());
    }

    #[test]
    fn feature_sample_is_sorted_and_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let cols = sample_features(20, 6, &mut rng);
        assert_eq!(cols.len(), 6);
        assert!(cols.windows(2).all(|w| w[0] < w[1]));
    }
}
