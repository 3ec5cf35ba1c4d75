use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{BenchError, Result};

/// Row indices of one cross-validation split, both ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold partition of `y`.
///
/// The rows of each class are dealt round-robin into `k` test folds, after
/// an optional seeded shuffle. Every class must have at least `k` rows.
pub fn stratified_k_fold(y: ArrayView1<usize>, k: usize, shuffle_seed: Option<u64>) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(BenchError::InvalidFolds(k));
    }
    let mut assignment = vec![0usize; y.len()];
    let mut rng = shuffle_seed.map(StdRng::seed_from_u64);

    for class in [0usize, 1] {
        let mut members: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        if members.len() < k {
            return Err(BenchError::InsufficientData {
                class,
                count: members.len(),
                folds: k,
            });
        }
        if let Some(rng) = rng.as_mut() {
            members.shuffle(rng);
        }
        for (position, row) in members.into_iter().enumerate() {
            assignment[row] = position % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&row| assignment[row] == fold);
            Fold { train, test }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn folds_partition_rows_and_keep_class_balance() {
        let y = Array1::from_shape_fn(50, |i| usize::from(i % 5 == 0));
        let folds = stratified_k_fold(y.view(), 5, Some(3)).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.iter().copied()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.test.len() + fold.train.len(), 50);
            let positives = fold.test.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn too_few_rows_of_a_class_is_an_error() {
        let y = Array1::from(vec![0, 0, 0, 0, 1, 1]);
        assert!(matches!(
            stratified_k_fold(y.view(), 3, None),
            Err(BenchError::InsufficientData { class: 1, count: 2, folds: 3 })
        ));
        assert!(matches!(
            stratified_k_fold(y.view(), 1, None),
            Err(BenchError::InvalidFolds(1))
        ));
    }
}
