//! Stratified data splits and the smoothing hyperparameter search.

use is_it_fake_preprocessing::{TfidfVectorizer, VectorizerParams};
use rand::{Rng, seq::SliceRandom};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    category::Category,
    model::naive_bayes::{MultinomialNb, accuracy},
};

const N_CLASSES: usize = Category::ALL.len();

fn indices_by_class(labels: &[usize]) -> [Vec<usize>; N_CLASSES] {
    let mut by_class: [Vec<usize>; N_CLASSES] = Default::default();
    for (idx, &label) in labels.iter().enumerate() {
        by_class[label].push(idx);
    }
    by_class
}

/// Splits row indices into `(train, holdout)` with each class contributing
/// `holdout_fraction` of its rows (rounded) to the holdout, always leaving at
/// least one row of every class in train. Both halves are in ascending order.
pub(crate) fn stratified_split<R: Rng + ?Sized>(
    labels: &[usize],
    holdout_fraction: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::with_capacity(labels.len());
    let mut holdout = Vec::new();
    for mut class_indices in indices_by_class(labels) {
        class_indices.shuffle(rng);
        let n = class_indices.len();
        let n_holdout = ((n as f64 * holdout_fraction).round() as usize).min(n.saturating_sub(1));
        holdout.extend_from_slice(&class_indices[..n_holdout]);
        train.extend_from_slice(&class_indices[n_holdout..]);
    }
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}

/// Partitions `0..labels.len()` into `k` validation folds, dealing each
/// shuffled class round-robin so every fold sees every class when `k` does not
/// exceed the smallest class size.
pub(crate) fn stratified_folds<R: Rng + ?Sized>(
    labels: &[usize],
    k: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    for mut class_indices in indices_by_class(labels) {
        class_indices.shuffle(rng);
        for (i, idx) in class_indices.into_iter().enumerate() {
            folds[i % k].push(idx);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

/// Result of [`grid_search`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchOutcome {
    pub alpha: f64,
    pub cv_accuracy: f64,
    /// Mean validation accuracy per candidate, in candidate order.
    pub scores: Vec<(f64, f64)>,
}

/// Picks the smoothing `alpha` with the best mean validation accuracy over
/// `folds`. Each fold refits the vectorizer on its own training rows. Ties go
/// to the earlier candidate.
pub(crate) fn grid_search(
    texts: &[String],
    labels: &[usize],
    folds: &[Vec<usize>],
    alphas: &[f64],
    params: &VectorizerParams,
) -> Option<SearchOutcome> {
    if alphas.is_empty() || folds.len() < 2 {
        return None;
    }
    info!(
        candidates = alphas.len(),
        folds = folds.len(),
        "Searching for the best smoothing alpha"
    );

    let fold_scores = folds
        .par_iter()
        .enumerate()
        .map(|(fold_idx, validation)| {
            let mut in_validation = vec![false; labels.len()];
            for &idx in validation {
                in_validation[idx] = true;
            }
            let train = (0..labels.len())
                .filter(|&idx| !in_validation[idx])
                .collect::<Vec<_>>();

            let train_texts = train.iter().map(|&i| texts[i].as_str()).collect::<Vec<_>>();
            let train_labels = train.iter().map(|&i| labels[i]).collect::<Vec<_>>();
            let val_texts = validation
                .iter()
                .map(|&i| texts[i].as_str())
                .collect::<Vec<_>>();
            let val_labels = validation.iter().map(|&i| labels[i]).collect::<Vec<_>>();

            let (vectorizer, x_train) = TfidfVectorizer::fit_transform(&train_texts, params.clone());
            let x_val = vectorizer.transform(&val_texts);
            let scores = alphas
                .iter()
                .map(|&alpha| {
                    let nb = MultinomialNb::fit(&x_train, &train_labels, N_CLASSES, alpha);
                    accuracy(&nb.predict(&x_val), &val_labels)
                })
                .collect::<Vec<_>>();
            debug!(fold = fold_idx, ?scores, "Fold evaluated");
            scores
        })
        .collect::<Vec<_>>();

    let scores = alphas
        .iter()
        .enumerate()
        .map(|(c, &alpha)| {
            let mean = fold_scores.iter().map(|fold| fold[c]).sum::<f64>() / folds.len() as f64;
            (alpha, mean)
        })
        .collect::<Vec<_>>();

    let mut best = scores[0];
    for &candidate in &scores[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    info!(alpha = best.0, cv_accuracy = best.1, "Selected smoothing alpha");
    Some(SearchOutcome {
        alpha: best.0,
        cv_accuracy: best.1,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn labels(authentic: usize, generated: usize) -> Vec<usize> {
        let mut labels = vec![0; authentic];
        labels.extend(vec![1; generated]);
        labels
    }

    #[test]
    fn test_split_is_stratified_and_disjoint() {
        let labels = labels(10, 20);
        let (train, holdout) = stratified_split(&labels, 0.2, &mut StdRng::seed_from_u64(42));
        assert_eq!(train.len() + holdout.len(), 30);
        assert_eq!(holdout.iter().filter(|&&i| labels[i] == 0).count(), 2);
        assert_eq!(holdout.iter().filter(|&&i| labels[i] == 1).count(), 4);
        assert!(holdout.iter().all(|i| !train.contains(i)));
    }

    #[test]
    fn test_split_keeps_one_of_each_class_in_train() {
        let labels = labels(1, 3);
        let (train, holdout) = stratified_split(&labels, 0.9, &mut StdRng::seed_from_u64(1));
        assert!(train.contains(&0));
        assert!(train.iter().any(|&i| labels[i] == 1));
        assert_eq!(holdout.len(), 2);
    }

    #[test]
    fn test_split_is_reproducible() {
        let labels = labels(50, 50);
        let a = stratified_split(&labels, 0.2, &mut StdRng::seed_from_u64(7));
        let b = stratified_split(&labels, 0.2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_holdout() {
        let (train, holdout) = stratified_split(&labels(3, 3), 0.0, &mut StdRng::seed_from_u64(0));
        assert_eq!(train, (0..6).collect::<Vec<_>>());
        assert!(holdout.is_empty());
    }

    #[test]
    fn test_folds_cover_every_row_once() {
        let labels = labels(7, 9);
        let folds = stratified_folds(&labels, 3, &mut StdRng::seed_from_u64(3));
        let mut all = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..16).collect::<Vec<_>>());
        for fold in &folds {
            assert!(fold.iter().any(|&i| labels[i] == 0));
            assert!(fold.iter().any(|&i| labels[i] == 1));
        }
    }

    #[test]
    fn test_grid_search_selects_first_best_candidate() {
        let texts = [
            "broken arriv disappoint",
            "arriv damag broken",
            "disappoint refund broken",
            "amaz best buy",
            "best perfect amaz",
            "perfect buy amaz",
        ]
        .map(String::from);
        let labels = labels(3, 3);
        let folds = stratified_folds(&labels, 3, &mut StdRng::seed_from_u64(0));
        let params = VectorizerParams::new(1..=1, 1.0, 1.0, None, false);
        let outcome = grid_search(&texts, &labels, &folds, &[0.01, 1000.0], &params).unwrap();
        assert_eq!(outcome.scores.len(), 2);
        assert!((outcome.alpha - 0.01).abs() < f64::EPSILON);
        assert!((outcome.cv_accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_search_needs_two_folds() {
        let texts = ["a".to_owned(), "b".to_owned()];
        let folds = vec![vec![0, 1]];
        let params = VectorizerParams::default();
        assert!(grid_search(&texts, &[0, 1], &folds, &[1.0], &params).is_none());
    }
}
