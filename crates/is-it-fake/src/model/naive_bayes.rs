use rayon::prelude::*;
use sprs::{CsMat, CsVecView};
use tracing::debug;

/// Rows before [`MultinomialNb::predict_proba`] switches to rayon.
const MIN_ROWS_FOR_PARALLEL: usize = 512;

/// Multinomial Naive Bayes over non-negative (TF-IDF) feature rows.
///
/// Class `c` is scored as `ln P(c) + sum_i x_i * ln P(feature_i | c)` where the
/// feature likelihoods use additive (Laplace/Lidstone) smoothing `alpha`.
#[derive(Clone, Debug, PartialEq, bincode::Encode, bincode::Decode)]
pub struct MultinomialNb {
    alpha: f64,
    class_log_prior: Vec<f64>,
    /// `[class][feature]`
    feature_log_prob: Vec<Vec<f64>>,
}

impl MultinomialNb {
    /// Fits on the rows of `x` with class indices `y` in `0..n_classes`.
    ///
    /// A class without any rows gets a log prior of `-inf` and is never
    /// predicted.
    #[must_use]
    pub fn fit(x: &CsMat<f64>, y: &[usize], n_classes: usize, alpha: f64) -> Self {
        debug_assert_eq!(x.rows(), y.len(), "one label per row");
        debug_assert!(alpha > 0.0, "alpha must be positive");
        let n_features = x.cols();

        let mut class_count = vec![0usize; n_classes];
        let mut feature_count = vec![vec![0.0f64; n_features]; n_classes];
        for (row, &class) in x.outer_iterator().zip(y) {
            class_count[class] += 1;
            for (col, &value) in row.iter() {
                feature_count[class][col] += value;
            }
        }

        let n_rows = y.len() as f64;
        let class_log_prior = class_count
            .iter()
            .map(|&count| (count as f64 / n_rows).ln())
            .collect();
        let feature_log_prob = feature_count
            .into_iter()
            .map(|counts| {
                let total = counts.iter().sum::<f64>() + alpha * n_features as f64;
                counts
                    .into_iter()
                    .map(|count| ((count + alpha) / total).ln())
                    .collect()
            })
            .collect();

        debug!(n_rows = y.len(), n_features, alpha, ?class_count, "Fitted MultinomialNB");
        Self {
            alpha,
            class_log_prior,
            feature_log_prob,
        }
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.class_log_prior.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_log_prob.first().map_or(0, Vec::len)
    }

    /// Unnormalized log posterior per class for one feature row.
    #[must_use]
    pub fn joint_log_likelihood(&self, row: CsVecView<'_, f64>) -> Vec<f64> {
        self.class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(&prior, log_prob)| {
                prior
                    + row
                        .iter()
                        .map(|(col, &value)| value * log_prob[col])
                        .sum::<f64>()
            })
            .collect()
    }

    /// Posterior class probabilities for one feature row. Sums to 1.
    #[must_use]
    pub fn predict_proba_row(&self, row: CsVecView<'_, f64>) -> Vec<f64> {
        let jll = self.joint_log_likelihood(row);
        let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp = jll.iter().map(|&l| (l - max).exp()).collect::<Vec<_>>();
        let sum = exp.iter().sum::<f64>();
        exp.into_iter().map(|e| e / sum).collect()
    }

    /// Posterior probabilities for every row of `x`, in row order.
    #[must_use]
    pub fn predict_proba(&self, x: &CsMat<f64>) -> Vec<Vec<f64>> {
        if x.rows() >= MIN_ROWS_FOR_PARALLEL {
            (0..x.rows())
                .into_par_iter()
                .map(|i| match x.outer_view(i) {
                    Some(row) => self.predict_proba_row(row),
                    None => Vec::new(),
                })
                .collect()
        } else {
            x.outer_iterator()
                .map(|row| self.predict_proba_row(row))
                .collect()
        }
    }

    /// Most likely class per row; ties go to the lower class index.
    #[must_use]
    pub fn predict(&self, x: &CsMat<f64>) -> Vec<usize> {
        x.outer_iterator()
            .map(|row| argmax(&self.joint_log_likelihood(row)))
            .collect()
    }

    /// Dimensions agree and every parameter is a usable log probability.
    #[must_use]
    pub fn is_consistent(&self, n_features: usize) -> bool {
        self.alpha > 0.0
            && self.alpha.is_finite()
            && self.feature_log_prob.len() == self.class_log_prior.len()
            && self.class_log_prior.iter().any(|p| p.is_finite())
            && self.class_log_prior.iter().all(|p| !p.is_nan() && *p <= 0.0)
            && self.feature_log_prob.iter().all(|row| {
                row.len() == n_features && row.iter().all(|p| p.is_finite() && *p <= 0.0)
            })
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}

/// Fraction of `predicted` equal to `expected`.
pub(crate) fn accuracy(predicted: &[usize], expected: &[usize]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    correct as f64 / expected.len() as f64
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sprs::TriMat;

    use super::*;

    /// Two features; class 0 uses feature 0, class 1 uses feature 1.
    fn toy() -> (CsMat<f64>, Vec<usize>) {
        let mut tri = TriMat::new((4, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 0, 0.8);
        tri.add_triplet(1, 1, 0.2);
        tri.add_triplet(2, 1, 1.0);
        tri.add_triplet(3, 1, 0.9);
        tri.add_triplet(3, 0, 0.1);
        (tri.to_csr(), vec![0, 0, 1, 1])
    }

    fn row(values: &[(usize, f64)], n_features: usize) -> CsMat<f64> {
        let mut tri = TriMat::new((1, n_features));
        for &(col, value) in values {
            tri.add_triplet(0, col, value);
        }
        tri.to_csr()
    }

    #[test]
    fn test_fit_matches_closed_form() {
        let (x, y) = toy();
        let nb = MultinomialNb::fit(&x, &y, 2, 1.0);
        assert_eq!(nb.n_classes(), 2);
        assert_eq!(nb.n_features(), 2);
        // class 0 feature counts: [1.8, 0.2], smoothed total 2.0 + 2.0
        let expected = ((1.8 + 1.0) / 4.0_f64).ln();
        assert!((nb.feature_log_prob[0][0] - expected).abs() < 1e-12);
        assert!((nb.class_log_prior[0] - 0.5_f64.ln()).abs() < 1e-12);
    }

    #[rstest]
    #[case(&[(0, 1.0)], 0)]
    #[case(&[(1, 1.0)], 1)]
    #[case(&[(0, 0.9), (1, 0.1)], 0)]
    fn test_predict(#[case] values: &[(usize, f64)], #[case] expected: usize) {
        let (x, y) = toy();
        let nb = MultinomialNb::fit(&x, &y, 2, 1.0);
        assert_eq!(nb.predict(&row(values, 2)), vec![expected]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = toy();
        let nb = MultinomialNb::fit(&x, &y, 2, 0.1);
        for probs in nb.predict_proba(&x) {
            assert_eq!(probs.len(), 2);
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_zero_row_falls_back_to_prior() {
        let (x, _) = toy();
        let nb = MultinomialNb::fit(&x, &[0, 0, 0, 1], 2, 1.0);
        let probs = nb.predict_proba(&row(&[], 2));
        assert!((probs[0][0] - 0.75).abs() < 1e-9);
        assert_eq!(nb.predict(&row(&[], 2)), vec![0]);
    }

    #[test]
    fn test_smaller_alpha_is_more_confident() {
        let (x, y) = toy();
        let sharp = MultinomialNb::fit(&x, &y, 2, 0.01).predict_proba(&row(&[(1, 1.0)], 2));
        let smooth = MultinomialNb::fit(&x, &y, 2, 10.0).predict_proba(&row(&[(1, 1.0)], 2));
        assert!(sharp[0][1] > smooth[0][1]);
    }

    #[test]
    fn test_consistency_checks_width() {
        let (x, y) = toy();
        let nb = MultinomialNb::fit(&x, &y, 2, 1.0);
        assert!(nb.is_consistent(2));
        assert!(!nb.is_consistent(3));
    }

    #[test]
    fn test_accuracy() {
        assert!((accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]) - 0.75).abs() < 1e-12);
        assert!(accuracy(&[], &[]).abs() < f64::EPSILON);
    }
}
