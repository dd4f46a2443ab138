use std::collections::BTreeMap;

use sprs::CsMat;
use tracing::debug;

use super::{
    count_vectorizer::{CountVectorizer, SparseRow, to_csr},
    params::VectorizerParams,
};

/// TF-IDF over word n-grams of already normalized text.
///
/// The vocabulary and IDF weights are frozen by [`TfidfVectorizer::fit`];
/// [`TfidfVectorizer::transform`] never changes them.
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct TfidfVectorizer {
    count_vectorizer: CountVectorizer,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit<T: AsRef<str> + Sync>(texts: &[T], count_vectorizer_params: VectorizerParams) -> Self {
        Self::fit_transform(texts, count_vectorizer_params).0
    }

    /// Fits on `texts` and returns their TF-IDF matrix alongside the vectorizer.
    pub fn fit_transform<T: AsRef<str> + Sync>(
        texts: &[T],
        count_vectorizer_params: VectorizerParams,
    ) -> (Self, CsMat<f64>) {
        debug!(num_texts = texts.len(), "Fitting TfidfVectorizer");
        let (count_vectorizer, tf_rows) =
            CountVectorizer::fit_count_rows(texts, count_vectorizer_params);
        debug!("Calculating IDF values");

        // Calculate IDF: log((n_docs + 1) / (df + 1)) + 1
        let n_docs = texts.len() as f64;
        let num_features = count_vectorizer.num_features();

        // Count document frequency for each term
        let mut df = vec![0usize; num_features];
        for row in &tf_rows {
            for &(col_idx, _) in row {
                df[col_idx] += 1;
            }
        }
        let idf = df
            .iter()
            .map(|&doc_freq| ((n_docs + 1.0) / (doc_freq as f64 + 1.0)).ln() + 1.0)
            .collect();
        debug!("IDF calculation complete");

        let vectorizer = Self {
            count_vectorizer,
            idf,
        };
        let matrix = vectorizer.weight(tf_rows);
        (vectorizer, matrix)
    }

    pub fn transform<T: AsRef<str> + Sync>(&self, texts: &[T]) -> CsMat<f64> {
        debug!(
            num_texts = texts.len(),
            "Transforming texts using TfidfVectorizer"
        );
        let tf_rows = self.count_vectorizer.count_rows(texts);
        self.weight(tf_rows)
    }

    /// Applies (optionally sublinear) TF, IDF and L2 row normalization.
    fn weight(&self, mut rows: Vec<SparseRow>) -> CsMat<f64> {
        let sublinear_tf = self.count_vectorizer.params().sublinear_tf();
        for row in &mut rows {
            for (col_idx, val) in row.iter_mut() {
                if sublinear_tf {
                    *val = 1.0 + val.ln();
                }
                *val *= self.idf[*col_idx];
            }
            let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, val) in row.iter_mut() {
                    *val /= norm;
                }
            }
        }
        to_csr(&rows, self.num_features())
    }

    pub fn num_features(&self) -> usize {
        self.count_vectorizer.num_features()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        self.count_vectorizer.vocabulary()
    }

    pub fn params(&self) -> &VectorizerParams {
        self.count_vectorizer.params()
    }

    /// IDF weight per feature index.
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Checks that the parameters are in range and that the vocabulary
    /// indices and IDF table describe the same feature space. A vectorizer
    /// built by `fit` always passes; a decoded one may not.
    pub fn is_consistent(&self) -> bool {
        let n = self.num_features();
        self.params().is_valid()
            && self.idf.len() == n
            && self.idf.iter().all(|w| w.is_finite() && *w > 0.0)
            && self.vocabulary().values().all(|&idx| idx < n)
    }
}
