use std::ops::RangeInclusive;

pub const DEFAULT_MIN_NGRAM: usize = 1;
pub const DEFAULT_MAX_NGRAM: usize = 3;
pub const DEFAULT_MAX_FEATURES: usize = 5000;
/// Longest n-gram a vectorizer may be configured with.
pub const MAX_NGRAM_LEN: usize = 8;

#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VectorizerParams {
    /// Smallest and largest n-gram length, inclusive.
    ngram_range: (usize, usize),
    /// Minimum document frequency for filtering vocabulary.
    /// - If `min_df` is in (0.0, 1.0), it's a proportion of documents
    /// - If `min_df` >= 1.0, it's an absolute document count
    min_df: f64,
    /// Maximum document frequency for filtering vocabulary.
    /// - If `max_df` is in (0.0, 1.0], it's a proportion of documents
    /// - If `max_df` > 1.0, it's an absolute document count
    max_df: f64,
    /// Keep only the `max_features` n-grams with the highest corpus term count.
    max_features: Option<usize>,
    /// Apply sublinear tf scaling: replace term frequency `tf` with `1 + log(tf)`.
    /// This reduces the impact of terms that occur many times in a document.
    sublinear_tf: bool,
}

impl VectorizerParams {
    pub fn new(
        ngram_range: impl Into<RangeInclusive<usize>>,
        min_df: f64,
        max_df: f64,
        max_features: Option<usize>,
        sublinear_tf: bool,
    ) -> Self {
        let range = ngram_range.into();
        let (min_n, max_n) = (*range.start(), *range.end());
        assert!(
            min_n >= 1 && min_n <= max_n && max_n <= MAX_NGRAM_LEN,
            "ngram_range must be a non-empty range within 1..={MAX_NGRAM_LEN}"
        );
        assert!(
            min_df > 0.0,
            "min_df must be positive (proportion in (0.0, 1.0) or absolute count >= 1.0)"
        );
        assert!(
            max_df > 0.0,
            "max_df must be positive (proportion in (0.0, 1.0] or absolute count > 1.0)"
        );
        assert!(
            max_features != Some(0),
            "max_features must be greater than zero when set"
        );
        Self {
            ngram_range: (min_n, max_n),
            min_df,
            max_df,
            max_features,
            sublinear_tf,
        }
    }

    /// Whether these parameters satisfy the invariants [`Self::new`] enforces.
    /// Decoded parameters never went through `new`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let (min_n, max_n) = self.ngram_range;
        (1..=MAX_NGRAM_LEN).contains(&min_n)
            && (min_n..=MAX_NGRAM_LEN).contains(&max_n)
            && self.min_df.is_finite()
            && self.min_df > 0.0
            && self.max_df.is_finite()
            && self.max_df > 0.0
            && self.max_features != Some(0)
    }

    #[must_use]
    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    #[must_use]
    pub fn min_df(&self) -> f64 {
        self.min_df
    }

    #[must_use]
    pub fn max_df(&self) -> f64 {
        self.max_df
    }

    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    #[must_use]
    pub fn sublinear_tf(&self) -> bool {
        self.sublinear_tf
    }

    /// `min_df` resolved against a corpus of `n_docs` documents.
    #[must_use]
    pub fn min_doc_count(&self, n_docs: usize) -> usize {
        if self.min_df < 1.0 {
            (self.min_df * n_docs as f64).ceil() as usize
        } else {
            self.min_df as usize
        }
    }

    /// `max_df` resolved against a corpus of `n_docs` documents.
    #[must_use]
    pub fn max_doc_count(&self, n_docs: usize) -> usize {
        if self.max_df <= 1.0 {
            (self.max_df * n_docs as f64).floor() as usize
        } else {
            self.max_df as usize
        }
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features.filter(|&k| k > 0);
        self
    }

    #[must_use]
    pub fn with_sublinear_tf(mut self, sublinear_tf: bool) -> Self {
        self.sublinear_tf = sublinear_tf;
        self
    }
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            ngram_range: (DEFAULT_MIN_NGRAM, DEFAULT_MAX_NGRAM),
            min_df: 1.0,
            max_df: 1.0,
            max_features: Some(DEFAULT_MAX_FEATURES),
            sublinear_tf: false,
        }
    }
}

impl From<((usize, usize), f64, f64, Option<usize>, bool)> for VectorizerParams {
    fn from(value: ((usize, usize), f64, f64, Option<usize>, bool)) -> Self {
        Self::new(value.0.0..=value.0.1, value.1, value.2, value.3, value.4)
    }
}
