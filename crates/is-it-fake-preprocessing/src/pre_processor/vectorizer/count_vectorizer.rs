use std::{cmp::Reverse, collections::BTreeMap};

use ahash::HashMap;
use sprs::CsMat;
use tracing::debug;

use super::{
    ngrams::{self, NgramKey, TermStats},
    params::VectorizerParams,
    tokenizer,
};

/// Sparse row: `(feature index, value)` pairs sorted by feature index.
pub(super) type SparseRow = Vec<(usize, f64)>;

#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct CountVectorizer {
    params: VectorizerParams,
    /// Vocabulary mapping n-gram to feature index. Indices follow the
    /// lexicographic order of the n-grams. Ordered so the encoded form does
    /// not depend on hasher seeds.
    vocab: BTreeMap<NgramKey, usize>,
}

impl CountVectorizer {
    fn count_all(
        tokenized_texts: &[Vec<String>],
        params: &VectorizerParams,
    ) -> Vec<HashMap<NgramKey, usize>> {
        debug!("Computing n-grams for all documents");
        tokenized_texts
            .iter()
            .map(|tokens| ngrams::count_ngrams(tokens, params.ngram_range()))
            .collect()
    }

    /// Builds the vocabulary from per-document n-gram counts.
    ///
    /// Applies `min_df` / `max_df`, then keeps the `max_features` n-grams with
    /// the highest corpus count (ties broken lexicographically), then assigns
    /// indices in lexicographic order.
    fn fit_from_ngrams(ngram_maps: &[HashMap<NgramKey, usize>], params: VectorizerParams) -> Self {
        debug!("Building vocabulary from n-gram counts");
        let vocab_stats = ngrams::build_vocabulary(ngram_maps);
        let vocab_size = vocab_stats.len();

        let n_docs = ngram_maps.len();
        let min_count = params.min_doc_count(n_docs);
        let max_count = params.max_doc_count(n_docs);
        debug!(min_count, max_count, "Applying document frequency filtering");
        let mut filtered_vocab = vocab_stats
            .into_iter()
            .filter(|(_, stats)| stats.doc_freq >= min_count && stats.doc_freq <= max_count)
            .collect::<Vec<(NgramKey, TermStats)>>();
        debug!(
            original_size = vocab_size,
            filtered_size = filtered_vocab.len(),
            "Vocabulary filtered by document frequency"
        );

        if let Some(limit) = params.max_features() {
            if filtered_vocab.len() > limit {
                filtered_vocab.sort_by(|(a_key, a_stats), (b_key, b_stats)| {
                    Reverse(a_stats.term_freq)
                        .cmp(&Reverse(b_stats.term_freq))
                        .then_with(|| a_key.cmp(b_key))
                });
                filtered_vocab.truncate(limit);
                debug!(limit, "Vocabulary capped by max_features");
            }
        }

        let mut sorted_tokens = filtered_vocab
            .into_iter()
            .map(|(token, _)| token)
            .collect::<Vec<_>>();
        sorted_tokens.sort();
        let vocab = sorted_tokens
            .into_iter()
            .enumerate()
            .map(|(idx, token)| (token, idx))
            .collect::<BTreeMap<NgramKey, usize>>();

        debug!(vocab_size = vocab.len(), "CountVectorizer fitting complete");

        Self { params, vocab }
    }

    /// Raw counts per document, restricted to the vocabulary.
    pub(super) fn count_rows<T: AsRef<str> + Sync>(&self, texts: &[T]) -> Vec<SparseRow> {
        let tokenized_texts = tokenizer::tokenize(texts);
        let ngram_maps = Self::count_all(&tokenized_texts, &self.params);
        self.rows_from_ngrams(&ngram_maps)
    }

    fn rows_from_ngrams(&self, ngram_maps: &[HashMap<NgramKey, usize>]) -> Vec<SparseRow> {
        ngram_maps
            .iter()
            .map(|ngrams| {
                let mut row_entries = ngrams
                    .iter()
                    .filter_map(|(ngram_key, &count)| {
                        self.vocab
                            .get(ngram_key)
                            .map(|&col_idx| (col_idx, count as f64))
                    })
                    .collect::<SparseRow>();
                row_entries.sort_by_key(|(col_idx, _)| *col_idx);
                row_entries
            })
            .collect()
    }

    /// Fits the vocabulary and returns the count rows of the same texts,
    /// tokenizing and counting n-grams only once.
    pub(super) fn fit_count_rows<T: AsRef<str> + Sync>(
        texts: &[T],
        params: VectorizerParams,
    ) -> (Self, Vec<SparseRow>) {
        debug!(
            num_texts = texts.len(),
            "fit_transform: tokenizing and computing n-grams once"
        );
        let tokenized_texts = tokenizer::tokenize(texts);
        let ngram_maps = Self::count_all(&tokenized_texts, &params);
        let vectorizer = Self::fit_from_ngrams(&ngram_maps, params);
        let rows = vectorizer.rows_from_ngrams(&ngram_maps);
        (vectorizer, rows)
    }

    pub fn num_features(&self) -> usize {
        self.vocab.len()
    }

    /// Mapping of n-gram text to feature index.
    pub fn vocabulary(&self) -> &BTreeMap<NgramKey, usize> {
        &self.vocab
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }
}

/// Assembles sorted sparse rows into a CSR matrix with `num_features` columns.
pub(super) fn to_csr(rows: &[SparseRow], num_features: usize) -> CsMat<f64> {
    let mut indptr = Vec::with_capacity(rows.len() + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();

    indptr.push(0);
    for row in rows {
        for &(col_idx, value) in row {
            indices.push(col_idx);
            data.push(value);
        }
        indptr.push(indices.len());
    }

    debug!(non_zero_entries = data.len(), "Sparse matrix assembled");
    CsMat::new((rows.len(), num_features), indptr, indices, data)
}
