use ahash::HashMap;
use dashmap::DashMap;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use super::tokenizer::progress_bar_setup;

/// An n-gram as its tokens joined by single spaces, e.g. `"best buy"`.
pub type NgramKey = String;

/// Corpus statistics for one n-gram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermStats {
    /// Number of documents containing the n-gram.
    pub doc_freq: usize,
    /// Total occurrences across the corpus.
    pub term_freq: usize,
}

pub fn count_ngrams<S: AsRef<str>>(
    tokens: &[S],
    (min_n, max_n): (usize, usize),
) -> HashMap<NgramKey, usize> {
    let mut ngram_counter = HashMap::default();

    for n in min_n..=max_n {
        for window in tokens.windows(n) {
            let mut key = String::new();
            for (i, token) in window.iter().enumerate() {
                if i > 0 {
                    key.push(' ');
                }
                key.push_str(token.as_ref());
            }
            *ngram_counter.entry(key).or_insert(0) += 1;
        }
    }
    ngram_counter
}

pub fn build_vocabulary<H: std::hash::BuildHasher + Sync>(
    ngram_maps: &[std::collections::HashMap<NgramKey, usize, H>],
) -> DashMap<NgramKey, TermStats, ahash::RandomState> {
    let vocab_stats = DashMap::with_hasher(ahash::RandomState::default());

    let pb = progress_bar_setup(ngram_maps.len(), "Building vocabulary");
    ngram_maps.par_iter().progress_with(pb.clone()).for_each(|ngrams| {
        for (ngram, &count) in ngrams {
            let mut stats = vocab_stats.entry(ngram.clone()).or_insert_with(TermStats::default);
            stats.doc_freq += 1;
            stats.term_freq += count;
        }
    });
    pb.finish_and_clear();
    vocab_stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ngrams_unigrams_to_trigrams() {
        let tokens = ["best", "buy", "best", "buy"];
        let counts = count_ngrams(&tokens, (1, 3));
        assert_eq!(counts["best"], 2);
        assert_eq!(counts["buy"], 2);
        assert_eq!(counts["best buy"], 2);
        assert_eq!(counts["buy best"], 1);
        assert_eq!(counts["best buy best"], 1);
        assert_eq!(counts["buy best buy"], 1);
        assert_eq!(counts.len(), 6);
    }

    #[test]
    fn test_count_ngrams_shorter_than_n() {
        let tokens = ["alone"];
        let counts = count_ngrams(&tokens, (2, 3));
        assert!(counts.is_empty());
    }

    #[test]
    fn test_build_vocabulary_counts_documents_once() {
        let docs = [
            count_ngrams(&["great", "great"], (1, 1)),
            count_ngrams(&["great", "price"], (1, 1)),
        ];
        let vocab = build_vocabulary(&docs);
        let great = *vocab.get("great").expect("great in vocabulary");
        assert_eq!(great, TermStats { doc_freq: 2, term_freq: 3 });
        assert_eq!(vocab.get("price").map(|s| s.doc_freq), Some(1));
    }
}
