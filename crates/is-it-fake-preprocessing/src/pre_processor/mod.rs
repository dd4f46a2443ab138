//! Text normalization and TF-IDF vectorization with word-level n-grams.

mod normalizer;
mod vectorizer;

pub use normalizer::{Normalizer, normalize, porter, stopwords};
pub use vectorizer::{
    DEFAULT_MAX_FEATURES, DEFAULT_MAX_NGRAM, DEFAULT_MIN_NGRAM, MAX_NGRAM_LEN, TfidfVectorizer,
    VectorizerParams,
};
