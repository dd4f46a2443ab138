//! Pre-processing for is-it-fake
//!
//! Turns raw review text into normalized token strings and normalized token
//! strings into TF-IDF feature vectors. Both halves are deterministic so the
//! serving side reproduces exactly what training saw.

pub mod pre_processor;

pub use pre_processor::{
    DEFAULT_MAX_FEATURES, DEFAULT_MAX_NGRAM, DEFAULT_MIN_NGRAM, MAX_NGRAM_LEN, Normalizer,
    TfidfVectorizer, VectorizerParams, normalize,
};
