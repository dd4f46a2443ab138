mod count_vectorizer;
mod ngrams;
mod params;
mod tfidf_vectorizer;
mod tokenizer;

pub use params::{DEFAULT_MAX_FEATURES, DEFAULT_MAX_NGRAM, DEFAULT_MIN_NGRAM, MAX_NGRAM_LEN, VectorizerParams};
pub use tfidf_vectorizer::TfidfVectorizer;
