pub mod porter;
pub mod stopwords;

use rayon::prelude::*;
use tracing::debug;

use self::stopwords::is_stop_word;

/// Minimum number of texts before [`Normalizer::normalize_batch`] fans out to rayon.
const MIN_TEXTS_FOR_PARALLEL: usize = 256;

/// Turns raw review text into a normalized token string.
///
/// Every byte outside `A-Z` / `a-z` acts as a word separator, the rest is
/// lowercased, English stopwords are dropped and, when stemming is enabled,
/// each token is reduced with the Porter stemmer. The output is the remaining
/// tokens joined with single spaces.
///
/// The configuration travels inside the trained artifact so the serving side
/// normalizes exactly the way training did.
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Normalizer {
    stem: bool,
}

impl Normalizer {
    #[must_use]
    pub fn new(stem: bool) -> Self {
        Self { stem }
    }

    /// Normalizer without the stemming step.
    #[must_use]
    pub fn unstemmed() -> Self {
        Self::new(false)
    }

    #[must_use]
    pub fn stems(&self) -> bool {
        self.stem
    }

    /// Tokens of `raw` in order, after stopword removal and optional stemming.
    pub fn tokens<'a>(&self, raw: &'a str) -> impl Iterator<Item = String> + 'a {
        let stem = self.stem;
        raw.split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| !word.is_empty())
            .map(str::to_ascii_lowercase)
            .filter(|word| !is_stop_word(word))
            .map(move |word| {
                if stem {
                    porter::stem_to_fixpoint(&word)
                } else {
                    word
                }
            })
            // A stem can land on a stopword ("ins" -> "in").
            .filter(|word| !is_stop_word(word))
    }

    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for token in self.tokens(raw) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token);
        }
        out
    }

    /// Normalizes many texts, in parallel once the batch is large enough.
    /// Output order matches input order.
    pub fn normalize_batch<T: AsRef<str> + Sync>(&self, texts: &[T]) -> Vec<String> {
        if texts.len() >= MIN_TEXTS_FOR_PARALLEL {
            debug!(num_texts = texts.len(), "Normalizing texts in parallel");
            texts
                .par_iter()
                .map(|text| self.normalize(text.as_ref()))
                .collect()
        } else {
            texts
                .iter()
                .map(|text| self.normalize(text.as_ref()))
                .collect()
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Normalizes `raw` with the default (stemmed) [`Normalizer`].
///
/// ```
/// use is_it_fake_preprocessing::normalize;
///
/// assert_eq!(normalize("the a an quick"), "quick");
/// assert_eq!(normalize("Great!!!   product."), "great product");
/// assert_eq!(normalize(""), "");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "!!!???",
        "The item arrived broken and I was very disappointed.",
        "AMAZING product!!! Best purchase EVER, buy now :)",
        "great!!100% would recommend",
        "Agreed, the conditional generalization was hopefully controlling.",
        "Caf\u{e9} na\u{ef}ve r\u{e9}sum\u{e9} -- ins and outs",
        "don't won't shouldn't can't",
        "relational relate related relating",
    ];

    #[rstest]
    #[case("the a an quick", "quick")]
    #[case("Great!!!   product.", "great product")]
    #[case("great product", "great product")]
    #[case("great!!100%", "great")]
    #[case("", "")]
    #[case("the and of", "")]
    #[case("... ,,, !!!", "")]
    #[case("arrived broken disappointed", "arriv broken disappoint")]
    #[case("don't stop", "stop")]
    fn test_normalize(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize(raw), expected);
    }

    #[test]
    fn test_non_letters_separate_words() {
        assert_eq!(Normalizer::unstemmed().normalize("good2great"), "good great");
        assert_eq!(Normalizer::unstemmed().normalize("caf\u{e9}s"), "caf");
    }

    #[test]
    fn test_unstemmed_keeps_word_forms() {
        assert_eq!(
            Normalizer::unstemmed().normalize("Running dogs were barking"),
            "running dogs barking"
        );
        assert_eq!(
            Normalizer::default().normalize("Running dogs were barking"),
            "run dog bark"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for normalizer in [Normalizer::default(), Normalizer::unstemmed()] {
            for sample in SAMPLES {
                let once = normalizer.normalize(sample);
                assert_eq!(normalizer.normalize(&once), once, "sample: {sample:?}");
            }
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        for sample in SAMPLES {
            let first = normalize(sample);
            for _ in 0..5 {
                assert_eq!(normalize(sample), first);
            }
        }
    }

    #[test]
    fn test_output_is_lowercase_alpha_tokens() {
        for sample in SAMPLES {
            let out = normalize(sample);
            assert!(!out.starts_with(' ') && !out.ends_with(' ') && !out.contains("  "));
            assert!(out.bytes().all(|b| b == b' ' || b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_normalize_batch_preserves_order() {
        let texts: Vec<String> = (0..600)
            .map(|i| format!("review number {i} was amazing"))
            .collect();
        let normalized = Normalizer::default().normalize_batch(&texts);
        assert_eq!(normalized.len(), texts.len());
        for (raw, out) in texts.iter().zip(&normalized) {
            assert_eq!(&normalize(raw), out);
        }
    }
}
