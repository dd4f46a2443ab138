//! # is-it-fake
//!
//! Detects computer generated (fake) product reviews.
//!
//! Review text is normalized (letters only, lowercase, English stopwords
//! removed, Porter stemmed), turned into TF-IDF features over word 1-3 grams
//! and scored by a Multinomial Naive Bayes classifier. The trained pipeline is
//! persisted as a single artifact and lazily loaded, once, on first use.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use is_it_fake::ReviewDetector;
//!
//! // Loads `$IS_IT_FAKE_MODEL` (or `model_artifacts/review-classifier.bin`)
//! // on the first prediction.
//! let detector = ReviewDetector::new();
//!
//! let prediction = detector.predict("Amazing product, best purchase ever, buy now!")?;
//! println!(
//!     "P(generated) = {:.2}%",
//!     prediction.generated_probability() * 100.0
//! );
//!
//! let category = detector.classify("Arrived broken and support never replied.")?;
//! println!("{}", category.label());
//! # Ok::<(), is_it_fake::DetectorError>(())
//! ```
//!
//! ## Training
//!
//! ```rust,no_run
//! use is_it_fake::{FileArtifactStore, TrainingConfig, training};
//!
//! let store = FileArtifactStore::new("model_artifacts/review-classifier.bin");
//! let report = training::train_and_save("fake_reviews.csv", &TrainingConfig::default(), &store)?;
//! println!("held-out accuracy: {:?}", report.holdout_accuracy);
//! # Ok::<(), is_it_fake::TrainError>(())
//! ```

#[cfg(feature = "cli")]
pub mod cli;

mod category;
mod error;
pub mod model;
mod pipeline;
pub mod training;

pub use category::{Category, UnknownLabel};
pub use error::{ArtifactError, DetectorError, ErrorKind, TrainError, TrainingDataError};
pub use is_it_fake_preprocessing::{Normalizer, normalize};
pub use model::{
    ArtifactStore, CLASSIFICATION_THRESHOLD, FileArtifactStore, MemoryArtifactStore, ModelHandle,
    RetryPolicy, TrainedPipeline,
};
pub use pipeline::Prediction;
pub use training::{TrainingConfig, TrainingReport};
use tracing::warn;

/// Outcome of classifying one review, shaped for a web layer: either a label
/// with a confidence annotation, or an error kind and message.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Classified {
        category: Category,
        label: &'static str,
        confidence: String,
        generated_probability: f64,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl Verdict {
    #[must_use]
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }
}

/// Entry point for classifying reviews against a trained artifact.
///
/// Use `ReviewDetector::new()` to read the artifact from the default location,
/// or [`ReviewDetector::with_store`] for any other [`ArtifactStore`]. The
/// artifact is loaded on the first prediction and shared by every later call,
/// including calls from other threads.
///
/// # Examples
///
/// ```rust,no_run
/// use is_it_fake::ReviewDetector;
///
/// // Default threshold
/// let detector = ReviewDetector::from_path("model.bin");
/// let prediction = detector.predict("some review")?;
///
/// // Custom threshold
/// let detector = ReviewDetector::from_path("model.bin").with_threshold(0.7);
/// let category = detector.classify("some review")?;
/// # Ok::<(), is_it_fake::DetectorError>(())
/// ```
#[derive(Debug)]
pub struct ReviewDetector<S = FileArtifactStore> {
    model: ModelHandle<S>,
    threshold: f64,
}

impl ReviewDetector<FileArtifactStore> {
    /// Detector backed by `$IS_IT_FAKE_MODEL` or the default artifact path.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(FileArtifactStore::from_env())
    }

    pub fn from_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::with_store(FileArtifactStore::new(path))
    }
}

impl<S: ArtifactStore> ReviewDetector<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            model: ModelHandle::new(store),
            threshold: CLASSIFICATION_THRESHOLD,
        }
    }

    /// Set a custom classification threshold.
    ///
    /// The threshold is the P(Generated) cutoff:
    /// - If P(Generated) >= threshold: [`Category::Generated`]
    /// - If P(Generated) < threshold: [`Category::Authentic`]
    ///
    /// Values outside `[0.0, 1.0]` are clamped; NaN keeps the current threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        if threshold.is_nan() {
            warn!(threshold = self.threshold, "Ignoring NaN classification threshold");
            return self;
        }
        let clamped = threshold.clamp(0.0, 1.0);
        if clamped != threshold {
            warn!(threshold, clamped, "Classification threshold clamped to [0, 1]");
        }
        self.threshold = clamped;
        self
    }

    /// What to do on calls after the artifact failed to load.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.model = self.model.with_retry_policy(policy);
        self
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model(&self) -> &ModelHandle<S> {
        &self.model
    }

    /// Loads the artifact now instead of on the first prediction.
    pub fn preload(&self) -> Result<(), DetectorError> {
        self.model.get().map(|_| ())
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.model.is_loaded()
    }

    /// Predict probabilities for a single review.
    ///
    /// Empty or whitespace-only text is rejected with
    /// [`DetectorError::InvalidInput`]. Text that normalizes to nothing (only
    /// stopwords or punctuation) is still classified, from the class priors.
    pub fn predict<T: AsRef<str>>(&self, text: T) -> Result<Prediction, DetectorError> {
        let text = text.as_ref();
        validate_input(text)?;
        pipeline::predict(self.model.get()?, text)
    }

    /// Predict probabilities for multiple reviews, in input order.
    pub fn predict_batch<T: AsRef<str> + Sync>(
        &self,
        texts: &[T],
    ) -> Result<Vec<Prediction>, DetectorError> {
        for (idx, text) in texts.iter().enumerate() {
            validate_input(text.as_ref())
                .map_err(|_| DetectorError::InvalidInput(format!("review {idx} is empty")))?;
        }
        pipeline::predict_batch(self.model.get()?, texts)
    }

    /// Classify a single review using the configured threshold.
    pub fn classify<T: AsRef<str>>(&self, text: T) -> Result<Category, DetectorError> {
        self.predict(text)
            .map(|pred| pred.classification(self.threshold))
    }

    /// Classify multiple reviews using the configured threshold.
    pub fn classify_batch<T: AsRef<str> + Sync>(
        &self,
        texts: &[T],
    ) -> Result<Vec<Category>, DetectorError> {
        self.predict_batch(texts).map(|preds| {
            preds
                .into_iter()
                .map(|pred| pred.classification(self.threshold))
                .collect()
        })
    }

    /// Classifies `text` (which may be absent) into a [`Verdict`]. Never
    /// fails; errors become [`Verdict::Failed`].
    pub fn verdict(&self, text: Option<&str>) -> Verdict {
        let result = text
            .ok_or_else(|| DetectorError::InvalidInput("no review text supplied".to_owned()))
            .and_then(|text| self.predict(text));
        match result {
            Ok(prediction) => {
                let category = prediction.classification(self.threshold);
                Verdict::Classified {
                    category,
                    label: category.label(),
                    confidence: prediction.confidence_annotation(self.threshold),
                    generated_probability: prediction.generated_probability(),
                }
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "Review could not be classified");
                Verdict::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }
}

impl Default for ReviewDetector<FileArtifactStore> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_input(text: &str) -> Result<(), DetectorError> {
    if text.trim().is_empty() {
        return Err(DetectorError::InvalidInput(
            "review text is empty".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::model::artifact::tests::toy_pipeline;

    fn detector() -> ReviewDetector<MemoryArtifactStore> {
        let store = MemoryArtifactStore::with_pipeline(&toy_pipeline()).unwrap();
        ReviewDetector::with_store(store)
    }

    fn unavailable() -> ReviewDetector<MemoryArtifactStore> {
        ReviewDetector::with_store(MemoryArtifactStore::new())
    }

    #[test]
    fn test_predict_probabilities() {
        let prediction = detector()
            .predict("This is a test review")
            .expect("Prediction should succeed");

        assert!((0.0..=1.0).contains(&prediction.authentic_probability()));
        assert!((0.0..=1.0).contains(&prediction.generated_probability()));
        assert!(
            (prediction.authentic_probability() + prediction.generated_probability() - 1.0).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_classify() {
        let detector = detector();
        assert_eq!(
            detector.classify("amazing, the best buy!").unwrap(),
            Category::Generated
        );
        assert_eq!(
            detector.classify("the screen arrived broken").unwrap(),
            Category::Authentic
        );
    }

    #[test]
    fn test_threshold_moves_decision() {
        let strict = detector().with_threshold(1.0);
        assert_eq!(
            strict.classify("amazing, the best buy!").unwrap(),
            Category::Authentic
        );
    }

    #[test]
    fn test_batch_predictions() {
        let texts = vec!["Review 1", "Review 2", "Review 3"];
        let predictions = detector()
            .predict_batch(&texts)
            .expect("Batch prediction should succeed");
        assert_eq!(predictions.len(), 3);
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let detector = detector();
        for text in ["", "   ", "\n\t"] {
            let err = detector.predict(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        let err = detector.classify_batch(&["fine", ""]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_input_is_checked_before_loading() {
        let detector = unavailable();
        assert_eq!(
            detector.predict("").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert!(!detector.is_ready());
    }

    #[test]
    fn test_stopwords_only_still_classifies() {
        assert!(detector().predict("the and of !!!").is_ok());
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let detector = unavailable();
        assert_eq!(
            detector.predict("a real review").unwrap_err().kind(),
            ErrorKind::ModelUnavailable
        );
        assert!(detector.preload().is_err());
    }

    #[test]
    fn test_verdict() {
        let detector = detector();
        match detector.verdict(Some("amazing best perfect buy")) {
            Verdict::Classified {
                category,
                label,
                confidence,
                ..
            } => {
                assert_eq!(category, Category::Generated);
                assert_eq!(label, "Computer Generated (Fake) Review");
                assert!(confidence.starts_with("Model confidence: "));
                assert!(confidence.ends_with('%'));
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(
            detector.verdict(None),
            Verdict::Failed {
                kind: ErrorKind::InvalidInput,
                message: "invalid input: no review text supplied".to_owned(),
            }
        );
    }

    #[test]
    fn test_verdict_serializes_tagged() {
        let verdict = unavailable().verdict(Some("text"));
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "model_unavailable");
    }

    #[test]
    fn test_default_threshold() {
        let detector = ReviewDetector::from_path("unused.bin");
        assert!((detector.threshold() - CLASSIFICATION_THRESHOLD).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(f64::NAN, CLASSIFICATION_THRESHOLD)]
    #[case(-0.5, 0.0)]
    #[case(1.5, 1.0)]
    #[case(f64::INFINITY, 1.0)]
    #[case(0.7, 0.7)]
    fn test_threshold_is_kept_in_range(#[case] requested: f64, #[case] expected: f64) {
        let detector = ReviewDetector::from_path("unused.bin").with_threshold(requested);
        assert!((detector.threshold() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nan_threshold_still_flags_generated() {
        let detector = detector().with_threshold(f64::NAN);
        assert_eq!(
            detector.classify("amazing, the best buy!").unwrap(),
            Category::Generated
        );
    }
}
