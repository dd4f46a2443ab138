//! Offline training: labelled CSV in, validated [`TrainedPipeline`] out.

pub mod dataset;
mod search;

use std::{fs, path::Path};

use is_it_fake_preprocessing::{
    DEFAULT_MAX_FEATURES, DEFAULT_MAX_NGRAM, DEFAULT_MIN_NGRAM, MAX_NGRAM_LEN, Normalizer,
    TfidfVectorizer, VectorizerParams,
};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{info, warn};

pub use self::dataset::{
    DEFAULT_LABEL_COLUMN, Dataset, DatasetOptions, LabeledExample, TEXT_COLUMN_CANDIDATES,
    load_dataset, read_dataset,
};
use crate::{
    category::Category,
    error::{TrainError, TrainingDataError},
    model::{
        ArtifactStore, TrainedPipeline,
        naive_bayes::{MultinomialNb, accuracy},
    },
};

/// Everything that shapes a training run. Loadable from JSON; unset fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Porter-stem tokens during normalization.
    pub stem: bool,
    pub min_ngram: usize,
    pub max_ngram: usize,
    /// Proportion in (0, 1) or absolute document count >= 1.
    pub min_df: f64,
    /// Proportion in (0, 1] or absolute document count > 1.
    pub max_df: f64,
    pub max_features: Option<usize>,
    pub sublinear_tf: bool,
    /// Smoothing used when no search runs.
    pub alpha: f64,
    /// Candidates for the cross-validated search. Empty disables the search.
    pub search_alphas: Vec<f64>,
    /// Cross-validation folds, reduced to the smallest class size.
    pub folds: usize,
    /// Share of each class held out for the final evaluation.
    pub holdout_fraction: f64,
    pub seed: u64,
    pub dataset: DatasetOptions,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            stem: true,
            min_ngram: DEFAULT_MIN_NGRAM,
            max_ngram: DEFAULT_MAX_NGRAM,
            min_df: 1.0,
            max_df: 1.0,
            max_features: Some(DEFAULT_MAX_FEATURES),
            sublinear_tf: false,
            alpha: 1.0,
            search_alphas: vec![0.01, 0.1, 0.5, 1.0],
            folds: 5,
            holdout_fraction: 0.2,
            seed: 42,
            dataset: DatasetOptions::default(),
        }
    }
}

impl TrainingConfig {
    /// Reads a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TrainingDataError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| TrainingDataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            TrainingDataError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrainingDataError> {
        let invalid = |msg: String| Err(TrainingDataError::InvalidConfig(msg));
        if self.min_ngram == 0 || self.min_ngram > self.max_ngram || self.max_ngram > MAX_NGRAM_LEN
        {
            return invalid(format!(
                "n-gram range {}..={} must be non-empty and within 1..={MAX_NGRAM_LEN}",
                self.min_ngram, self.max_ngram
            ));
        }
        if !(self.min_df > 0.0 && self.min_df.is_finite()) {
            return invalid(format!("min_df must be positive, got {}", self.min_df));
        }
        if !(self.max_df > 0.0 && self.max_df.is_finite()) {
            return invalid(format!("max_df must be positive, got {}", self.max_df));
        }
        if self.max_features == Some(0) {
            return invalid("max_features must be greater than zero when set".to_owned());
        }
        if let Some(alpha) = std::iter::once(&self.alpha)
            .chain(&self.search_alphas)
            .find(|a| !(**a > 0.0 && a.is_finite()))
        {
            return invalid(format!("smoothing alpha must be positive, got {alpha}"));
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return invalid(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.stem)
    }

    /// Only call on a validated config.
    fn vectorizer_params(&self) -> VectorizerParams {
        VectorizerParams::new(
            self.min_ngram..=self.max_ngram,
            self.min_df,
            self.max_df,
            self.max_features,
            self.sublinear_tf,
        )
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrainingReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub train_examples: usize,
    pub holdout_examples: usize,
    pub vocabulary_size: usize,
    pub alpha: f64,
    /// Mean validation accuracy of the chosen alpha, when the search ran.
    pub cv_accuracy: Option<f64>,
    pub train_accuracy: f64,
    /// Accuracy on the held-out split, when there is one.
    pub holdout_accuracy: Option<f64>,
}

/// Fits a pipeline on `examples`.
///
/// The vocabulary, IDF weights and classifier only ever see the training
/// split; the holdout is used for the reported accuracy alone. Nothing is
/// persisted.
pub fn train(
    examples: &[LabeledExample],
    config: &TrainingConfig,
) -> Result<(TrainedPipeline, TrainingReport), TrainingDataError> {
    config.validate()?;
    if examples.is_empty() {
        return Err(TrainingDataError::Empty { dropped: 0 });
    }
    let counts = dataset::class_counts(examples);
    if let Some(missing) = Category::ALL.into_iter().find(|c| counts[c.index()] == 0) {
        let present = Category::ALL
            .into_iter()
            .find(|&c| c != missing)
            .unwrap_or(missing);
        return Err(TrainingDataError::SingleClass { present });
    }

    let normalizer = config.normalizer();
    let params = config.vectorizer_params();
    let texts = examples.iter().map(|e| e.text.as_str()).collect::<Vec<_>>();
    let normalized = normalizer.normalize_batch(&texts);
    let labels = examples.iter().map(|e| e.label.index()).collect::<Vec<_>>();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (train_idx, holdout_idx) =
        search::stratified_split(&labels, config.holdout_fraction, &mut rng);
    let train_texts = train_idx
        .iter()
        .map(|&i| normalized[i].clone())
        .collect::<Vec<_>>();
    let train_labels = train_idx.iter().map(|&i| labels[i]).collect::<Vec<_>>();
    info!(
        train = train_idx.len(),
        holdout = holdout_idx.len(),
        "Split dataset"
    );

    let mut train_counts = [0usize; Category::ALL.len()];
    for &label in &train_labels {
        train_counts[label] += 1;
    }
    let smallest_class = train_counts.into_iter().min().unwrap_or(0);
    let folds = config.folds.min(smallest_class);
    let outcome = if folds >= 2 {
        let folds = search::stratified_folds(&train_labels, folds, &mut rng);
        search::grid_search(
            &train_texts,
            &train_labels,
            &folds,
            &config.search_alphas,
            &params,
        )
    } else {
        if !config.search_alphas.is_empty() {
            warn!(
                requested = config.folds,
                smallest_class, "Too few examples per class for cross-validation; skipping search"
            );
        }
        None
    };
    let alpha = outcome.as_ref().map_or(config.alpha, |o| o.alpha);

    let (vectorizer, x_train) = TfidfVectorizer::fit_transform(&train_texts, params);
    if vectorizer.num_features() == 0 {
        return Err(TrainingDataError::EmptyVocabulary);
    }
    let classifier = MultinomialNb::fit(&x_train, &train_labels, Category::ALL.len(), alpha);
    let train_accuracy = accuracy(&classifier.predict(&x_train), &train_labels);

    let holdout_accuracy = (!holdout_idx.is_empty()).then(|| {
        let holdout_texts = holdout_idx
            .iter()
            .map(|&i| normalized[i].as_str())
            .collect::<Vec<_>>();
        let holdout_labels = holdout_idx.iter().map(|&i| labels[i]).collect::<Vec<_>>();
        let x_holdout = vectorizer.transform(&holdout_texts);
        accuracy(&classifier.predict(&x_holdout), &holdout_labels)
    });

    let report = TrainingReport {
        rows_read: examples.len(),
        rows_dropped: 0,
        train_examples: train_idx.len(),
        holdout_examples: holdout_idx.len(),
        vocabulary_size: vectorizer.num_features(),
        alpha,
        cv_accuracy: outcome.map(|o| o.cv_accuracy),
        train_accuracy,
        holdout_accuracy,
    };
    let pipeline = TrainedPipeline::new(normalizer, vectorizer, classifier);
    pipeline.validate().map_err(|e| {
        TrainingDataError::InvalidConfig(format!("trained pipeline failed validation: {e}"))
    })?;

    info!(
        vocabulary_size = report.vocabulary_size,
        alpha = report.alpha,
        train_accuracy = report.train_accuracy,
        holdout_accuracy = ?report.holdout_accuracy,
        "Training complete"
    );
    Ok((pipeline, report))
}

/// Loads the dataset at `path` and trains on it.
pub fn train_from_file(
    path: impl AsRef<Path>,
    config: &TrainingConfig,
) -> Result<(TrainedPipeline, TrainingReport), TrainingDataError> {
    config.validate()?;
    let dataset = load_dataset(path, &config.dataset)?;
    if dataset.examples.is_empty() {
        return Err(TrainingDataError::Empty {
            dropped: dataset.rows_dropped,
        });
    }
    let (pipeline, mut report) = train(&dataset.examples, config)?;
    report.rows_read = dataset.rows_read;
    report.rows_dropped = dataset.rows_dropped;
    Ok((pipeline, report))
}

/// Trains on the dataset at `path` and persists the result to `store`.
/// Nothing is written unless training succeeds.
pub fn train_and_save<S: ArtifactStore + ?Sized>(
    path: impl AsRef<Path>,
    config: &TrainingConfig,
    store: &S,
) -> Result<TrainingReport, TrainError> {
    let (pipeline, report) = train_from_file(path, config)?;
    store.save(&pipeline)?;
    info!(location = store.describe(), "Model artifact written");
    Ok(report)
}
