use std::{io, path::PathBuf};

use thiserror::Error;

use crate::category::Category;

/// Coarse classification of a [`DetectorError`], stable enough to hand to callers
/// that only branch on the failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ModelUnavailable,
    Prediction,
}

/// Errors surfaced by the detector. Training reports [`TrainingDataError`]
/// and [`TrainError`] instead.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Empty or missing review text.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The trained artifact could not be loaded; the detector is degraded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// Feature extraction or classification failed on a loaded model.
    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl DetectorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::Prediction(_) => ErrorKind::Prediction,
        }
    }
}

/// Failures reading, writing or decoding a trained artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no model artifact at {path}")]
    Missing { path: PathBuf },
    #[error("failed to read artifact at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write artifact to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not an is-it-fake model artifact (bad magic bytes)")]
    BadMagic,
    #[error("failed to decode artifact: {0}")]
    Decode(#[source] bincode::error::DecodeError),
    #[error("failed to encode artifact: {0}")]
    Encode(#[source] bincode::error::EncodeError),
    #[error("artifact has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("artifact is internally inconsistent: {0}")]
    Inconsistent(String),
}

/// Problems with the labelled dataset or the training configuration. Fatal to
/// the training run; no artifact is written.
#[derive(Debug, Error)]
pub enum TrainingDataError {
    #[error("failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed dataset: {0}")]
    Malformed(#[from] csv::Error),
    #[error("dataset has no `{column}` column (found: {found})")]
    MissingColumn { column: String, found: String },
    #[error("unrecognised label {label:?} on line {line}")]
    UnknownLabel { line: u64, label: String },
    #[error("dataset has no usable rows ({dropped} incomplete rows dropped)")]
    Empty { dropped: usize },
    #[error("dataset only contains {present} reviews; both categories are required")]
    SingleClass { present: Category },
    #[error("every training review normalized to nothing; the vocabulary is empty")]
    EmptyVocabulary,
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a train-then-persist run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Data(#[from] TrainingDataError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}
