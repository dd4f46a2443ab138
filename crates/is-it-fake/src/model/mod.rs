//! Trained model lifecycle on the serving side: a process-wide handle that
//! loads the persisted artifact at most once and shares it read-only.

pub mod artifact;
pub mod naive_bayes;
pub mod store;

use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{info, warn};

pub use self::{
    artifact::{ARTIFACT_MAGIC, TrainedPipeline},
    naive_bayes::MultinomialNb,
    store::{
        ArtifactStore, DEFAULT_MODEL_PATH, FileArtifactStore, MODEL_PATH_ENV, MemoryArtifactStore,
    },
};
use crate::error::DetectorError;

/// Default classification threshold between 0.0 and 1.0.
///
/// If P(Generated) >= threshold, the review is classified as generated.
/// At 0.5 this is the classifier's own most likely class.
pub const CLASSIFICATION_THRESHOLD: f64 = 0.5;

/// What to do on a call after the artifact failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry on every call.
    Always,
    /// Retry once this much time has passed since the last failure; report
    /// the cached failure until then.
    After(Duration),
    /// Stay degraded until [`ModelHandle::reload`] is called.
    Never,
}

impl RetryPolicy {
    fn allows_retry(self, since_failure: Duration) -> bool {
        match self {
            Self::Always => true,
            Self::After(backoff) => since_failure >= backoff,
            Self::Never => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::After(Duration::from_secs(30))
    }
}

#[derive(Debug)]
struct LoadFailure {
    at: Instant,
    reason: String,
}

/// Lazily loaded, shared, immutable [`TrainedPipeline`].
///
/// The first call to [`ModelHandle::get`] loads the artifact from the store.
/// Concurrent first callers wait on a single load; once loaded the pipeline
/// is read without locking. A failed load leaves the handle degraded: calls
/// report [`DetectorError::ModelUnavailable`] until the [`RetryPolicy`]
/// allows another attempt.
#[derive(Debug)]
pub struct ModelHandle<S = FileArtifactStore> {
    store: S,
    policy: RetryPolicy,
    loaded: OnceLock<TrainedPipeline>,
    /// Held for the duration of a load attempt.
    last_failure: Mutex<Option<LoadFailure>>,
}

impl<S: ArtifactStore> ModelHandle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            loaded: OnceLock::new(),
            last_failure: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Returns the loaded pipeline, loading it first if needed.
    pub fn get(&self) -> Result<&TrainedPipeline, DetectorError> {
        if let Some(pipeline) = self.loaded.get() {
            return Ok(pipeline);
        }
        self.load_slow(false)
    }

    /// Forces a load attempt now, ignoring any cached failure. Has no effect
    /// once the pipeline is loaded.
    pub fn reload(&self) -> Result<&TrainedPipeline, DetectorError> {
        if let Some(pipeline) = self.loaded.get() {
            return Ok(pipeline);
        }
        self.load_slow(true)
    }

    fn load_slow(&self, force: bool) -> Result<&TrainedPipeline, DetectorError> {
        let mut last_failure = self.last_failure.lock();
        // Another caller may have finished loading while we waited.
        if let Some(pipeline) = self.loaded.get() {
            return Ok(pipeline);
        }
        if let Some(failure) = last_failure.as_ref() {
            if !force && !self.policy.allows_retry(failure.at.elapsed()) {
                return Err(DetectorError::ModelUnavailable(failure.reason.clone()));
            }
        }

        let location = self.store.describe();
        info!(location, "Loading model artifact");
        match self.store.load() {
            Ok(pipeline) => {
                *last_failure = None;
                info!(
                    location,
                    num_features = pipeline.vectorizer().num_features(),
                    "Model artifact loaded"
                );
                Ok(self.loaded.get_or_init(|| pipeline))
            }
            Err(err) => {
                let reason = format!("{location}: {err}");
                warn!(%reason, "Failed to load model artifact");
                *last_failure = Some(LoadFailure {
                    at: Instant::now(),
                    reason: reason.clone(),
                });
                Err(DetectorError::ModelUnavailable(reason))
            }
        }
    }
}

impl Default for ModelHandle<FileArtifactStore> {
    fn default() -> Self {
        Self::new(FileArtifactStore::from_env())
    }
}
