use is_it_fake_preprocessing::{Normalizer, TfidfVectorizer};
use tracing::debug;

use super::naive_bayes::MultinomialNb;
use crate::{category::Category, error::ArtifactError};

/// Leading bytes of every serialized pipeline.
pub const ARTIFACT_MAGIC: &[u8; 4] = b"IIFK";

/// Decode refuses to allocate beyond this, whatever the length prefixes say.
const DECODE_LIMIT: usize = 1 << 30;

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<DECODE_LIMIT>()
}

/// Everything needed to go from raw review text to a category: the normalizer
/// configuration, the fitted vectorizer, the fitted classifier and the class
/// table mapping classifier output indices to categories.
///
/// Produced by training, persisted as a single artifact, and never mutated
/// once loaded.
#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
pub struct TrainedPipeline {
    normalizer: Normalizer,
    vectorizer: TfidfVectorizer,
    classifier: MultinomialNb,
    classes: Vec<Category>,
}

impl TrainedPipeline {
    pub(crate) fn new(
        normalizer: Normalizer,
        vectorizer: TfidfVectorizer,
        classifier: MultinomialNb,
    ) -> Self {
        Self {
            normalizer,
            vectorizer,
            classifier,
            classes: Category::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    #[must_use]
    pub fn classifier(&self) -> &MultinomialNb {
        &self.classifier
    }

    /// Category for each classifier output index.
    #[must_use]
    pub fn classes(&self) -> &[Category] {
        &self.classes
    }

    /// Serializes to the on-disk artifact format: [`ARTIFACT_MAGIC`] followed
    /// by the bincode encoding of the pipeline.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        let body = bincode::encode_to_vec(self, bincode_config()).map_err(ArtifactError::Encode)?;
        bytes.extend_from_slice(&body);
        debug!(size = bytes.len(), "Encoded trained pipeline");
        Ok(bytes)
    }

    /// Decodes and validates an artifact produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let body = bytes
            .strip_prefix(ARTIFACT_MAGIC.as_slice())
            .ok_or(ArtifactError::BadMagic)?;
        let (pipeline, read): (Self, usize) =
            bincode::decode_from_slice(body, bincode_config()).map_err(ArtifactError::Decode)?;
        if read != body.len() {
            return Err(ArtifactError::TrailingBytes(body.len() - read));
        }
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Checks that the components agree on the feature space and that the
    /// class table is the one this crate predicts with.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.classes != Category::ALL {
            return Err(ArtifactError::Inconsistent(format!(
                "unexpected class table {:?}",
                self.classes
            )));
        }
        if !self.vectorizer.is_consistent() {
            return Err(ArtifactError::Inconsistent(
                "vectorizer parameters are out of range or its vocabulary and IDF table disagree"
                .to_owned(),
            ));
        }
        let n_features = self.vectorizer.num_features();
        if self.classifier.n_classes() != self.classes.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "classifier has {} classes, class table has {}",
                self.classifier.n_classes(),
                self.classes.len()
            )));
        }
        if !self.classifier.is_consistent(n_features) {
            return Err(ArtifactError::Inconsistent(format!(
                "classifier does not match the {n_features}-feature vocabulary"
            )));
        }
        Ok(())
    }
}
