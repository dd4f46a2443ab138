use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::artifact::TrainedPipeline;
use crate::error::ArtifactError;

/// Where the artifact lives when nothing else is configured.
pub const DEFAULT_MODEL_PATH: &str = "model_artifacts/review-classifier.bin";

/// Environment variable overriding [`DEFAULT_MODEL_PATH`].
pub const MODEL_PATH_ENV: &str = "IS_IT_FAKE_MODEL";

/// Durable home of a trained pipeline.
///
/// Training writes through [`ArtifactStore::save`]; the serving side only
/// ever calls [`ArtifactStore::load`], and never trains when that fails.
pub trait ArtifactStore: Send + Sync {
    fn load(&self) -> Result<TrainedPipeline, ArtifactError>;

    fn save(&self, pipeline: &TrainedPipeline) -> Result<(), ArtifactError>;

    /// Human readable location, for logs and error messages.
    fn describe(&self) -> String;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn load(&self) -> Result<TrainedPipeline, ArtifactError> {
        (**self).load()
    }

    fn save(&self, pipeline: &TrainedPipeline) -> Result<(), ArtifactError> {
        (**self).save(pipeline)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Artifact stored as a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `$IS_IT_FAKE_MODEL` when set, [`DEFAULT_MODEL_PATH`] otherwise.
    #[must_use]
    pub fn from_env() -> Self {
        match env::var_os(MODEL_PATH_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::new(DEFAULT_MODEL_PATH),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: io::Error) -> ArtifactError {
        ArtifactError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for FileArtifactStore {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self) -> Result<TrainedPipeline, ArtifactError> {
        debug!(path = %self.path.display(), "Reading model artifact");
        let bytes = fs::read(&self.path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ArtifactError::Missing {
                path: self.path.clone(),
            },
            _ => ArtifactError::Read {
                path: self.path.clone(),
                source,
            },
        })?;
        TrainedPipeline::from_bytes(&bytes)
    }

    /// Writes to a temporary file next to the target and renames it into
    /// place, so readers see either the old artifact or the new one.
    fn save(&self, pipeline: &TrainedPipeline) -> Result<(), ArtifactError> {
        let bytes = pipeline.to_bytes()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_err(e))?;
        tmp.write_all(&bytes).map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_err(e.error))?;

        info!(path = %self.path.display(), size = bytes.len(), "Saved model artifact");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Artifact kept in memory as encoded bytes. Goes through the same encode
/// and decode path as the file store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `pipeline`.
    pub fn with_pipeline(pipeline: &TrainedPipeline) -> Result<Self, ArtifactError> {
        let store = Self::new();
        store.save(pipeline)?;
        Ok(store)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self) -> Result<TrainedPipeline, ArtifactError> {
        match self.bytes.lock().as_deref() {
            Some(bytes) => TrainedPipeline::from_bytes(bytes),
            None => Err(ArtifactError::Missing {
                path: PathBuf::from(self.describe()),
            }),
        }
    }

    fn save(&self, pipeline: &TrainedPipeline) -> Result<(), ArtifactError> {
        let bytes = pipeline.to_bytes()?;
        *self.bytes.lock() = Some(bytes);
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::toy_pipeline;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("nested/dir/model.bin"));
        store.save(&toy_pipeline()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.classifier(), toy_pipeline().classifier());
    }

    #[test]
    fn test_missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("absent.bin"));
        assert!(matches!(store.load(), Err(ArtifactError::Missing { .. })));
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"IIFK\xff\xff\xff").unwrap();
        let store = FileArtifactStore::new(&path);
        assert!(matches!(store.load(), Err(ArtifactError::Decode(_))));
    }

    #[test]
    fn test_save_replaces_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"stale").unwrap();
        let store = FileArtifactStore::new(&path);
        store.save(&toy_pipeline()).unwrap();
        assert!(store.load().is_ok());
        // Only the artifact itself remains; the temporary file was renamed.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryArtifactStore::new();
        assert!(matches!(store.load(), Err(ArtifactError::Missing { .. })));
        store.save(&toy_pipeline()).unwrap();
        assert!(store.load().is_ok());
    }
}
