use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

/// Public prefix under which uploaded files are referenced
pub const UPLOADS_PREFIX: &str = "/uploads/";
/// Sub-directory of the upload root holding deck images
pub const DECKS_SUBDIR: &str = "decks";

/// Resolves a stored reference such as `/uploads/decks/7.png` to the path
/// relative to the upload root. Only plain path segments are accepted: a
/// reference outside `/uploads/`, with an absolute remainder, a backslash,
/// `.` or `..` resolves to `None` and is ignored by every store.
pub fn relative_path(reference: &str) -> Option<&str> {
    let rel = reference.strip_prefix(UPLOADS_PREFIX)?;
    if rel.is_empty() || rel.contains('\\') {
        return None;
    }
    Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(rel)
}

/// Storage for deck image bytes, addressed by their public reference
#[async_trait]
pub trait FileStore {
    /// `Ok(None)` when the reference is not a managed upload or the file is gone
    async fn read(&self, reference: &str) -> Result<Option<Vec<u8>>, AppError>;
    async fn write(&self, reference: &str, bytes: &[u8]) -> Result<(), AppError>;
    /// Removing a missing file is not an error
    async fn remove(&self, reference: &str) -> Result<(), AppError>;
    /// Drops every deck image and recreates the empty deck directory
    async fn reset_deck_images(&self) -> Result<(), AppError>;
}

/// Files under a directory on the local disk
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        relative_path(reference).map(|rel| self.root.join(rel))
    }
}

fn io_failure(operation: &'static str) -> impl Fn(std::io::Error) -> AppError {
    move |e| {
        warn!(error = %e, operation, "File operation failed");
        AppError::StorageFailure(format!("{}: {}", operation, e))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    #[instrument(skip(self))]
    async fn read(&self, reference: &str) -> Result<Option<Vec<u8>>, AppError> {
        let Some(path) = self.resolve(reference) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Referenced file is missing");
                Ok(None)
            }
            Err(e) => Err(io_failure("read file")(e)),
        }
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn write(&self, reference: &str, bytes: &[u8]) -> Result<(), AppError> {
        let Some(path) = self.resolve(reference) else {
            warn!(reference, "Refusing to write outside the upload directory");
            return Err(AppError::InvalidInput(format!(
                "Invalid file reference: {}",
                reference
            )));
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_failure("create directory"))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(io_failure("write file"))
    }

    #[instrument(skip(self))]
    async fn remove(&self, reference: &str) -> Result<(), AppError> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_failure("remove file")(e)),
        }
    }

    #[instrument(skip(self))]
    async fn reset_deck_images(&self) -> Result<(), AppError> {
        let dir = self.root.join(DECKS_SUBDIR);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_failure("clear deck images")(e)),
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(io_failure("create deck image directory"))
    }
}

/// In-memory file store for development and testing
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn read(&self, reference: &str) -> Result<Option<Vec<u8>>, AppError> {
        let Some(rel) = relative_path(reference) else {
            return Ok(None);
        };
        Ok(self.files.read().await.get(rel).cloned())
    }

    async fn write(&self, reference: &str, bytes: &[u8]) -> Result<(), AppError> {
        let rel = relative_path(reference).ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid file reference: {}", reference))
        })?;
        self.files.write().await.insert(rel.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, reference: &str) -> Result<(), AppError> {
        if let Some(rel) = relative_path(reference) {
            self.files.write().await.remove(rel);
        }
        Ok(())
    }

    async fn reset_deck_images(&self) -> Result<(), AppError> {
        let prefix = format!("{}/", DECKS_SUBDIR);
        self.files.write().await.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
