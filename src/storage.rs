use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file name '{0}' is not usable")]
    InvalidName(String),
    #[error("stored file is not valid UTF-8")]
    NotUtf8,
    #[error("simulated storage failure")]
    Simulated,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// ReadingStore
///
/// Where uploaded reading texts live. Names handed to `save` and `read` are the
/// final stored names (`{owner}_{basename}`), already produced by `stored_name`.
/// Swapping `LocalDiskStore` for `MockReadingStore` keeps handler tests off the disk.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Creates the backing location if needed. Called once at startup.
    async fn ensure_dir(&self) -> Result<(), StorageError>;

    /// Writes (or overwrites) `name` with `content`.
    async fn save(&self, name: &str, content: &str) -> Result<(), StorageError>;

    /// Returns `None` when nothing is stored under `name`.
    async fn read(&self, name: &str) -> Result<Option<String>, StorageError>;
}

/// sanitize_filename
///
/// Reduces a client-supplied file name to its last path component, dropping
/// directory navigation (`..`, `.`) and separators of either flavour.
pub fn sanitize_filename(name: &str) -> Option<String> {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .last()
        .map(|segment| segment.trim().to_string())
        .filter(|segment| !segment.is_empty())
}

/// Builds the per-user stored name for an upload.
pub fn stored_name(owner: Uuid, filename: &str) -> Result<String, StorageError> {
    let base = sanitize_filename(filename)
        .ok_or_else(|| StorageError::InvalidName(filename.to_string()))?;
    Ok(format!("{owner}_{base}"))
}

/// Owner encoded in a stored name, if it carries one.
pub fn stored_owner(name: &str) -> Option<Uuid> {
    let (prefix, rest) = name.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    Uuid::parse_str(prefix).ok()
}

/// True when `name` can be used as-is, i.e. sanitizing it changes nothing.
pub fn is_plain_name(name: &str) -> bool {
    sanitize_filename(name).as_deref() == Some(name)
}

// --- Local disk ---

/// LocalDiskStore
///
/// Flat directory of uploads (`UPLOAD_DIR`).
#[derive(Clone, Debug)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ReadingStore for LocalDiskStore {
    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn save(&self, name: &str, content: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, content.as_bytes()).await?;
        tracing::debug!(path = %path.display(), "reading stored");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::NotUtf8),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// --- Mock ---

/// MockReadingStore
///
/// In-memory store for tests. `new_failing()` makes every call error out.
#[derive(Default)]
pub struct MockReadingStore {
    files: RwLock<HashMap<String, String>>,
    pub should_fail: bool,
}

impl MockReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ReadingStore for MockReadingStore {
    async fn ensure_dir(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(&self, name: &str, content: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        self.files
            .write()
            .await
            .insert(name.to_string(), content.to_string());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        Ok(self.files.read().await.get(name).cloned())
    }
}

/// StorageState
///
/// The concrete type used to share the reading store across the application state.
pub type StorageState = Arc<dyn ReadingStore>;
