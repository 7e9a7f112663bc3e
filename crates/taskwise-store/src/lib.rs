mod local;

pub use local::LocalStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {0} does not exist")]
    NotFound(String),

    /// The key is empty, absolute, or has `.`/`..` segments.
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

/// Where uploaded attachment files and profile photos live. Keys are
/// relative `/`-separated paths built by [`task_attachment_key`] and
/// [`profile_photo_key`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create or replace the object at `key`.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// [`StoreError::NotFound`] when nothing is stored at `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Idempotent: removing a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Sorted keys under `prefix`, e.g. `attachments/5` for one task.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_opt(key).await?.is_some())
    }
}

// -- Key helpers --

pub fn task_attachment_key(task_id: i64, object_id: &str, filename: &str) -> String {
    format!("attachments/{task_id}/{object_id}/{}", sanitize_filename(filename))
}

pub fn profile_photo_key(object_id: &str, filename: &str) -> String {
    format!("profile-photos/{object_id}/{}", sanitize_filename(filename))
}

/// Reduce a client-supplied file name to a single safe path segment.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Keys must be relative and free of `.`/`..` segments so they can never
/// resolve outside the store root.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// -- Configuration --

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Base directory for stored objects. `None` uses
    /// `$XDG_DATA_HOME/taskwise/storage`.
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            local_data_dir: std::env::var("TASKWISE_DATA_DIR").ok(),
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir().join("storage"))
    }
}

/// Same resolution as `taskwise_db::data_dir()`, without depending on the db crate.
fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskwise")
}

// -- Factory --

pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    Ok(Arc::new(LocalStore::new(config)))
}
