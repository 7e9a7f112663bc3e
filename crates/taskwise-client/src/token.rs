use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::ClientError;

/// Key under which the bearer token is persisted.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Persistent string key/value storage for client-side state.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    async fn remove(&self, key: &str) -> Result<(), ClientError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert(AUTH_TOKEN_KEY.to_string(), token.to_string());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, atomically rewritten on every change.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, ClientError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                ClientError::Decode(format!("token store {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(values)
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        // Replace the file in one rename so an interrupted write leaves the
        // previous contents intact.
        let partial = self.partial_path();
        tokio::fs::write(&partial, raw).await?;
        if let Err(e) = tokio::fs::rename(&partial, &self.path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".partial");
        PathBuf::from(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);

        store.set(AUTH_TOKEN_KEY, "abc").await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("abc"));

        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("client.json");

        let store = FileTokenStore::new(&path);
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        store.set(AUTH_TOKEN_KEY, "tok-1").await.unwrap();
        store.set("theme", "dark").await.unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(
            reopened.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok-1")
        );

        reopened.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn interrupted_write_keeps_previous_token() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        let store = FileTokenStore::new(&path);
        store.set(AUTH_TOKEN_KEY, "tok-1").await.unwrap();
        assert!(!tmp.path().join("client.json.partial").exists());

        // A half-written replacement left behind by a killed process.
        tokio::fs::write(tmp.path().join("client.json.partial"), b"{\"authTo")
            .await
            .unwrap();
        let reopened = FileTokenStore::new(&path);
        assert_eq!(
            reopened.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok-1")
        );

        reopened.set(AUTH_TOKEN_KEY, "tok-2").await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok-2"));
        assert!(!tmp.path().join("client.json.partial").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.get(AUTH_TOKEN_KEY).await,
            Err(ClientError::Decode(_))
        ));
    }
}
