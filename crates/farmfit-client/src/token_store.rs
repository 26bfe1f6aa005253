// File-backed token store
//
// Values for one scope live in `{dir}/{scope}.json` as a flat JSON object.
// Writes go to a sibling temp file that is renamed into place; on unix the
// file is created with mode 0600.

use async_trait::async_trait;
use farmfit_core::{Result, SyncError, TokenStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClientError;

pub const DEFAULT_SCOPE: &str = "credentials";

#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>, scope: &str) -> Result<Self> {
        if scope.is_empty() || scope.contains(['/', '\\']) || scope.starts_with('.') {
            return Err(SyncError::config(format!("invalid token scope: {:?}", scope)));
        }
        Ok(Self {
            path: dir.as_ref().join(format!("{}.json", scope)),
            lock: Mutex::new(()),
        })
    }

    /// Store under the default scope
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(dir, DEFAULT_SCOPE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> std::result::Result<BTreeMap<String, String>, ClientError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> std::result::Result<(), ClientError> {
        if values.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let bytes = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Token store written");
        Ok(())
    }
}

#[cfg(unix)]
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, bytes).await
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        Ok(self.save(&values).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
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
    async fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path()).unwrap();

        assert_eq!(store.get("access_token").await.unwrap(), None);

        store.set("access_token", "tok-1").await.unwrap();
        store.set("refresh_token", "ref-1").await.unwrap();
        assert_eq!(
            store.get("access_token").await.unwrap().as_deref(),
            Some("tok-1")
        );

        store.remove("access_token").await.unwrap();
        store.remove("access_token").await.unwrap();
        assert_eq!(store.get("access_token").await.unwrap(), None);
        assert_eq!(
            store.get("refresh_token").await.unwrap().as_deref(),
            Some("ref-1")
        );
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileTokenStore::in_dir(dir.path())
            .unwrap()
            .set("access_token", "tok-1")
            .await
            .unwrap();

        let reopened = FileTokenStore::in_dir(dir.path()).unwrap();
        assert_eq!(
            reopened.get("access_token").await.unwrap().as_deref(),
            Some("tok-1")
        );
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileTokenStore::new(dir.path(), "a").unwrap();
        let b = FileTokenStore::new(dir.path(), "b").unwrap();

        a.set("k", "1").await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_scope() {
        assert!(FileTokenStore::new("/tmp", "../etc").is_err());
        assert!(FileTokenStore::new("/tmp", "").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path()).unwrap();
        store.set("access_token", "secret").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_removing_last_key_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path()).unwrap();
        store.set("k", "v").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(!store.path().exists());
    }
}
