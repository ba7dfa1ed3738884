use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};

use super::{encode_wallets, Version, WalletStore};
use crate::{error::StoreError, wallet::WalletRecord};

/// Wallet list in a local JSON file.
///
/// There is no version to compare against, concurrent writers overwrite each other. Writes are
/// serialized so the last one leaves a whole list behind.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl WalletStore for FileStore {
    async fn read(&self) -> Result<(Vec<WalletRecord>, Version), StoreError> {
        if !fs::try_exists(&self.path).await? {
            info!(path = %self.path.display(), "wallet file missing, creating an empty one");
            fs::write(&self.path, "[]").await?;
            return Ok((Vec::new(), Version::Unversioned));
        }

        let data = fs::read_to_string(&self.path).await?;
        let wallets = serde_json::from_str(&data)?;
        Ok((wallets, Version::Unversioned))
    }

    async fn write(
        &self,
        wallets: &[WalletRecord],
        _version: &Version,
        message: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        // Write then rename so a concurrent reader never sees half a file.
        let temp = self.temp_path();
        fs::write(&temp, encode_wallets(wallets)?).await?;
        fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), wallets = wallets.len(), message, "wrote wallet file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::test_wallet;

    #[tokio::test]
    async fn test_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let store = FileStore::new(&path);

        let (wallets, version) = store.read().await.unwrap();

        assert!(wallets.is_empty());
        assert_eq!(version, Version::Unversioned);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let store = FileStore::new(&path);
        let wallets = vec![
            test_wallet("0xABC", "base", "G1"),
            test_wallet("f1abc", "filecoin", "G2"),
        ];

        store
            .write(&wallets, &Version::Unversioned, "Add wallet")
            .await
            .unwrap();
        let (read, _) = store.read().await.unwrap();

        assert_eq!(read, wallets);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n  {"));
        assert!(!dir.path().join("wallets.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_a_whole_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path().join("wallets.json")));
        let long: Vec<WalletRecord> = (0..200)
            .map(|i| test_wallet(&format!("0x{:040x}", i), "base", "G1"))
            .collect();
        let short = vec![test_wallet("0x1", "base", "G1")];

        for _ in 0..20 {
            let writes = (0..8).map(|i| {
                let store = store.clone();
                let wallets = if i % 2 == 0 { long.clone() } else { short.clone() };
                tokio::spawn(async move {
                    store
                        .write(&wallets, &Version::Unversioned, "concurrent")
                        .await
                })
            });
            for result in futures::future::join_all(writes).await {
                result.unwrap().unwrap();
            }

            let (read, _) = store.read().await.unwrap();
            assert!(read == long || read == short);
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = FileStore::new(&path).read().await;

        assert!(matches!(result, Err(StoreError::Decode(_))));
    }
}
