//! Blob storage: one file per blob under a root directory, named by a uuid key.

use std::{io::ErrorKind, path::PathBuf};

use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::types::AppError;

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub key: String,
    pub size: u64,
}

/// An in-progress blob. Chunks are appended with [`BlobWriter::write`]; the blob is
/// complete after [`BlobWriter::finish`] and removed again by [`BlobWriter::abort`].
pub struct BlobWriter {
    key: String,
    path: PathBuf,
    file: fs::File,
    size: u64,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            tracing::error!("error creating blob directory {:?}: {:?}", self.root, e);
            AppError::StorageError
        })
    }

    fn path(&self, key: &str) -> Result<PathBuf, AppError> {
        let key = Uuid::parse_str(key).map_err(|_| AppError::NotFound)?;
        Ok(self.root.join(key.hyphenated().to_string()))
    }

    pub async fn writer(&self) -> Result<BlobWriter, AppError> {
        let key = Uuid::new_v4().to_string();
        let path = self.path(&key)?;
        let file = fs::File::create(&path).await.map_err(|e| {
            tracing::error!("error creating blob {:?}: {:?}", path, e);
            AppError::StorageError
        })?;
        Ok(BlobWriter {
            key,
            path,
            file,
            size: 0,
        })
    }

    pub async fn put(&self, bytes: &[u8]) -> Result<StoredBlob, AppError> {
        let mut writer = self.writer().await?;
        if let Err(e) = writer.write(bytes).await {
            writer.abort().await;
            return Err(e);
        }
        writer.finish().await
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path(key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AppError::NotFound
            } else {
                tracing::error!("error reading blob {}: {:?}", key, e);
                AppError::StorageError
            }
        })
    }

    /// Removes a blob. A blob that is already gone is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("blob {} already deleted", key);
                Ok(())
            }
            Err(e) => {
                tracing::error!("error deleting blob {}: {:?}", key, e);
                Err(AppError::StorageError)
            }
        }
    }
}

impl BlobWriter {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), AppError> {
        self.file.write_all(chunk).await.map_err(|e| {
            tracing::error!("error writing blob {}: {:?}", self.key, e);
            AppError::StorageError
        })?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredBlob, AppError> {
        if let Err(e) = self.file.flush().await {
            tracing::error!("error flushing blob {}: {:?}", self.key, e);
            self.abort().await;
            return Err(AppError::StorageError);
        }
        Ok(StoredBlob {
            key: self.key,
            size: self.size,
        })
    }

    pub async fn abort(self) {
        let Self { key, path, file, .. } = self;
        drop(file);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("error removing aborted blob {}: {:?}", key, e);
        }
    }
}

#[cfg(test)]
pub(crate) async fn blob_count(store: &BlobStore) -> usize {
    let mut entries = fs::read_dir(&store.root).await.unwrap();
    let mut count = 0;
    while entries.next_entry().await.unwrap().is_some() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A store under a fresh temp directory, removed again on drop.
    struct TempStore(BlobStore);

    impl std::ops::Deref for TempStore {
        type Target = BlobStore;

        fn deref(&self) -> &BlobStore {
            &self.0
        }
    }

    impl Drop for TempStore {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.0.root).ok();
        }
    }

    async fn store() -> TempStore {
        let root = std::env::temp_dir().join(format!("blobs-{}", Uuid::new_v4()));
        let store = BlobStore::new(root);
        store.ensure_root().await.unwrap();
        TempStore(store)
    }

    #[tokio::test]
    async fn temp_store_is_removed() {
        let store = store().await;
        let root = store.root.clone();
        store.put(b"x").await.unwrap();
        drop(store);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn put_get_delete() -> anyhow::Result<()> {
        let store = store().await;
        let blob = store.put(b"hello blob").await?;
        assert_eq!(blob.size, 10);
        assert_eq!(store.get(&blob.key).await?, b"hello blob".to_vec());
        store.delete(&blob.key).await?;
        assert_eq!(store.get(&blob.key).await.unwrap_err(), AppError::NotFound);
        // second delete is a no-op
        store.delete(&blob.key).await?;
        Ok(())
    }

    #[tokio::test]
    async fn chunked_writes_accumulate() -> anyhow::Result<()> {
        let store = store().await;
        let mut writer = store.writer().await?;
        writer.write(b"abc").await?;
        writer.write(b"defg").await?;
        assert_eq!(writer.size(), 7);
        let blob = writer.finish().await?;
        assert_eq!(store.get(&blob.key).await?, b"abcdefg".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn aborted_writer_leaves_nothing() -> anyhow::Result<()> {
        let store = store().await;
        let mut writer = store.writer().await?;
        writer.write(b"partial").await?;
        writer.abort().await;
        assert_eq!(blob_count(&store).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn keys_must_be_uuids() {
        let store = store().await;
        assert_eq!(
            store.get("../etc/passwd").await.unwrap_err(),
            AppError::NotFound
        );
        assert_eq!(store.delete("nope").await.unwrap_err(), AppError::NotFound);
    }
}
