use std::path::PathBuf;

use async_trait::async_trait;

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, filename: &str, content_type: &str, bytes: &[u8])
    -> anyhow::Result<StoredImage>;
}

/// Writes into a directory served under `/uploads`.
pub struct LocalImageStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredImage> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(filename), bytes).await?;
        tracing::debug!(filename, content_type, size = bytes.len(), "image stored");
        Ok(StoredImage {
            url: format!("{}/{}", self.public_prefix.trim_end_matches('/'), filename),
            filename: filename.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_store_writes_file_and_builds_url() {
        let dir = std::env::temp_dir().join(format!("storefront-upload-{}", uuid::Uuid::new_v4()));
        let store = LocalImageStore::new(&dir, "http://localhost:3000/uploads/");

        let stored = store.put("abc.png", "image/png", b"\x89PNG").await.unwrap();
        assert_eq!(stored.url, "http://localhost:3000/uploads/abc.png");
        assert_eq!(tokio::fs::read(dir.join("abc.png")).await.unwrap(), b"\x89PNG");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
