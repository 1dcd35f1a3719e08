//! Local filesystem asset backend.
//!
//! Category images are referenced by `file://` urls under a base directory.
//! Deletion is the only operation the engine consumes; uploads belong to the
//! admin layer.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::AssetStore;

pub struct LocalAssetStore {
    base_path: PathBuf,
}

impl LocalAssetStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a `file://` url to a path under the base directory.
    fn path_from_url(&self, url: &str) -> Result<PathBuf> {
        let raw = url
            .strip_prefix("file://")
            .ok_or_else(|| anyhow!("expected file:// url, got {url}"))?;
        let path = Path::new(raw);
        let relative = path.strip_prefix("/").unwrap_or(path);
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn delete_asset(&self, url: &str) -> Result<()> {
        let path = self.path_from_url(url)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to remove asset {}", path.display()))?;
        debug!(asset = %path.display(), "asset removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_file_urls() {
        let store = LocalAssetStore::new("/var/assets");
        assert!(store.path_from_url("https://cdn/img.png").is_err());
    }

    #[test]
    fn resolves_under_base_path() {
        let store = LocalAssetStore::new("/var/assets");
        let path = store
            .path_from_url("file:///categories/root/leaf.png")
            .expect("file url");
        assert_eq!(path, PathBuf::from("/var/assets/categories/root/leaf.png"));
    }
}
