//! Local image storage
//!
//! Maps an image's public URL to its on-disk location by swapping the public
//! base URL for the storage root, then overwrites the original file with the
//! transformed bytes. The mapping is deterministic; anything that does not
//! sit under the public base, or that would escape the root, is rejected.

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Result};
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::domain::error::ReplaceError;

#[derive(Clone)]
pub struct LocalImageStore {
    public_base: Url,
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(public_base_url: &str, storage_root: PathBuf) -> Result<Self> {
        let public_base = Url::parse(public_base_url)
            .map_err(|e| anyhow!("Invalid public base URL {}: {}", public_base_url, e))?;
        Ok(Self {
            public_base,
            root: storage_root,
        })
    }

    /// Resolve a public source URL to its path under the storage root.
    pub fn resolve(&self, source_url: &str) -> Result<PathBuf, ReplaceError> {
        let url = Url::parse(source_url)
            .map_err(|_| ReplaceError::PathOutsideRoot(source_url.to_string()))?;

        if url.scheme() != self.public_base.scheme() || url.host() != self.public_base.host() {
            return Err(ReplaceError::PathOutsideRoot(source_url.to_string()));
        }

        let base_path = self.public_base.path().trim_end_matches('/');
        let remainder = url
            .path()
            .strip_prefix(base_path)
            .ok_or_else(|| ReplaceError::PathOutsideRoot(source_url.to_string()))?;

        // "/mediaxyz" must not match a base of "/media".
        if !remainder.starts_with('/') {
            return Err(ReplaceError::PathOutsideRoot(source_url.to_string()));
        }
        let rel = remainder.trim_start_matches('/');

        if rel.is_empty() || !is_clean_relative(Path::new(rel)) {
            return Err(ReplaceError::PathOutsideRoot(source_url.to_string()));
        }

        Ok(self.root.join(rel))
    }

    /// Overwrite the stored original with the transformed bytes.
    pub async fn overwrite(&self, source_url: &str, bytes: &[u8]) -> Result<PathBuf, ReplaceError> {
        let path = self.resolve(source_url)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ReplaceError::Storage(e.to_string()))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| ReplaceError::Storage(e.to_string()))?;

        debug!(path = %path.display(), len = bytes.len(), "stored transformed image");
        Ok(path)
    }
}

fn is_clean_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> LocalImageStore {
        LocalImageStore::new("https://shop.example.com/media", root.to_path_buf()).unwrap()
    }

    #[test]
    fn resolves_under_the_storage_root() {
        let store = store(Path::new("/var/www/media"));
        let path = store
            .resolve("https://shop.example.com/media/products/42/front.jpg")
            .unwrap();
        assert_eq!(path, PathBuf::from("/var/www/media/products/42/front.jpg"));
    }

    #[test]
    fn rejects_foreign_hosts_and_traversal() {
        let store = store(Path::new("/var/www/media"));

        assert!(store
            .resolve("https://evil.example.com/media/a.jpg")
            .is_err());
        assert!(store
            .resolve("https://shop.example.com/other/a.jpg")
            .is_err());
        assert!(store
            .resolve("https://shop.example.com/mediaxyz/a.jpg")
            .is_err());
        assert!(store
            .resolve("https://shop.example.com/media/../etc/passwd")
            .is_err());
        assert!(store.resolve("not a url").is_err());
    }

    #[tokio::test]
    async fn overwrite_creates_parents_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let url = "https://shop.example.com/media/products/1/a.jpg";
        store.overwrite(url, b"old").await.unwrap();
        let path = store.overwrite(url, b"new").await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }
}
