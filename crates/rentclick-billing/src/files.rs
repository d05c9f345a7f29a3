//! Storage for uploaded images, identity documents and signatures

use crate::error::{RentalError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` under a unique key derived from `path` and return its public URL.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;

    /// Read back a stored file by key (the URL suffix after the base URL).
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// `vehicles/<id>/My Photo.JPG` -> `vehicles/<id>/<uuid>-My_Photo.JPG`
fn storage_key(path: &str) -> Result<String> {
    let path = path.trim_matches('/');
    let (dir, file_name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    let file_name: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if file_name.trim_matches('.').is_empty() {
        return Err(RentalError::invalid_input("File name is required"));
    }

    let unique = format!("{}-{}", Uuid::new_v4().simple(), file_name);
    let key = match dir {
        Some(dir) => format!("{}/{}", dir, unique),
        None => unique,
    };
    validate_key(&key)?;
    Ok(key)
}

fn validate_key(key: &str) -> Result<()> {
    let escapes = Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(RentalError::invalid_input(format!("Invalid file key: {}", key)));
    }
    Ok(())
}

fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Files on local disk under `root`, served from `public_base_url`
pub struct LocalFileStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let key = storage_key(path)?;
        let target = self.root.join(&key);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RentalError::FileStorage {
                    message: format!("failed to create {}: {}", parent.display(), e),
                })?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| RentalError::FileStorage {
                message: format!("failed to write {}: {}", target.display(), e),
            })?;

        debug!(key = %key, size = bytes.len(), "Stored file");
        Ok(public_url(&self.public_base_url, &key))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let target = self.root.join(key);
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RentalError::FileStorage {
                message: format!("failed to read {}: {}", target.display(), e),
            }),
        }
    }
}

/// Keeps files in memory; used by tests and the in-memory backend
pub struct MemoryFileStorage {
    public_base_url: String,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileStorage {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let key = storage_key(path)?;
        self.files.write().await.insert(key.clone(), bytes.to_vec());
        Ok(public_url(&self.public_base_url, &key))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.read().await.get(key).cloned())
    }
}
