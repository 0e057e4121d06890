use crate::types::{CachedResponse, ResponseCache};
use anyhow::Context;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Process-local response store, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemoryResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn load(&self, url: &str) -> anyhow::Result<Option<CachedResponse>> {
        Ok(self.entries.read().await.get(url).cloned())
    }

    async fn save(&self, url: &str, response: &CachedResponse) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(url.to_string(), response.clone());
        Ok(())
    }
}

/// One JSON file per URL, named after the SHA-256 of the URL.
pub struct DiskResponseCache {
    dir: PathBuf,
}

impl DiskResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let key: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl ResponseCache for DiskResponseCache {
    async fn load(&self, url: &str) -> anyhow::Result<Option<CachedResponse>> {
        let path = self.path_for(url);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached response for {}", url);
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        match serde_json::from_slice::<CachedResponse>(&raw) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {} for {}: {}", path.display(), url, e);
                Ok(None)
            }
        }
    }

    async fn save(&self, url: &str, response: &CachedResponse) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.path_for(url);
        let json = serde_json::to_vec_pretty(response)?;

        // Write then rename so a crash never leaves a half-written entry
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming {}", tmp.display()))?;

        debug!("Cached response for {} at {}", url, path.display());
        Ok(())
    }
}
