

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::store::{DocumentStore, LocalStore, StoreError, StoredPassage};
use crate::llm::embeddings::Embedder;

pub const STORE_FILE: &str = "store.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    passages: Vec<StoredPassage>,
}

/// Produces a fresh, independently owned store per call; merging into one copy
/// never affects another.
#[async_trait]
pub trait StoreLoader: Send + Sync {
    async fn load(&self, corpus: &str) -> Result<Box<dyn DocumentStore>, StoreError>;
}

/// Reads `<root>/<corpus>/store.json` as produced by the offline corpus builder.
pub struct DiskStoreLoader {
    root: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl DiskStoreLoader {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            root: root.into(),
            embedder,
        }
    }

    pub fn corpus_file(&self, corpus: &str) -> PathBuf {
        self.root.join(corpus).join(STORE_FILE)
    }
}

#[async_trait]
impl StoreLoader for DiskStoreLoader {
    async fn load(&self, corpus: &str) -> Result<Box<dyn DocumentStore>, StoreError> {
        let path = self.corpus_file(corpus);
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound {
                name: corpus.to_string(),
                path,
            });
        }

        let raw = tokio::fs::read(&path).await?;
        let file: StoreFile = serde_json::from_slice(&raw).map_err(|e| StoreError::Malformed {
            name: corpus.to_string(),
            reason: e.to_string(),
        })?;

        let store = LocalStore::new(corpus, file.passages, Arc::clone(&self.embedder))?;
        if let (Some(store_dim), Some(embedder_dim)) =
            (store.dimensions(), self.embedder.output_dimensions())
        {
            if store_dim != embedder_dim {
                return Err(StoreError::EmbedderMismatch {
                    corpus: corpus.to_string(),
                    store_dim,
                    embedder_dim,
                });
            }
        }
        info!(
            "Loaded corpus '{}' from {} ({} passages, dim={:?}, embedder={})",
            corpus,
            path.display(),
            store.len(),
            store.dimensions(),
            self.embedder.name()
        );
        Ok(Box::new(store))
    }
}

/// Writes a corpus in the layout [`DiskStoreLoader`] reads.
pub async fn write_corpus(
    root: &Path,
    corpus: &str,
    passages: Vec<StoredPassage>,
) -> Result<PathBuf, StoreError> {
    let dir = root.join(corpus);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(STORE_FILE);
    let body = serde_json::to_vec(&StoreFile { passages })?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}
