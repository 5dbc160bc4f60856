

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::similarity::cosine_similarity;
use crate::llm::embeddings::{Embedder, EmbeddingError};


#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Corpus '{name}' not found at {}", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("Corpus '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Corpus '{0}' does not support merging")]
    MergeUnsupported(String),

    #[error("Cannot merge '{source_corpus}' (dim {source_dim}) into '{target_corpus}' (dim {target_dim})")]
    DimensionMismatch {
        target_corpus: String,
        target_dim: usize,
        source_corpus: String,
        source_dim: usize,
    },

    #[error("Corpus '{corpus}' holds {store_dim}-dim vectors but the embedder produces {embedder_dim}")]
    EmbedderMismatch {
        corpus: String,
        store_dim: usize,
        embedder_dim: usize,
    },

    #[error("Backend error in corpus '{corpus}': {message}")]
    Backend {
        corpus: String,
        message: String,
        transient: bool,
    },

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { transient, .. } => *transient,
            Self::Embedding(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// One persisted passage with its embedding, as written by the corpus builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPassage {
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub score: f32,
    pub source: Option<String>,
}

/// A similarity-searchable corpus. Stores are read-only once shared; merging is
/// an explicit capability checked at startup.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn corpus(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` passages, best first. An empty query returns up to `k` passages in
    /// storage order.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Passage>, StoreError>;

    fn supports_merge(&self) -> bool {
        false
    }

    /// Absorbs every passage of `source` into `self`. `source` is consumed.
    fn merge_from(&mut self, source: Box<dyn DocumentStore>) -> Result<(), StoreError> {
        let _ = source;
        Err(StoreError::MergeUnsupported(self.corpus().to_string()))
    }

    fn into_passages(self: Box<Self>) -> Option<Vec<StoredPassage>> {
        None
    }
}


pub struct LocalStore {
    corpus: String,
    passages: Vec<StoredPassage>,
    dimensions: Option<usize>,
    merged_from: Vec<String>,
    embedder: Arc<dyn Embedder>,
}

impl LocalStore {
    pub fn new(
        corpus: impl Into<String>,
        passages: Vec<StoredPassage>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let corpus = corpus.into();
        let dimensions = passages.first().map(|p| p.embedding.len());

        if let Some(dim) = dimensions {
            if dim == 0 {
                return Err(StoreError::Malformed {
                    name: corpus,
                    reason: "empty embedding".to_string(),
                });
            }
            if let Some((idx, bad)) = passages
                .iter()
                .enumerate()
                .find(|(_, p)| p.embedding.len() != dim)
            {
                return Err(StoreError::Malformed {
                    reason: format!(
                        "passage {} has dimension {}, expected {}",
                        idx,
                        bad.embedding.len(),
                        dim
                    ),
                    name: corpus,
                });
            }
        }

        Ok(Self {
            corpus,
            passages,
            dimensions,
            merged_from: Vec::new(),
            embedder,
        })
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    
    pub fn merged_from(&self) -> &[String] {
        &self.merged_from
    }

    pub fn passages(&self) -> &[StoredPassage] {
        &self.passages
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    fn corpus(&self) -> &str {
        &self.corpus
    }

    fn len(&self) -> usize {
        self.passages.len()
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Passage>, StoreError> {
        if query.trim().is_empty() {
            return Ok(self
                .passages
                .iter()
                .take(k)
                .map(|p| Passage {
                    text: p.text.clone(),
                    score: 0.0,
                    source: p.source.clone(),
                })
                .collect());
        }

        let query_embedding = self.embedder.embed(query).await?;
        if let Some(dim) = self.dimensions {
            if query_embedding.len() != dim {
                return Err(StoreError::EmbedderMismatch {
                    corpus: self.corpus.clone(),
                    store_dim: dim,
                    embedder_dim: query_embedding.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &StoredPassage)> = self
            .passages
            .iter()
            .map(|p| (cosine_similarity(&query_embedding, &p.embedding), p))
            .collect();
        scored.sort_by(|a, b| rank_key(b.0).total_cmp(&rank_key(a.0)));

        debug!(
            "Similarity search in '{}': {} candidates, returning {}",
            self.corpus,
            scored.len(),
            k.min(scored.len())
        );

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, p)| Passage {
                text: p.text.clone(),
                score,
                source: p.source.clone(),
            })
            .collect())
    }

    fn supports_merge(&self) -> bool {
        true
    }

    fn merge_from(&mut self, source: Box<dyn DocumentStore>) -> Result<(), StoreError> {
        let source_corpus = source.corpus().to_string();
        let incoming = source
            .into_passages()
            .ok_or_else(|| StoreError::MergeUnsupported(source_corpus.clone()))?;

        let source_dim = incoming.first().map(|p| p.embedding.len());
        if let (Some(target_dim), Some(source_dim)) = (self.dimensions, source_dim) {
            if target_dim != source_dim {
                return Err(StoreError::DimensionMismatch {
                    target_corpus: self.corpus.clone(),
                    target_dim,
                    source_corpus,
                    source_dim,
                });
            }
        }

        let absorbed = incoming.len();
        self.passages.extend(incoming);
        self.dimensions = self.dimensions.or(source_dim);
        self.merged_from.push(source_corpus.clone());

        debug!(
            "Merged {} passages from '{}' into '{}' (now {})",
            absorbed,
            source_corpus,
            self.corpus,
            self.passages.len()
        );
        Ok(())
    }

    fn into_passages(self: Box<Self>) -> Option<Vec<StoredPassage>> {
        Some(self.passages)
    }
}

/// Sort key for scores: NaN ranks below every real score.
pub(crate) fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Runs a similarity search, retrying exactly once when the failure is transient.
pub async fn search_with_retry(
    store: &dyn DocumentStore,
    query: &str,
    k: usize,
) -> Result<Vec<Passage>, StoreError> {
    match store.similarity_search(query, k).await {
        Err(e) if e.is_transient() => {
            warn!(
                "Transient retrieval failure in '{}', retrying once: {}",
                store.corpus(),
                e
            );
            store.similarity_search(query, k).await
        }
        other => other,
    }
}
