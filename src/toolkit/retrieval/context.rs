

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::rerank::{rerank_passages, Reranker, RetrievedPassage};
use super::store::{search_with_retry, DocumentStore};
use crate::core::error::{AdvisorError, Result};
use crate::utils::bound_chars;


#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub passages: Vec<RetrievedPassage>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Retrieve wide with the store, rerank narrow with the cross-scorer, join what is kept.
pub struct ContextAssembler {
    reranker: Arc<dyn Reranker>,
    max_context_chars: usize,
}

impl ContextAssembler {
    pub fn new(reranker: Arc<dyn Reranker>) -> Self {
        Self {
            reranker,
            max_context_chars: 0,
        }
    }

    #[must_use]
    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    pub fn reranker(&self) -> &Arc<dyn Reranker> {
        &self.reranker
    }

    pub async fn build_context(
        &self,
        store: &dyn DocumentStore,
        question: &str,
        k_retrieve: usize,
        k_keep: usize,
    ) -> Result<AssembledContext> {
        let candidates = search_with_retry(store, question, k_retrieve)
            .await
            .map_err(|e| AdvisorError::retrieval(store.corpus(), e.to_string()))?;
        let retrieved = candidates.len();

        let passages = rerank_passages(self.reranker.as_ref(), question, candidates, k_keep).await;
        let joined = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = bound_chars(joined, self.max_context_chars);

        debug!(
            "Context for '{}': retrieved={}, kept={}, chars={}",
            crate::safe_truncate(question, 50),
            retrieved,
            passages.len(),
            text.chars().count()
        );

        Ok(AssembledContext { text, passages })
    }
}
