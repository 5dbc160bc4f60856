

use std::sync::Arc;

use tracing::info;

use super::embeddings::{Embedder, EmbeddingGenerator, HashingEmbedder};
use super::providers::{
    LlmProvider, LlmProviderWithFallback, OllamaProvider, OpenAiCompatProvider,
};
use super::providers::openai::DEFAULT_OPENAI_BASE_URL;
use crate::core::config::AdvisorConfig;
use crate::core::error::{AdvisorError, Result};
use crate::toolkit::retrieval::rerank::{HttpReranker, LexicalReranker, Reranker};
use crate::DEFAULT_OLLAMA_URL;


pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Arc<dyn LlmProvider>> {
        match provider {
            "openai" => Ok(Arc::new(OpenAiCompatProvider::new(
                api_key.map(String::from),
                base_url.unwrap_or(DEFAULT_OPENAI_BASE_URL),
                model,
                timeout_secs,
            ))),
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                timeout_secs,
            ))),
            other => Err(AdvisorError::Config(format!(
                "Unknown LLM provider: {other}. Supported: openai, ollama"
            ))),
        }
    }

    /// Primary provider from config, wrapped with the local Ollama fallback when enabled.
    pub fn from_config(config: &AdvisorConfig) -> Result<Arc<dyn LlmProvider>> {
        let primary = Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            config.timeout,
        )?;

        if !config.llm_fallback_enabled {
            return Ok(primary);
        }

        let fallback: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(
            config.llm_fallback_url.as_str(),
            config.llm_fallback_model.as_str(),
            config.timeout,
        ));
        Ok(Arc::new(LlmProviderWithFallback::new(primary, Some(fallback))))
    }
}


pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn from_config(config: &AdvisorConfig) -> Result<Arc<dyn Embedder>> {
        match config.embedding_provider.as_str() {
            "ollama" | "openai" => Ok(Arc::new(EmbeddingGenerator::new(
                config.embedding_provider.as_str(),
                config.embedding_url.as_str(),
                config.embedding_model.as_str(),
                config.embedding_api_key.clone(),
                config.timeout,
                config.embedding_cache_size,
            ))),
            "hashing" => {
                info!(
                    "Using offline hashing embedder ({} dimensions)",
                    config.embedding_dimensions
                );
                Ok(Arc::new(HashingEmbedder::new(config.embedding_dimensions)))
            }
            other => Err(AdvisorError::Config(format!(
                "Unknown embedding provider: {other}. Supported: ollama, openai, hashing"
            ))),
        }
    }
}


pub struct RerankerFactory;

impl RerankerFactory {
    pub fn from_config(config: &AdvisorConfig) -> Result<Arc<dyn Reranker>> {
        match config.reranker_provider.as_str() {
            "http" => Ok(Arc::new(HttpReranker::new(
                config.reranker_url.as_str(),
                config.reranker_model.as_str(),
                config.timeout,
            ))),
            "lexical" => Ok(Arc::new(LexicalReranker)),
            other => Err(AdvisorError::Config(format!(
                "Unknown reranker: {other}. Supported: http, lexical"
            ))),
        }
    }
}
