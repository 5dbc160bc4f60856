

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{AdvisorError, Result};
use crate::llm::providers::GenerationParams;

const ENV_PREFIX: &str = "ESRSGEN";


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    
    pub vectorstore_root: PathBuf,
    pub taxonomy_corpus: String,
    pub default_corpus: String,
    pub sector_table_path: PathBuf,

    
    pub classify_top_k: usize,
    pub classify_attempts: u32,
    pub retrieve_k: usize,
    pub keep_k: usize,
    pub max_context_chars: usize,
    pub generate_titles: bool,

    
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f32,
    pub llm_top_p: f32,
    pub llm_max_tokens: u32,
    pub llm_frequency_penalty: f32,
    pub llm_presence_penalty: f32,
    pub llm_context_window: Option<u32>,

    
    pub llm_fallback_enabled: bool,
    pub llm_fallback_url: String,
    pub llm_fallback_model: String,

    
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: usize,
    pub embedding_cache_size: usize,

    
    pub reranker_provider: String,
    pub reranker_model: String,
    pub reranker_url: String,

    pub timeout: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            vectorstore_root: PathBuf::from("vectorstores"),
            taxonomy_corpus: "nace_db".to_string(),
            default_corpus: "default_db".to_string(),
            sector_table_path: PathBuf::from("sector_classification.json"),

            classify_top_k: 3,
            classify_attempts: 1,
            retrieve_k: 10,
            keep_k: 5,
            max_context_chars: 0,
            generate_titles: true,

            llm_provider: "openai".to_string(),
            llm_model: "nvidia/llama-3.3-nemotron-super-49b-v1".to_string(),
            llm_api_key: None,
            llm_base_url: Some("https://integrate.api.nvidia.com/v1".to_string()),
            llm_temperature: 0.0,
            llm_top_p: 0.1,
            llm_max_tokens: 4096,
            llm_frequency_penalty: 0.1,
            llm_presence_penalty: 0.0,
            llm_context_window: None,

            llm_fallback_enabled: false,
            llm_fallback_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            llm_fallback_model: "llama3.2:1b".to_string(),

            embedding_provider: "ollama".to_string(),
            embedding_model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,
            embedding_dimensions: 384,
            embedding_cache_size: crate::DEFAULT_CACHE_SIZE,

            reranker_provider: "http".to_string(),
            reranker_model: crate::DEFAULT_RERANKER_MODEL.to_string(),
            reranker_url: "http://localhost:8080".to_string(),

            timeout: 60,
        }
    }
}

impl AdvisorConfig {
    /// Defaults, then the optional TOML file, then `ESRSGEN_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(AdvisorError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let loaded: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        info!(
            "Config loaded: llm={}/{}, embeddings={}, reranker={}, corpora={}",
            loaded.llm_provider,
            loaded.llm_model,
            loaded.embedding_provider,
            loaded.reranker_provider,
            loaded.vectorstore_root.display()
        );
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classify_top_k == 0 {
            return Err(AdvisorError::Config("classify_top_k must be at least 1".into()));
        }
        if self.classify_attempts == 0 {
            return Err(AdvisorError::Config("classify_attempts must be at least 1".into()));
        }
        if self.keep_k == 0 || self.retrieve_k < self.keep_k {
            return Err(AdvisorError::Config(format!(
                "retrieve_k ({}) must be >= keep_k ({}) and keep_k >= 1",
                self.retrieve_k, self.keep_k
            )));
        }
        if self.taxonomy_corpus.trim().is_empty() || self.default_corpus.trim().is_empty() {
            return Err(AdvisorError::Config("corpus names must not be empty".into()));
        }

        let mut urls = vec![
            ("llm_fallback_url", self.llm_fallback_url.as_str()),
            ("embedding_url", self.embedding_url.as_str()),
            ("reranker_url", self.reranker_url.as_str()),
        ];
        if let Some(base) = self.llm_base_url.as_deref() {
            urls.push(("llm_base_url", base));
        }
        for (field, value) in urls {
            url::Url::parse(value)
                .map_err(|e| AdvisorError::Config(format!("{field} is not a valid URL ({value}): {e}")))?;
        }
        Ok(())
    }

    
    pub fn answer_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.llm_temperature,
            top_p: self.llm_top_p,
            max_tokens: self.llm_max_tokens,
            frequency_penalty: self.llm_frequency_penalty,
            presence_penalty: self.llm_presence_penalty,
            context_window: self.llm_context_window,
        }
    }

    /// Classification always runs at zero temperature with a short reply budget.
    pub fn classification_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: 0.0,
            max_tokens: 64,
            ..self.answer_params()
        }
    }

    pub fn title_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: 32,
            ..self.answer_params()
        }
    }

    pub fn corpus_path(&self, corpus: &str) -> PathBuf {
        self.vectorstore_root.join(corpus)
    }
}
