

use thiserror::Error;

use crate::llm::embeddings::EmbeddingError;
use crate::llm::providers::LlmProviderError;
use crate::toolkit::retrieval::store::StoreError;


#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(#[from] StoreError),

    #[error("Retrieval failed for corpus '{corpus}': {message}")]
    Retrieval { corpus: String, message: String },

    #[error("Sector table error: {0}")]
    SectorTable(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(#[from] LlmProviderError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    pub fn retrieval(corpus: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            corpus: corpus.into(),
            message: message.into(),
        }
    }

    /// Startup failures leave the advisor unusable; everything else is per call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Corpus(_) | Self::SectorTable(_) | Self::Io(_)
        )
    }
}

impl From<config::ConfigError> for AdvisorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}


pub type Result<T> = std::result::Result<T, AdvisorError>;
