

pub mod embeddings;
pub mod factory;
pub mod gateway;
pub mod prompt;
pub mod providers;

pub use embeddings::{Embedder, EmbeddingGenerator, HashingEmbedder};
pub use factory::{EmbeddingProviderFactory, LlmProviderFactory, RerankerFactory};
pub use gateway::{Completion, LlmGateway, FALLBACK_REPLY};
