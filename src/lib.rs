

pub mod core;
pub mod llm;
pub mod toolkit;
pub mod utils;

#[cfg(test)]
mod testing;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use core::advisor::{AdvisorComponents, ChatReply, ClassificationMetadata, EsrsAdvisor};
pub use core::config::AdvisorConfig;
pub use core::error::{AdvisorError, Result};
pub use llm::embeddings::EmbeddingGenerator;
pub use toolkit::conversation::SessionState;
pub use toolkit::sector::{ReportingGroup, SpecialGroup, TaxonomyCode};


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";


pub const DEFAULT_RERANKER_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L6-v2";


pub const DEFAULT_CACHE_SIZE: usize = 1000;
