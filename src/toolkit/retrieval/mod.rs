

pub mod context;
pub mod loader;
pub mod rerank;
pub mod similarity;
pub mod store;

pub use context::{AssembledContext, ContextAssembler};
pub use loader::{write_corpus, DiskStoreLoader, StoreLoader};
pub use rerank::{rerank_passages, HttpReranker, LexicalReranker, Reranker, RetrievedPassage};
pub use store::{DocumentStore, LocalStore, Passage, StoreError, StoredPassage};
