//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::embeddings::HashingEmbedder;
use crate::llm::providers::{GenerationParams, LlmMetadata, LlmProvider, LlmProviderError};
use crate::toolkit::retrieval::loader::StoreLoader;
use crate::toolkit::retrieval::rerank::{RerankError, Reranker};
use crate::toolkit::retrieval::store::{DocumentStore, LocalStore, Passage, StoreError, StoredPassage};
use crate::toolkit::sector::groups::ReportingGroupTable;

pub const TEST_DIMENSIONS: usize = 256;

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;

enum Script {
    Replies(Vec<String>),
    Respond(Responder),
    Fail,
}

/// LLM provider that replays canned replies and records every request.
pub struct ScriptedProvider {
    name: String,
    script: Script,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    system_prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedProvider {
    fn with_script(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            system_prompts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    /// Replies in order, repeating the last one once exhausted.
    pub fn replying<I, S>(name: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        assert!(!replies.is_empty(), "scripted provider needs at least one reply");
        Self::with_script(name, Script::Replies(replies))
    }

    /// Computes each reply from the user prompt.
    pub fn responding<F>(name: &str, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::with_script(name, Script::Respond(Box::new(respond)))
    }

    pub fn failing(name: &str) -> Self {
        Self::with_script(name, Script::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn system_prompts(&self) -> Vec<String> {
        self.system_prompts.lock().clone()
    }

    pub fn params(&self) -> Vec<GenerationParams> {
        self.params.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(user_prompt.to_string());
        self.system_prompts.lock().push(system_prompt.to_string());
        self.params.lock().push(*params);

        let reply = match &self.script {
            Script::Replies(replies) => replies[index.min(replies.len() - 1)].clone(),
            Script::Respond(respond) => respond(user_prompt),
            Script::Fail => {
                return Err(LlmProviderError::Provider(format!("{} is down", self.name)));
            }
        };

        let metadata = LlmMetadata {
            provider: self.name.clone(),
            model: "scripted".to_string(),
            ..Default::default()
        };
        Ok((reply, metadata))
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn local_store(corpus: &str, texts: &[&str]) -> LocalStore {
    let embedder = HashingEmbedder::new(TEST_DIMENSIONS);
    let passages = texts
        .iter()
        .map(|text| StoredPassage {
            text: text.to_string(),
            embedding: embedder.embed_sync(text),
            source: Some(corpus.to_string()),
        })
        .collect();
    match LocalStore::new(corpus, passages, Arc::new(embedder)) {
        Ok(store) => store,
        Err(e) => panic!("fixture store {corpus} is invalid: {e}"),
    }
}

/// Store that fails a fixed number of times before answering with one passage.
pub struct FlakyStore {
    corpus: String,
    remaining_failures: AtomicUsize,
    permanent: bool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(corpus: &str, failures: usize) -> Self {
        Self {
            corpus: corpus.to_string(),
            remaining_failures: AtomicUsize::new(failures),
            permanent: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn permanent(corpus: &str) -> Self {
        Self {
            permanent: true,
            ..Self::new(corpus, 0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn corpus(&self) -> &str {
        &self.corpus
    }

    fn len(&self) -> usize {
        1
    }

    async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent {
            return Err(StoreError::Backend {
                corpus: self.corpus.clone(),
                message: "index corrupted".to_string(),
                transient: false,
            });
        }

        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend {
                corpus: self.corpus.clone(),
                message: "connection reset".to_string(),
                transient: true,
            });
        }

        Ok(vec![Passage {
            text: "recovered passage".to_string(),
            score: 1.0,
            source: None,
        }])
    }
}

/// Reranker returning preset scores, cycled over the batch.
pub struct FixedReranker {
    scores: Vec<f32>,
}

impl FixedReranker {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

#[async_trait]
impl Reranker for FixedReranker {
    async fn score(&self, _query: &str, _passage: &str) -> Result<f32, RerankError> {
        self.scores
            .first()
            .copied()
            .ok_or_else(|| RerankError::InvalidResponse("no scores".to_string()))
    }

    async fn score_batch(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        Ok(self.scores.iter().copied().cycle().take(passages.len()).collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn score(&self, _query: &str, _passage: &str) -> Result<f32, RerankError> {
        Err(RerankError::InvalidResponse("model unavailable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Local store without the merge capability.
struct ReadOnlyStore(LocalStore);

#[async_trait]
impl DocumentStore for ReadOnlyStore {
    fn corpus(&self) -> &str {
        self.0.corpus()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Passage>, StoreError> {
        self.0.similarity_search(query, k).await
    }
}

/// In-memory loader; every load builds a fresh store.
#[derive(Default)]
pub struct MemoryStoreLoader {
    corpora: HashMap<String, Vec<String>>,
    unmergeable: HashSet<String>,
    failing: HashSet<String>,
}

impl MemoryStoreLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_corpus(mut self, corpus: &str, texts: &[&str]) -> Self {
        self.corpora.insert(
            corpus.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_unmergeable(mut self, corpus: &str) -> Self {
        self.unmergeable.insert(corpus.to_string());
        self
    }

    /// Every search on `corpus` fails with a transient error.
    #[must_use]
    pub fn with_failing(mut self, corpus: &str) -> Self {
        self.failing.insert(corpus.to_string());
        self
    }

    pub fn len_of(&self, corpus: &str) -> usize {
        self.corpora.get(corpus).map_or(0, Vec::len)
    }
}

#[async_trait]
impl StoreLoader for MemoryStoreLoader {
    async fn load(&self, corpus: &str) -> Result<Box<dyn DocumentStore>, StoreError> {
        if self.failing.contains(corpus) {
            return Ok(Box::new(FlakyStore::new(corpus, usize::MAX)));
        }
        let texts = self.corpora.get(corpus).ok_or_else(|| StoreError::NotFound {
            name: corpus.to_string(),
            path: PathBuf::from(corpus),
        })?;
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let store = local_store(corpus, &refs);

        if self.unmergeable.contains(corpus) {
            Ok(Box::new(ReadOnlyStore(store)))
        } else {
            Ok(Box::new(store))
        }
    }
}

/// All five corpora with distinct sizes.
pub fn fixture_loader() -> MemoryStoreLoader {
    MemoryStoreLoader::new()
        .with_corpus(
            "nace_db",
            &[
                "A01.1 Growing of non-perennial crops",
                "B05.1 Mining of hard coal",
                "B06.1 Extraction of crude petroleum from offshore and onshore wells",
                "B06.2 Extraction of natural gas",
                "C10.1 Processing and preserving of meat",
                "H49.4 Freight transport by road and removal services",
            ],
        )
        .with_corpus(
            "default_db",
            &[
                "ESRS 2 General disclosures apply to every undertaking",
                "ESRS E1 Climate change covers transition plans and GHG emissions",
                "ESRS S1 Own workforce covers working conditions",
                "ESRS G1 Business conduct covers corruption and bribery",
            ],
        )
        .with_corpus(
            "oil_gas_db",
            &[
                "Oil and gas undertakings disclose flaring and venting volumes",
                "Methane emissions from upstream production must be reported",
                "Decommissioning of offshore platforms is a material topic",
            ],
        )
        .with_corpus(
            "mining_db",
            &[
                "Mining undertakings disclose tailings facility safety",
                "Mine closure and rehabilitation plans are reported",
            ],
        )
        .with_corpus(
            "road_db",
            &["Road transport operators report fleet fuel consumption"],
        )
}

pub fn fixture_table() -> ReportingGroupTable {
    ReportingGroupTable::from_pairs([
        ("B05.1", "Mining, Quarrying and Coal"),
        ("B06.1", "Oil & Gas Company"),
        ("B06.2", "Oil & Gas Company"),
        ("H49.4", "Road Transport"),
    ])
}
