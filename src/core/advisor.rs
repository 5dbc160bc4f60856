

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::AdvisorConfig;
use super::error::{AdvisorError, Result};
use crate::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory, RerankerFactory};
use crate::llm::gateway::LlmGateway;
use crate::llm::prompt::{build_answer_prompt, build_title_prompt};
use crate::llm::providers::LlmProvider;
use crate::toolkit::conversation::session::{CompanyProfile, ConversationSession, SessionState};
use crate::toolkit::retrieval::context::ContextAssembler;
use crate::toolkit::retrieval::loader::{DiskStoreLoader, StoreLoader};
use crate::toolkit::retrieval::rerank::{Reranker, RetrievedPassage};
use crate::toolkit::retrieval::store::DocumentStore;
use crate::toolkit::sector::classifier::SectorClassifier;
use crate::toolkit::sector::corpus::CorpusSelector;
use crate::toolkit::sector::groups::{ReportingGroup, ReportingGroupTable};
use crate::toolkit::sector::taxonomy::TaxonomyCode;
use crate::utils::{safe_truncate, safe_truncate_ellipsis};

const MAX_TITLE_CHARS: usize = 80;

pub fn welcome_message(code: &TaxonomyCode) -> String {
    format!(
        "Thank you for your company description. Based on my analysis, your company falls \
         under NACE sector {code}. How can I help you with your ESRS reporting requirements?"
    )
}


#[derive(Debug, Clone, Serialize)]
pub struct ClassificationMetadata {
    pub taxonomy_code: TaxonomyCode,
    pub reporting_group: ReportingGroup,
    pub corpus: String,
    pub corpus_passages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One reply at the session boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub reply: String,
    pub state: SessionState,
    /// Set when the reply is the fallback apology.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passages: Vec<RetrievedPassage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationMetadata>,
}

/// The pluggable collaborators; `from_config` builds the network-backed set.
pub struct AdvisorComponents {
    pub provider: Arc<dyn LlmProvider>,
    pub reranker: Arc<dyn Reranker>,
    pub loader: Arc<dyn StoreLoader>,
    pub table: ReportingGroupTable,
}

/// Classification, corpus routing and answering behind a session registry.
/// Only exists once every corpus has loaded and every merged store is built.
pub struct EsrsAdvisor {
    config: AdvisorConfig,
    classifier: SectorClassifier,
    selector: CorpusSelector,
    assembler: ContextAssembler,
    gateway: Arc<LlmGateway>,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ConversationSession>>>>,
}

impl EsrsAdvisor {
    pub async fn from_config(config: AdvisorConfig) -> Result<Self> {
        let provider = LlmProviderFactory::from_config(&config)?;
        let embedder = EmbeddingProviderFactory::from_config(&config)?;
        let reranker = RerankerFactory::from_config(&config)?;
        let loader = Arc::new(DiskStoreLoader::new(config.vectorstore_root.clone(), embedder));
        let table = ReportingGroupTable::load(&config.sector_table_path).await?;

        Self::build(
            config,
            AdvisorComponents {
                provider,
                reranker,
                loader,
                table,
            },
        )
        .await
    }

    pub async fn build(config: AdvisorConfig, components: AdvisorComponents) -> Result<Self> {
        config.validate()?;
        let AdvisorComponents {
            provider,
            reranker,
            loader,
            table,
        } = components;

        let taxonomy: Arc<dyn DocumentStore> =
            Arc::from(loader.load(&config.taxonomy_corpus).await?);
        info!(
            "Taxonomy corpus '{}' loaded: {} passages",
            taxonomy.corpus(),
            taxonomy.len()
        );

        let selector = CorpusSelector::build(loader.as_ref(), &config.default_corpus).await?;
        let gateway = Arc::new(LlmGateway::new(provider));

        let classifier = SectorClassifier::new(
            taxonomy,
            Arc::clone(&reranker),
            Arc::clone(&gateway),
            Arc::new(table),
            config.classification_params(),
        )
        .with_top_k(config.classify_top_k)
        .with_attempts(config.classify_attempts);

        let assembler = ContextAssembler::new(reranker).with_max_context_chars(config.max_context_chars);

        info!(
            "ESRS advisor ready: llm={}, reranker={}, sector table entries={}",
            gateway.provider_name(),
            assembler.reranker().name(),
            classifier.table().len()
        );

        Ok(Self {
            config,
            classifier,
            selector,
            assembler,
            gateway,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Registers an empty session and returns its id.
    pub fn open_session(&self) -> Uuid {
        self.register(ConversationSession::new())
    }

    fn register(&self, session: ConversationSession) -> Uuid {
        let id = session.id();
        self.sessions.write().insert(id, Arc::new(Mutex::new(session)));
        debug!("Opened session {}", id);
        id
    }

    /// Drops the session from the registry. Expiry policy belongs to the caller.
    pub fn close_session(&self, id: Uuid) -> Result<()> {
        match self.sessions.write().remove(&id) {
            Some(_) => {
                debug!("Closed session {}", id);
                Ok(())
            }
            None => Err(AdvisorError::SessionNotFound(id.to_string())),
        }
    }

    fn session(&self, id: Uuid) -> Result<Arc<Mutex<ConversationSession>>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AdvisorError::SessionNotFound(id.to_string()))
    }

    /// Routes `text` into the session: the first message is the company description,
    /// the rest are questions. `None` starts a new session, registered only once its
    /// description has been classified.
    pub async fn handle_message(&self, session_id: Option<Uuid>, text: &str) -> Result<ChatReply> {
        let Some(id) = session_id else {
            let mut session = ConversationSession::new();
            let reply = self.start_conversation(&mut session, text).await?;
            self.register(session);
            return Ok(reply);
        };
        let handle = self.session(id)?;
        let mut session = handle.lock().await;

        match session.state() {
            SessionState::Uninitialized => self.start_conversation(&mut session, text).await,
            SessionState::Classified | SessionState::Answering => {
                self.answer(&mut session, text).await
            }
        }
    }

    /// Clears the profile and history; the id stays valid for a new description.
    pub async fn reset_session(&self, id: Uuid) -> Result<()> {
        let handle = self.session(id)?;
        handle.lock().await.reset();
        info!("Session {} reset", id);
        Ok(())
    }

    pub async fn session_state(&self, id: Uuid) -> Result<SessionState> {
        Ok(self.session(id)?.lock().await.state())
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<String>> {
        Ok(self.session(id)?.lock().await.history())
    }

    async fn start_conversation(
        &self,
        session: &mut ConversationSession,
        description: &str,
    ) -> Result<ChatReply> {
        let description = description.trim();
        info!(
            "Classifying session {}: {}",
            session.id(),
            safe_truncate_ellipsis(description, 60)
        );

        let classification = self.classifier.classify(description).await?;
        let store = self.selector.resolve(&classification.group);
        let corpus = classification
            .group
            .special()
            .map_or_else(|| self.config.default_corpus.clone(), |g| g.corpus_folder().to_string());

        let title = if self.config.generate_titles && !description.is_empty() {
            self.generate_title(description).await
        } else {
            None
        };

        let metadata = ClassificationMetadata {
            taxonomy_code: classification.code.clone(),
            reporting_group: classification.group.clone(),
            corpus,
            corpus_passages: store.len(),
            title: title.clone(),
        };
        let reply = welcome_message(&classification.code);

        session.begin(CompanyProfile {
            description: description.to_string(),
            classification,
            store,
            title,
        })?;

        Ok(ChatReply {
            session_id: session.id(),
            reply,
            state: session.state(),
            degraded: false,
            context: None,
            passages: Vec::new(),
            classification: Some(metadata),
        })
    }

    async fn answer(&self, session: &mut ConversationSession, question: &str) -> Result<ChatReply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AdvisorError::Validation("question must not be empty".into()));
        }

        let store = match session.profile() {
            Some(profile) => Arc::clone(&profile.store),
            None => {
                return Err(AdvisorError::Validation(format!(
                    "session {} has no company profile",
                    session.id()
                )));
            }
        };

        let context = self
            .assembler
            .build_context(store.as_ref(), question, self.config.retrieve_k, self.config.keep_k)
            .await?;
        let prompt = build_answer_prompt(question, &context.text, &session.prompt_history());
        let completion = self
            .gateway
            .complete_detailed(&prompt, &self.config.answer_params())
            .await;

        if completion.degraded {
            warn!("Session {} answered with the fallback reply", session.id());
        }
        session.record_turn(question, completion.text.as_str())?;
        debug!(
            "Session {} answered turn {} from '{}'",
            session.id(),
            session.turns().len(),
            store.corpus()
        );

        Ok(ChatReply {
            session_id: session.id(),
            reply: completion.text,
            state: session.state(),
            degraded: completion.degraded,
            context: Some(context.text),
            passages: context.passages,
            classification: None,
        })
    }

    async fn generate_title(&self, description: &str) -> Option<String> {
        let completion = self
            .gateway
            .complete_detailed(&build_title_prompt(description), &self.config.title_params())
            .await;
        if completion.degraded {
            return None;
        }

        let title = completion
            .text
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
            .trim();
        (!title.is_empty()).then(|| safe_truncate(title, MAX_TITLE_CHARS))
    }
}
