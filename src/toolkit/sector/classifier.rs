

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::groups::{ReportingGroup, ReportingGroupTable};
use super::taxonomy::{extract_code, normalize_reply, TaxonomyCode};
use crate::core::error::{AdvisorError, Result};
use crate::llm::gateway::LlmGateway;
use crate::llm::prompt::build_classification_prompt;
use crate::llm::providers::GenerationParams;
use crate::toolkit::retrieval::rerank::{rerank_passages, Reranker};
use crate::toolkit::retrieval::store::{search_with_retry, DocumentStore};

pub const DEFAULT_CLASSIFY_TOP_K: usize = 3;


#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub code: TaxonomyCode,
    pub group: ReportingGroup,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_reply: Option<String>,
}

impl Classification {
    fn agnostic() -> Self {
        Self {
            code: TaxonomyCode::Agnostic,
            group: ReportingGroup::Agnostic,
            context: String::new(),
            raw_reply: None,
        }
    }
}

/// Description → taxonomy code → reporting group. The model's free-text reply is the
/// classification; a reply without a readable code is the agnostic outcome, not an error.
pub struct SectorClassifier {
    store: Arc<dyn DocumentStore>,
    reranker: Arc<dyn Reranker>,
    gateway: Arc<LlmGateway>,
    table: Arc<ReportingGroupTable>,
    params: GenerationParams,
    top_k: usize,
    attempts: u32,
}

impl SectorClassifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reranker: Arc<dyn Reranker>,
        gateway: Arc<LlmGateway>,
        table: Arc<ReportingGroupTable>,
        params: GenerationParams,
    ) -> Self {
        Self {
            store,
            reranker,
            gateway,
            table,
            params,
            top_k: DEFAULT_CLASSIFY_TOP_K,
            attempts: 1,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn table(&self) -> &ReportingGroupTable {
        &self.table
    }

    pub async fn classify(&self, description: &str) -> Result<Classification> {
        if description.trim().is_empty() {
            info!("Empty company description, using agnostic standards");
            return Ok(Classification::agnostic());
        }

        let candidates = search_with_retry(self.store.as_ref(), description, self.top_k)
            .await
            .map_err(|e| AdvisorError::retrieval(self.store.corpus(), e.to_string()))?;
        let ranked =
            rerank_passages(self.reranker.as_ref(), description, candidates, self.top_k).await;
        let context = ranked
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = build_classification_prompt(description, &context);
        let mut code = TaxonomyCode::Agnostic;
        let mut raw_reply = None;

        for attempt in 1..=self.attempts {
            let completion = self.gateway.complete_detailed(&prompt, &self.params).await;
            if completion.degraded {
                debug!("Classification attempt {} got the fallback reply", attempt);
                break;
            }

            let extracted = extract_code(&normalize_reply(&completion.text));
            raw_reply = Some(completion.text);
            if let Some(found) = extracted {
                code = found;
                break;
            }
            debug!("Classification attempt {} yielded no code", attempt);
        }

        let group = self.table.group_for(&code);
        if code.is_agnostic() {
            info!("Could not determine exact NACE code. Using agnostic standards.");
        } else {
            info!("Company sector according to NACE: {} ({})", code, group);
        }

        Ok(Classification {
            code,
            group,
            context,
            raw_reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{local_store, FlakyStore, ScriptedProvider};
    use crate::toolkit::retrieval::rerank::LexicalReranker;
    use crate::toolkit::sector::groups::SpecialGroup;

    fn nace_store() -> Arc<dyn DocumentStore> {
        Arc::new(local_store(
            "nace_db",
            &[
                "A01.1 Growing of non-perennial crops",
                "B06.1 Extraction of crude petroleum",
                "B06.2 Extraction of natural gas",
                "H49.4 Freight transport by road and removal services",
                "C10.1 Processing and preserving of meat",
            ],
        ))
    }

    fn table() -> Arc<ReportingGroupTable> {
        Arc::new(ReportingGroupTable::from_pairs([
            ("B06.1", "Oil & Gas Company"),
            ("H49.4", "Road Transport"),
        ]))
    }

    fn classifier(provider: Arc<ScriptedProvider>, store: Arc<dyn DocumentStore>) -> SectorClassifier {
        SectorClassifier::new(
            store,
            Arc::new(LexicalReranker),
            Arc::new(LlmGateway::new(provider)),
            table(),
            GenerationParams::default(),
        )
    }

    #[tokio::test]
    async fn test_extracts_code_and_group() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["The NACE code is b06.1"]));
        let result = classifier(provider.clone(), nace_store())
            .classify("We extract crude petroleum offshore")
            .await
            .unwrap();

        assert_eq!(result.code.as_str(), "B06.1");
        assert_eq!(result.group.special(), Some(SpecialGroup::OilAndGas));
        assert_eq!(result.context.lines().count(), 3);

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("We extract crude petroleum offshore"));
        assert!(prompt.contains("B06.1 Extraction of crude petroleum"));
    }

    #[tokio::test]
    async fn test_empty_description_is_agnostic_without_calls() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["B06.1"]));
        let store = Arc::new(FlakyStore::permanent("nace_db"));
        let result = classifier(provider.clone(), store).classify("   ").await.unwrap();

        assert!(result.code.is_agnostic());
        assert_eq!(result.group, ReportingGroup::Agnostic);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_nonsense_reply_falls_back_to_agnostic() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["I am not sure, sorry."]));
        let result = classifier(provider, nace_store()).classify("qwpoeiru zxmv").await.unwrap();

        assert_eq!(result.code, TaxonomyCode::Agnostic);
        assert_eq!(result.group, ReportingGroup::Agnostic);
        assert_eq!(result.raw_reply.as_deref(), Some("I am not sure, sorry."));
    }

    #[tokio::test]
    async fn test_gateway_failure_falls_back_to_agnostic() {
        let provider = Arc::new(ScriptedProvider::failing("scripted"));
        let result = classifier(provider, nace_store()).classify("We farm wheat").await.unwrap();
        assert!(result.code.is_agnostic());
        assert!(result.raw_reply.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_code_is_agnostic_group() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["C10.1"]));
        let result = classifier(provider, nace_store()).classify("We process meat").await.unwrap();
        assert_eq!(result.code.as_str(), "C10.1");
        assert_eq!(result.group, ReportingGroup::Agnostic);
    }

    #[tokio::test]
    async fn test_extra_attempts_re_ask_until_code_found() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["hmm", "h49.4"]));
        let result = classifier(provider.clone(), nace_store())
            .with_attempts(2)
            .classify("We run a trucking fleet")
            .await
            .unwrap();

        assert_eq!(result.code.as_str(), "H49.4");
        assert_eq!(result.group.special(), Some(SpecialGroup::RoadTransport));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_surfaced() {
        let provider = Arc::new(ScriptedProvider::replying("scripted", ["B06.1"]));
        let store = Arc::new(FlakyStore::new("nace_db", 2));
        let err = classifier(provider.clone(), store).classify("oil").await.unwrap_err();

        assert!(matches!(err, AdvisorError::Retrieval { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_result_always_matches_grammar_or_sentinel() {
        let replies = ["", "A", "a1", "u99.99.99.99", "Section K, code k64.19", "..."];
        for reply in replies {
            let provider = Arc::new(ScriptedProvider::replying("scripted", [reply]));
            let result = classifier(provider, nace_store()).classify("a bank").await.unwrap();
            assert!(
                result.code.is_agnostic() || TaxonomyCode::parse(result.code.as_str()).is_some(),
                "malformed code from reply {reply:?}: {}",
                result.code
            );
        }
    }
}
