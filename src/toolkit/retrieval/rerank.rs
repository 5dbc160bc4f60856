

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{rank_key, Passage};
use crate::llm::embeddings::tokenize;


#[derive(Error, Debug)]
pub enum RerankError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Pairwise relevance scorer. Higher is more relevant; the range depends on the model.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError>;

    async fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        futures::future::try_join_all(passages.iter().map(|p| self.score(query, p))).await
    }

    fn name(&self) -> &str;
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub similarity: f32,
    pub rerank_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Re-orders `candidates` by rerank score (stable, so ties keep retrieval order)
/// and keeps the best `keep`. A failing reranker degrades to similarity order.
pub async fn rerank_passages(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<Passage>,
    keep: usize,
) -> Vec<RetrievedPassage> {
    if candidates.is_empty() || keep == 0 {
        return Vec::new();
    }

    let texts: Vec<&str> = candidates.iter().map(|p| p.text.as_str()).collect();
    let scores = match reranker.score_batch(query, &texts).await {
        Ok(scores) if scores.len() == candidates.len() => Some(scores),
        Ok(scores) => {
            warn!(
                "Reranker {} returned {} scores for {} candidates, using similarity order",
                reranker.name(),
                scores.len(),
                candidates.len()
            );
            None
        }
        Err(e) => {
            warn!("Reranker {} failed, using similarity order: {}", reranker.name(), e);
            None
        }
    };

    let mut ranked: Vec<RetrievedPassage> = candidates
        .into_iter()
        .enumerate()
        .map(|(idx, p)| RetrievedPassage {
            rerank_score: scores.as_ref().map_or(p.score, |s| s[idx]),
            similarity: p.score,
            text: p.text,
            source: p.source,
        })
        .collect();

    ranked.sort_by(|a, b| rank_key(b.rerank_score).total_cmp(&rank_key(a.rerank_score)));
    ranked.truncate(keep);

    debug!(
        "Reranked with {}: kept {} (top score {:?})",
        reranker.name(),
        ranked.len(),
        ranked.first().map(|p| p.rerank_score)
    );
    ranked
}

/// Fraction of distinct query terms present in the passage. No model, no I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }

    pub fn score_sync(&self, query: &str, passage: &str) -> f32 {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() {
            return 0.0;
        }
        let passage_terms: HashSet<String> = tokenize(passage).collect();
        let matched = query_terms.intersection(&passage_terms).count();
        matched as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        Ok(self.score_sync(query, passage))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}


#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    texts: &'a [&'a str],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

/// Cross-encoder served behind a `/rerank` endpoint (text-embeddings-inference style).
pub struct HttpReranker {
    url: String,
    model: String,
    client: Client,
}

impl HttpReranker {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        let model = model.into();
        info!("HttpReranker initialized (model={}, url={})", model, url);
        Self {
            url,
            model,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, passage: &str) -> Result<f32, RerankError> {
        let scores = self.score_batch(query, &[passage]).await?;
        scores
            .into_iter()
            .next()
            .ok_or_else(|| RerankError::InvalidResponse("no score returned".into()))
    }

    async fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .client
            .post(format!("{}/rerank", self.url))
            .json(&RerankRequest {
                model: &self.model,
                query,
                texts: passages,
                raw_scores: true,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RerankHit>>()
            .await?;

        scores_in_input_order(hits, passages.len())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn scores_in_input_order(hits: Vec<RerankHit>, expected: usize) -> Result<Vec<f32>, RerankError> {
    let mut scores = vec![None; expected];
    for hit in hits {
        let slot = scores.get_mut(hit.index).ok_or_else(|| {
            RerankError::InvalidResponse(format!("index {} out of range {}", hit.index, expected))
        })?;
        *slot = Some(hit.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| RerankError::InvalidResponse(format!("missing score for {i}"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingReranker, FixedReranker};

    fn passage(text: &str, score: f32) -> Passage {
        Passage {
            text: text.to_string(),
            score,
            source: None,
        }
    }

    #[test]
    fn test_lexical_score_is_term_fraction() {
        let reranker = LexicalReranker::new();
        assert_eq!(reranker.score_sync("crude oil", "Extraction of crude oil"), 1.0);
        assert_eq!(reranker.score_sync("crude oil", "crude rubber"), 0.5);
        assert_eq!(reranker.score_sync("", "anything"), 0.0);
    }

    #[tokio::test]
    async fn test_rerank_orders_by_rerank_score_not_similarity() {
        let candidates = vec![
            passage("cereals", 0.9),
            passage("crude oil wells", 0.2),
            passage("oil refinery", 0.5),
        ];

        let ranked = rerank_passages(&LexicalReranker, "crude oil wells", candidates, 2).await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "crude oil wells");
        assert_eq!(ranked[0].similarity, 0.2);
        assert_eq!(ranked[1].text, "oil refinery");
    }

    #[tokio::test]
    async fn test_rerank_ties_keep_retrieval_order() {
        let candidates = vec![
            passage("first", 0.9),
            passage("second", 0.8),
            passage("third", 0.7),
            passage("fourth", 0.6),
        ];
        let reranker = FixedReranker::new(vec![1.0, 2.0, 1.0, 2.0]);

        let ranked = rerank_passages(&reranker, "q", candidates, 4).await;
        let order: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(order, vec!["second", "fourth", "first", "third"]);
    }

    #[tokio::test]
    async fn test_nan_scores_rank_last() {
        let candidates = vec![
            passage("garbage", 0.9),
            passage("good", 0.8),
            passage("better", 0.7),
        ];
        let reranker = FixedReranker::new(vec![f32::NAN, 1.0, 3.0]);

        let ranked = rerank_passages(&reranker, "q", candidates, 3).await;
        let order: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(order, vec!["better", "good", "garbage"]);
    }

    #[tokio::test]
    async fn test_rerank_failure_falls_back_to_similarity() {
        let candidates = vec![passage("a", 0.1), passage("b", 0.7), passage("c", 0.4)];

        let ranked = rerank_passages(&FailingReranker, "q", candidates, 2).await;
        let order: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(order, vec!["b", "c"]);
        assert_eq!(ranked[0].rerank_score, 0.7);
    }

    #[tokio::test]
    async fn test_rerank_never_expands_candidates() {
        let ranked = rerank_passages(&LexicalReranker, "q", vec![passage("q", 0.1)], 5).await;
        assert_eq!(ranked.len(), 1);
        assert!(rerank_passages(&LexicalReranker, "q", Vec::new(), 5).await.is_empty());
    }

    #[test]
    fn test_http_hits_are_realigned_to_input_order() {
        let hits = vec![
            RerankHit { index: 2, score: 0.3 },
            RerankHit { index: 0, score: 0.9 },
            RerankHit { index: 1, score: -1.2 },
        ];
        assert_eq!(scores_in_input_order(hits, 3).unwrap(), vec![0.9, -1.2, 0.3]);

        let short = vec![RerankHit { index: 0, score: 0.1 }];
        assert!(scores_in_input_order(short, 2).is_err());

        let out_of_range = vec![RerankHit { index: 4, score: 0.1 }];
        assert!(scores_in_input_order(out_of_range, 2).is_err());
    }
}
