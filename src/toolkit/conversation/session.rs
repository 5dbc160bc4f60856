

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::error::{AdvisorError, Result};
use crate::toolkit::retrieval::store::DocumentStore;
use crate::toolkit::sector::classifier::Classification;
use crate::toolkit::sector::groups::ReportingGroup;
use crate::toolkit::sector::taxonomy::TaxonomyCode;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Classified,
    Answering,
}


#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// What the first message established about the company.
#[derive(Clone)]
pub struct CompanyProfile {
    pub description: String,
    pub classification: Classification,
    pub store: Arc<dyn DocumentStore>,
    pub title: Option<String>,
}

impl std::fmt::Debug for CompanyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanyProfile")
            .field("description", &self.description)
            .field("code", &self.classification.code)
            .field("group", &self.classification.group)
            .field("corpus", &self.store.corpus())
            .field("title", &self.title)
            .finish()
    }
}

/// Per-user conversation: the first message is the company description, every later
/// one a question. Turns are append-only; only [`reset`](Self::reset) clears them.
#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    state: SessionState,
    profile: Option<CompanyProfile>,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            state: SessionState::Uninitialized,
            profile: None,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn profile(&self) -> Option<&CompanyProfile> {
        self.profile.as_ref()
    }

    pub fn taxonomy_code(&self) -> Option<&TaxonomyCode> {
        self.profile.as_ref().map(|p| &p.classification.code)
    }

    pub fn reporting_group(&self) -> Option<&ReportingGroup> {
        self.profile.as_ref().map(|p| &p.classification.group)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// `Uninitialized → Classified`. Happens once per session lifetime.
    pub fn begin(&mut self, profile: CompanyProfile) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(AdvisorError::Validation(format!(
                "session {} is already classified",
                self.id
            )));
        }
        self.profile = Some(profile);
        self.state = SessionState::Classified;
        Ok(())
    }

    /// `Classified | Answering → Answering`.
    pub fn record_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) -> Result<()> {
        if self.state == SessionState::Uninitialized {
            return Err(AdvisorError::Validation(format!(
                "session {} has no company description yet",
                self.id
            )));
        }
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        });
        self.state = SessionState::Answering;
        Ok(())
    }

    /// Back to `Uninitialized`: profile and turns are discarded, the id is kept.
    pub fn reset(&mut self) {
        self.state = SessionState::Uninitialized;
        self.profile = None;
        self.turns.clear();
    }

    /// `Q:`/`A:` lines, two per answered turn.
    pub fn history(&self) -> Vec<String> {
        self.turns
            .iter()
            .flat_map(|t| [format!("Q: {}", t.question), format!("A: {}", t.answer)])
            .collect()
    }

    /// Company header followed by the full history, as fed to every answering prompt.
    pub fn prompt_history(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3 + self.turns.len() * 2);
        if let Some(profile) = &self.profile {
            let group = &profile.classification.group;
            lines.push(format!("Company description: {}", profile.description));
            lines.push(format!("NACE sector code: {}", profile.classification.code));
            lines.push(match group {
                ReportingGroup::Agnostic => "ESRS standards to follow: Agnostic Standards".to_string(),
                other => format!("ESRS standards to follow: Agnostic Standards + {other}"),
            });
        }
        lines.extend(self.history());
        lines
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::local_store;
    use crate::toolkit::sector::groups::SpecialGroup;

    fn profile() -> CompanyProfile {
        CompanyProfile {
            description: "We extract crude oil from offshore wells".to_string(),
            classification: Classification {
                code: TaxonomyCode::Code("B06.1".to_string()),
                group: ReportingGroup::Special(SpecialGroup::OilAndGas),
                context: String::new(),
                raw_reply: None,
            },
            store: Arc::new(local_store("default_db", &["general"])),
            title: None,
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = ConversationSession::new();
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.begin(profile()).unwrap();
        assert_eq!(session.state(), SessionState::Classified);
        assert_eq!(session.taxonomy_code().unwrap().as_str(), "B06.1");

        session.record_turn("What is E1?", "Climate change.").unwrap();
        assert_eq!(session.state(), SessionState::Answering);
        session.record_turn("And S1?", "Own workforce.").unwrap();
        assert_eq!(session.state(), SessionState::Answering);
    }

    #[test]
    fn test_history_grows_by_two_per_turn() {
        let mut session = ConversationSession::new();
        session.begin(profile()).unwrap();
        assert!(session.history().is_empty());

        for i in 1..=3 {
            session.record_turn(format!("q{i}"), format!("a{i}")).unwrap();
            assert_eq!(session.history().len(), i * 2);
        }
        assert_eq!(session.history()[4], "Q: q3");
        assert_eq!(session.history()[5], "A: a3");
    }

    #[test]
    fn test_reset_clears_everything_but_id() {
        let mut session = ConversationSession::new();
        let id = session.id();
        session.begin(profile()).unwrap();
        session.record_turn("q", "a").unwrap();

        session.reset();

        assert_eq!(session.id(), id);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.history().is_empty());
        assert!(session.taxonomy_code().is_none());
        assert!(session.reporting_group().is_none());
        assert!(session.begin(profile()).is_ok());
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut session = ConversationSession::new();
        assert!(session.record_turn("q", "a").is_err());

        session.begin(profile()).unwrap();
        assert!(session.begin(profile()).is_err());
    }

    #[test]
    fn test_prompt_history_has_company_header() {
        let mut session = ConversationSession::new();
        session.begin(profile()).unwrap();
        session.record_turn("q", "a").unwrap();

        let lines = session.prompt_history();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Company description: We extract crude oil from offshore wells");
        assert_eq!(lines[1], "NACE sector code: B06.1");
        assert_eq!(lines[2], "ESRS standards to follow: Agnostic Standards + Oil & Gas");
        assert_eq!(lines[3], "Q: q");
    }
}
