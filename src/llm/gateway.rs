

use std::sync::Arc;

use tracing::{debug, warn};

use super::prompt::SYSTEM_PROMPT;
use super::providers::{GenerationParams, LlmMetadata, LlmProvider};

pub const FALLBACK_REPLY: &str =
    "I'm sorry, I encountered an error while generating a response. Please try again.";


#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// True when the provider failed and `text` is the fallback apology.
    pub degraded: bool,
    pub metadata: Option<LlmMetadata>,
}

/// Single entry point to the completion model. Provider failures never escape:
/// they are logged and turned into [`FALLBACK_REPLY`].
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    
    pub async fn complete(&self, prompt: &str, params: &GenerationParams) -> String {
        self.complete_detailed(prompt, params).await.text
    }

    
    pub async fn complete_detailed(&self, prompt: &str, params: &GenerationParams) -> Completion {
        debug!(
            "Calling {} ({}) with prompt of {} chars, temperature={}",
            self.provider.provider_name(),
            self.provider.model_name(),
            prompt.chars().count(),
            params.temperature
        );

        match self.provider.generate(&self.system_prompt, prompt, params).await {
            Ok((text, metadata)) => Completion {
                text: text.trim().to_string(),
                degraded: false,
                metadata: Some(metadata),
            },
            Err(e) => {
                warn!("LLM call failed, returning fallback reply: {}", e);
                Completion {
                    text: FALLBACK_REPLY.to_string(),
                    degraded: true,
                    metadata: None,
                }
            }
        }
    }
}
