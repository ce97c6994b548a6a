use std::sync::Arc;
use tracing::debug;

use crate::agent::provider::{into_provider_error, LLMProvider};
use crate::error::ProviderError;
use crate::memory::episodic::EpisodicMemory;
use crate::utils::truncate::{truncate_text, TruncationPolicy};

/// Writes the user-facing reply from the composed system prompt and the
/// recent conversation.
pub struct Narrator {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl Narrator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn reply(&self, system: String, history: &EpisodicMemory) -> Result<String, ProviderError> {
        let prompt = format!("{}\n\nAssistant:", history.format_for_prompt());
        let reply = self
            .provider
            .generate(&self.model, prompt, Some(system))
            .await
            .map_err(into_provider_error)?;
        debug!("Narrator reply: {}", truncate_text(&reply, TruncationPolicy::Tokens(80)));
        Ok(reply.trim().to_string())
    }
}
