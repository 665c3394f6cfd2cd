//! Routes a chat completion across a primary/complex/fallback model chain
//! on a single provider, trying each in turn on failure. Ported from
//! `examples/original_source/nexus/llm/router.py`'s `LLMRouter._model_chain`/
//! `complete_json` — this router fails over across *models* on one backend
//! rather than across distinct provider implementations, matching the
//! original.

use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError};

pub struct ProviderRouter {
    provider: Box<dyn LlmProvider>,
    primary_model: String,
    complex_model: String,
    fallback_model: String,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl ProviderRouter {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        primary_model: impl Into<String>,
        complex_model: impl Into<String>,
        fallback_model: impl Into<String>,
        max_tokens: u32,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            provider,
            primary_model: primary_model.into(),
            complex_model: complex_model.into(),
            fallback_model: fallback_model.into(),
            max_tokens,
            timeout_seconds,
        }
    }

    /// `complex_task` tries the heavier model first; otherwise the chain is
    /// primary → fallback → complex.
    fn model_chain(&self, complex_task: bool) -> Vec<&str> {
        if complex_task {
            vec![&self.complex_model, &self.primary_model, &self.fallback_model]
        } else {
            vec![&self.primary_model, &self.fallback_model, &self.complex_model]
        }
    }

    pub async fn complete(
        &self,
        system: String,
        messages: Vec<Message>,
        complex_task: bool,
    ) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for model in self.model_chain(complex_task) {
            let req = ChatRequest {
                model: model.to_string(),
                system: system.clone(),
                messages: messages.clone(),
                max_tokens: self.max_tokens,
                timeout_seconds: self.timeout_seconds,
            };
            match self.provider.send(&req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(model, err = %e, "model attempt failed");
                    last_err = Some(e);
                }
            }
        }

        info!("all models in chain failed");
        Err(last_err.unwrap_or(ProviderError::Unavailable("unknown model failure".to_string())))
    }
}
