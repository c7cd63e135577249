//! The extraction service collaborator and its VLM-backed implementation.
//!
//! [`ExtractionService`] is the narrow seam the rest of the crate talks to:
//! one `generate` call that turns an [`ExtractionRequest`] into raw text.
//! [`LlmExtractionService`] implements it on top of any
//! [`edgequake_llm::LLMProvider`] with vision support. Tests and embedders can
//! plug in their own implementation without touching the orchestrator.
//!
//! Nothing here retries. A failed or timed-out call surfaces as
//! [`ScanError::ServiceUnavailable`] and the orchestrator decides what to do.

use super::contract::ExtractionRequest;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Default vision model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A remote service that reads a card image and answers with raw text.
///
/// Implementations must report transport failures (network, HTTP errors,
/// timeouts) as [`ScanError::ServiceUnavailable`]; response validation is
/// not their concern.
pub trait ExtractionService: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<String, ScanError>>;
}

/// [`ExtractionService`] backed by an edgequake-llm vision provider.
///
/// ## Message layout
///
/// 1. **System message**: the instruction, the JSON schema and the
///    "JSON only" rule (see [`prompts::system_message`])
/// 2. **User message**: the card image as a base64 attachment with
///    `detail: "high"` so small print (phone numbers, emails) stays legible
pub struct LlmExtractionService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    api_timeout: Duration,
}

impl LlmExtractionService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ScanConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn call(&self, request: &ExtractionRequest) -> Result<String, ScanError> {
        let start = Instant::now();
        let image = ImageData::new(request.image.data.clone(), request.image.mime_type.as_str())
            .with_detail("high");

        let messages = vec![
            ChatMessage::system(prompts::system_message(
                &request.instruction,
                &request.schema,
            )),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let response = match timeout(
            self.api_timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Extraction call failed — {}", e);
                return Err(ScanError::ServiceUnavailable {
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Extraction call timed out after {}s",
                    self.api_timeout.as_secs()
                );
                return Err(ScanError::ServiceUnavailable {
                    detail: format!("timed out after {}s", self.api_timeout.as_secs()),
                });
            }
        };

        debug!(
            "Extraction: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

impl ExtractionService for LlmExtractionService {
    fn generate<'a>(
        &'a self,
        request: &'a ExtractionRequest,
    ) -> BoxFuture<'a, Result<String, ScanError>> {
        self.call(request).boxed()
    }
}

/// Build `CompletionOptions` from the scan config.
fn build_options(config: &ScanConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`): the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present**: prefer OpenAI when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, ScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::codec::ImagePayload;

    struct Echo;

    impl ExtractionService for Echo {
        fn generate<'a>(
            &'a self,
            request: &'a ExtractionRequest,
        ) -> BoxFuture<'a, Result<String, ScanError>> {
            async move { Ok(request.image.mime_type.clone()) }.boxed()
        }
    }

    #[tokio::test]
    async fn trait_object_is_callable() {
        let service: Arc<dyn ExtractionService> = Arc::new(Echo);
        let request = ExtractionRequest::new(
            ImagePayload {
                mime_type: "image/png".into(),
                data: "QUJD".into(),
            },
            "extract",
        );
        assert_eq!(service.generate(&request).await.unwrap(), "image/png");
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ScanConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn build_options_follow_config() {
        let config = ScanConfig::builder()
            .temperature(0.3)
            .max_tokens(512)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(512));
    }
}
