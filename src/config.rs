//! Configuration for scanning and history.
//!
//! All behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. Setters clamp out-of-range values; `build()`
//! rejects combinations that cannot work.

use crate::error::ScanError;
use crate::progress::ScanObserverRef;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Storage key under which the whole history collection is persisted.
pub const DEFAULT_HISTORY_KEY: &str = "ideaScanHistory";

/// Configuration for a scan session and its history.
///
/// # Example
/// ```rust
/// use edgequake_cardscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_retries(1)
///     .history_limit(50)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// LLM model identifier. If None, uses [`crate::pipeline::llm::DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model to report what is printed, not to
    /// improvise, so keep this low.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// A filled-in record is a few hundred tokens; the headroom covers long
    /// addresses and taglines.
    pub max_tokens: usize,

    /// Retries after a [`ScanError::ServiceUnavailable`]. Default: 2.
    ///
    /// Contract violations (empty, malformed, missing anchors) are never
    /// retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the extraction service, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Custom extraction instruction. If None, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Largest accepted image, in bytes. Default: 20 MiB.
    ///
    /// Vision APIs reject oversized uploads anyway; failing early saves the
    /// round-trip and keeps history blobs bounded.
    pub max_image_bytes: usize,

    /// Maximum number of history entries kept. Default: `Some(100)`.
    ///
    /// Each entry embeds its image as a data URI, so the blob grows by the
    /// size of a photo on every save. When a save would exceed the limit the
    /// oldest entries are dropped (and logged). `None` disables the limit;
    /// storage quota errors are then the only bound.
    pub history_limit: Option<usize>,

    /// Storage key for the history blob. Default: [`DEFAULT_HISTORY_KEY`].
    pub history_key: String,

    /// Observer notified of scan and history events.
    pub observer: Option<ScanObserverRef>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 30,
            instruction: None,
            max_image_bytes: 20 * 1024 * 1024,
            history_limit: Some(100),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            observer: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("history_limit", &self.history_limit)
            .field("history_key", &self.history_key)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ScanObserver>"))
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction actually sent to the service.
    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_INSTRUCTION)
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn history_limit(mut self, n: usize) -> Self {
        self.config.history_limit = Some(n.max(1));
        self
    }

    /// Keep every saved entry; only storage capacity bounds the history.
    pub fn unbounded_history(mut self) -> Self {
        self.config.history_limit = None;
        self
    }

    pub fn history_key(mut self, key: impl Into<String>) -> Self {
        self.config.history_key = key.into();
        self
    }

    pub fn observer(mut self, observer: ScanObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ScanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_image_bytes == 0 {
            return Err(ScanError::InvalidConfig(
                "max_image_bytes must be ≥ 1".into(),
            ));
        }
        if c.history_key.trim().is_empty() {
            return Err(ScanError::InvalidConfig(
                "history_key must not be empty".into(),
            ));
        }
        if let Some(ref instruction) = c.instruction {
            if instruction.trim().is_empty() {
                return Err(ScanError::InvalidConfig(
                    "instruction must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ScanConfig::default();
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.history_limit, Some(100));
        assert_eq!(c.history_key, "ideaScanHistory");
        assert!(c.instruction().starts_with("Analyze this business card"));
    }

    #[test]
    fn setters_clamp() {
        let c = ScanConfig::builder()
            .temperature(9.0)
            .history_limit(0)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.history_limit, Some(1));
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn unbounded_history_clears_limit() {
        let c = ScanConfig::builder().unbounded_history().build().unwrap();
        assert_eq!(c.history_limit, None);
    }

    #[test]
    fn build_rejects_invalid() {
        assert!(matches!(
            ScanConfig::builder().max_tokens(0).build(),
            Err(ScanError::InvalidConfig(_))
        ));
        assert!(matches!(
            ScanConfig::builder().history_key(" ").build(),
            Err(ScanError::InvalidConfig(_))
        ));
        assert!(matches!(
            ScanConfig::builder().instruction("").build(),
            Err(ScanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn custom_instruction_wins() {
        let c = ScanConfig::builder()
            .instruction("Read the card.")
            .build()
            .unwrap();
        assert_eq!(c.instruction(), "Read the card.");
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", ScanConfig::default());
        assert!(s.contains("ScanConfig"));
        assert!(s.contains("history_limit"));
    }
}
