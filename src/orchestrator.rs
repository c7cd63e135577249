//! User intents in, state changes out.
//!
//! The [`Orchestrator`] is the only component that calls the extraction
//! service. It owns the [`ScanSession`] and the [`HistoryStore`] and turns
//! each intent (capture, save, reset, select, clear) into the right sequence
//! of codec, contract, session and history operations.
//!
//! When built with [`Orchestrator::from_config`] the LLM provider is resolved
//! on the first capture, so history-only work needs no API key.
//!
//! ## Retry strategy
//!
//! Only [`ScanError::ServiceUnavailable`] is retried, with exponential
//! backoff `retry_backoff_ms * 2^(attempt-1)`. With the defaults (500 ms, 2
//! retries) the waits are 500 ms then 1 s. A response that breaks the
//! contract is final: the service did answer, and asking the same question
//! again is not a fix.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::history::{HistoryEntry, HistoryStore, KeyValueStore};
use crate::pipeline::llm::{ExtractionService, LlmExtractionService};
use crate::pipeline::{codec, contract, input};
use crate::record::BusinessCardRecord;
use crate::session::ScanSession;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Sequences user intents over a session and its history.
///
/// All mutating operations take `&mut self`, so one orchestrator runs at most
/// one extraction at a time.
pub struct Orchestrator<S: KeyValueStore> {
    service: Option<Arc<dyn ExtractionService>>,
    session: ScanSession,
    history: HistoryStore<S>,
    config: ScanConfig,
}

impl<S: KeyValueStore> Orchestrator<S> {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        history: HistoryStore<S>,
        config: ScanConfig,
    ) -> Self {
        Self {
            service: Some(service),
            session: ScanSession::new(),
            history,
            config,
        }
    }

    /// Open the history in `storage`. The LLM provider is resolved from
    /// `config` when the first capture needs it.
    pub fn from_config(config: ScanConfig, storage: S) -> Self {
        let history = HistoryStore::from_config(storage, &config);
        Self {
            service: None,
            session: ScanSession::new(),
            history,
            config,
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan a captured image.
    ///
    /// Size and format are checked before the session moves, so an oversized
    /// or unsupported file leaves the session as it was. Once scanning has
    /// begun, any failure lands the session in `error` with the error's
    /// message and the error is also returned.
    pub async fn handle_capture(&mut self, bytes: &[u8]) -> Result<BusinessCardRecord, ScanError> {
        if bytes.len() > self.config.max_image_bytes {
            return Err(ScanError::ImageTooLarge {
                bytes: bytes.len(),
                limit: self.config.max_image_bytes,
            });
        }
        let image = codec::encode(bytes)?;
        let service = self.service()?;

        self.session.begin_scan(image.as_str())?;
        info!("Scanning card image ({} bytes)", bytes.len());
        if let Some(ref obs) = self.config.observer {
            obs.on_scan_start(bytes.len());
        }

        match self.extract_with_retry(service.as_ref(), &image).await {
            Ok(record) => {
                self.session.resolve(record.clone())?;
                info!("Scan succeeded: {}", summary(&record));
                if let Some(ref obs) = self.config.observer {
                    obs.on_scan_complete(&record);
                }
                Ok(record)
            }
            Err(e) => {
                let message = e.to_string();
                self.session.fail(message.as_str())?;
                warn!("Scan failed: {}", message);
                if let Some(ref obs) = self.config.observer {
                    obs.on_scan_error(&message);
                }
                Err(e)
            }
        }
    }

    /// Read a local file or download a URL, then [`Self::handle_capture`].
    pub async fn handle_capture_input(
        &mut self,
        input_str: &str,
    ) -> Result<BusinessCardRecord, ScanError> {
        let bytes = input::acquire(input_str, self.config.download_timeout_secs).await?;
        self.handle_capture(&bytes).await
    }

    /// Commit the displayed record and image to history.
    pub fn handle_save(&mut self) -> Result<HistoryEntry, ScanError> {
        let (image, record) = match (self.session.current_image(), self.session.current_record()) {
            (Some(image), Some(record)) => (image.to_string(), record.clone()),
            _ => {
                return Err(ScanError::InvalidTransition {
                    operation: "save to history",
                    state: self.session.status(),
                })
            }
        };

        let entry = self.history.save(image, record)?;
        if let Some(ref obs) = self.config.observer {
            obs.on_history_saved(&entry, self.history.len());
        }
        Ok(entry)
    }

    /// Discard the current image and outcome.
    pub fn handle_reset(&mut self) -> Result<(), ScanError> {
        self.session.reset()
    }

    /// Show a saved entry. The session must be idle.
    pub fn handle_select_history(&mut self, id: &str) -> Result<&BusinessCardRecord, ScanError> {
        let entry = self.history.select(id)?;
        self.session.load_from_history(entry)?;
        self.session
            .current_record()
            .ok_or_else(|| ScanError::Internal("session has no record after loading".into()))
    }

    /// Clear history if `confirm`, called with the current entry count,
    /// agrees. Returns whether anything was cleared.
    pub fn handle_clear_history<F>(&mut self, confirm: F) -> Result<bool, ScanError>
    where
        F: FnOnce(usize) -> bool,
    {
        if !confirm(self.history.len()) {
            info!("History clear cancelled");
            return Ok(false);
        }
        self.history.clear()?;
        Ok(true)
    }

    fn service(&mut self) -> Result<Arc<dyn ExtractionService>, ScanError> {
        if let Some(ref service) = self.service {
            return Ok(Arc::clone(service));
        }
        let service: Arc<dyn ExtractionService> =
            Arc::new(LlmExtractionService::from_config(&self.config)?);
        self.service = Some(Arc::clone(&service));
        Ok(service)
    }

    async fn extract_with_retry(
        &self,
        service: &dyn ExtractionService,
        image: &str,
    ) -> Result<BusinessCardRecord, ScanError> {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let backoff = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!("Extraction retry {}/{} after {}ms", attempt, max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match contract::submit(service, image, self.config.instruction()).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    warn!("Extraction attempt {} failed: {}", attempt + 1, e);
                    if let Some(ref obs) = self.config.observer {
                        obs.on_attempt_failed(attempt + 1, max_retries, &e.to_string());
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn summary(record: &BusinessCardRecord) -> String {
    match (record.name.as_str(), record.company_name.as_str()) {
        ("", "") => "no name or company".to_string(),
        (name, "") => name.to_string(),
        ("", company) => company.to_string(),
        (name, company) => format!("{name} ({company})"),
    }
}

impl<S: KeyValueStore> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("status", &self.session.status())
            .field("service_resolved", &self.service.is_some())
            .field("history_len", &self.history.len())
            .field("config", &self.config)
            .finish()
    }
}
