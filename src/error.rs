//! Error types for the edgequake-cardscan library.
//!
//! A single [`ScanError`] enum covers every failure the core can report. The
//! variants group into four families that callers usually treat differently:
//!
//! * **Acquisition / codec**: the image could not be read or is not an
//!   accepted format. Nothing was sent to the extraction service.
//! * **Contract**: the service answered, but the answer did not honour the
//!   field schema. The raw text is never trusted as a record.
//! * **Service**: the collaborator call itself failed or timed out. This is
//!   the only retryable family (see [`ScanError::is_retryable`]).
//! * **History**: storage was full, unreadable, or the requested entry no
//!   longer exists.
//!
//! None of these is fatal to the process: after any single failure the
//! session and the history store remain usable.

use crate::record::CardField;
use crate::session::ScanStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-cardscan library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// The bytes or data URI are not one of the accepted image formats
    /// (PNG, JPEG, WebP).
    #[error("Unsupported image format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The image exceeds the configured upload limit.
    #[error("Image is {bytes} bytes, larger than the {limit}-byte limit")]
    ImageTooLarge { bytes: usize, limit: usize },

    // ── Contract errors ───────────────────────────────────────────────────
    /// The extraction service returned no text at all.
    #[error("The extraction service returned an empty response")]
    EmptyResponse,

    /// The response text is not a JSON object of string fields.
    #[error("The extraction service returned a malformed response: {detail}")]
    MalformedResponse { detail: String },

    /// One of the four anchor keys is absent from the response.
    #[error("The extraction response is missing the required '{}' field", field.key())]
    MissingAnchorField { field: CardField },

    // ── Service errors ────────────────────────────────────────────────────
    /// The extraction call failed or timed out before producing text.
    #[error("Extraction service unavailable: {detail}")]
    ServiceUnavailable { detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// The requested operation is not legal in the session's current state.
    #[error("Cannot {operation} while the scan session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: ScanStatus,
    },

    // ── History errors ────────────────────────────────────────────────────
    /// The persisted history blob could not be decoded.
    ///
    /// `HistoryStore` recovers from an unreadable blob by starting with an
    /// empty history. A readable blob whose newest id leaves no room for a
    /// newer one is reported by `save`.
    #[error("Stored history is unreadable: {detail}")]
    StorageCorrupt { detail: String },

    /// Writing the history blob would exceed the storage capacity.
    #[error("History storage is full: could not write {needed} bytes ({detail})")]
    StorageQuotaExceeded { needed: usize, detail: String },

    /// Any other storage I/O failure.
    #[error("Storage operation on '{key}' failed: {source}")]
    StorageFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// No history entry carries the requested id.
    #[error("No history entry with id '{id}'")]
    NotFound { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Whether repeating the same extraction call could plausibly succeed.
    ///
    /// Only collaborator failures qualify. A contract violation means the
    /// service answered; asking again is a policy the caller must opt into.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::ServiceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_anchor_display_names_json_key() {
        let e = ScanError::MissingAnchorField {
            field: CardField::CompanyName,
        };
        assert!(e.to_string().contains("'companyName'"), "got: {e}");
    }

    #[test]
    fn invalid_transition_display() {
        let e = ScanError::InvalidTransition {
            operation: "begin a scan",
            state: ScanStatus::Scanning,
        };
        assert_eq!(
            e.to_string(),
            "Cannot begin a scan while the scan session is scanning"
        );
    }

    #[test]
    fn quota_display() {
        let e = ScanError::StorageQuotaExceeded {
            needed: 6_000_000,
            detail: "limit is 5000000 bytes".into(),
        };
        assert!(e.to_string().contains("6000000"));
        assert!(e.to_string().contains("limit is 5000000 bytes"));
    }

    #[test]
    fn only_service_failures_are_retryable() {
        assert!(ScanError::ServiceUnavailable {
            detail: "503".into()
        }
        .is_retryable());
        assert!(!ScanError::EmptyResponse.is_retryable());
        assert!(!ScanError::MalformedResponse {
            detail: "x".into()
        }
        .is_retryable());
        assert!(!ScanError::NotFound { id: "1".into() }.is_retryable());
    }
}
