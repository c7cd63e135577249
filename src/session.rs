//! The scan lifecycle as an explicit state machine.
//!
//! ```text
//!  Idle ──begin_scan──▶ Scanning ──resolve──▶ Success
//!   │                     │
//!   │                     └───────fail────▶ Error
//!   └──load_from_history──────────────────▶ Success
//!
//!  Success | Error | Idle ──reset──▶ Idle
//!  Success | Error ──begin_scan──▶ Scanning
//! ```
//!
//! The state carries its own data, so "exactly one of record / error in a
//! terminal state" and "nothing left over in `Idle`" hold by construction.
//! While `Scanning`, only `resolve` or `fail` can move the session on: there
//! is no cancel, and a second `begin_scan` is rejected so at most one
//! extraction is ever in flight.

use crate::error::ScanError;
use crate::history::HistoryEntry;
use crate::record::BusinessCardRecord;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// The four observable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Scanning,
    Success,
    Error,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Success => "success",
            ScanStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    Scanning {
        image: String,
    },
    Success {
        image: String,
        record: BusinessCardRecord,
    },
    Error {
        image: String,
        message: String,
    },
}

/// The currently displayed image and extraction outcome.
///
/// Owned by the orchestrator; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSession {
    state: State,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ScanStatus {
        match self.state {
            State::Idle => ScanStatus::Idle,
            State::Scanning { .. } => ScanStatus::Scanning,
            State::Success { .. } => ScanStatus::Success,
            State::Error { .. } => ScanStatus::Error,
        }
    }

    /// The image being scanned or shown, as a data URI.
    pub fn current_image(&self) -> Option<&str> {
        match &self.state {
            State::Idle => None,
            State::Scanning { image }
            | State::Success { image, .. }
            | State::Error { image, .. } => Some(image),
        }
    }

    pub fn current_record(&self) -> Option<&BusinessCardRecord> {
        match &self.state {
            State::Success { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            State::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, State::Scanning { .. })
    }

    /// Start scanning `image`. Rejected while another scan is in flight.
    pub fn begin_scan(&mut self, image: impl Into<String>) -> Result<(), ScanError> {
        self.require(!self.is_scanning(), "begin a scan")?;
        self.transition(State::Scanning {
            image: image.into(),
        });
        Ok(())
    }

    /// Complete the in-flight scan with a validated record.
    pub fn resolve(&mut self, record: BusinessCardRecord) -> Result<(), ScanError> {
        let image = self.take_scanning_image("resolve a scan")?;
        self.transition(State::Success { image, record });
        Ok(())
    }

    /// Complete the in-flight scan with a user-readable failure message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ScanError> {
        let image = self.take_scanning_image("fail a scan")?;
        self.transition(State::Error {
            image,
            message: message.into(),
        });
        Ok(())
    }

    /// Drop the current image and outcome. Rejected while scanning.
    pub fn reset(&mut self) -> Result<(), ScanError> {
        self.require(!self.is_scanning(), "reset")?;
        self.transition(State::Idle);
        Ok(())
    }

    /// Show a saved entry without calling the extraction service.
    /// Only legal from `Idle`.
    pub fn load_from_history(&mut self, entry: &HistoryEntry) -> Result<(), ScanError> {
        self.require(self.status() == ScanStatus::Idle, "load a history entry")?;
        self.transition(State::Success {
            image: entry.image_snapshot.clone(),
            record: entry.record.clone(),
        });
        Ok(())
    }

    fn take_scanning_image(&mut self, operation: &'static str) -> Result<String, ScanError> {
        if let State::Scanning { image } = &mut self.state {
            return Ok(std::mem::take(image));
        }
        Err(self.rejected(operation))
    }

    fn require(&self, ok: bool, operation: &'static str) -> Result<(), ScanError> {
        if ok {
            Ok(())
        } else {
            Err(self.rejected(operation))
        }
    }

    fn rejected(&self, operation: &'static str) -> ScanError {
        ScanError::InvalidTransition {
            operation,
            state: self.status(),
        }
    }

    fn transition(&mut self, next: State) {
        let from = self.status();
        self.state = next;
        debug!("Scan session: {} → {}", from, self.status());
    }
}
