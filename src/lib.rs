//! # edgequake-cardscan
//!
//! Turn a photo of a business card into a structured contact record using a
//! Vision Language Model (VLM), and keep a local history of saved scans.
//!
//! ## Why this crate?
//!
//! OCR gives you lines of text; it does not tell you which line is the job
//! title and which is the company. A VLM reads the card the way a person
//! does, and when it is asked for a fixed JSON shape the answer can be
//! validated field by field. This crate owns that contract: what is asked
//! for, what is accepted, and what happens to the session when the answer is
//! wrong.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Input     read a local file or download from URL
//!  ├─ 2. Codec     sniff PNG/JPEG/WebP → data: URI
//!  ├─ 3. Session   idle → scanning (one extraction in flight)
//!  ├─ 4. VLM       one request: instruction + JSON schema + image
//!  ├─ 5. Contract  parse and validate the answer against the schema
//!  ├─ 6. Session   scanning → success | error
//!  └─ 7. History   optional save, newest first, persisted as one JSON blob
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_cardscan::{FileStore, Orchestrator, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ScanConfig::default();
//!     let storage = FileStore::open("./cardscan-data")?;
//!     let mut scanner = Orchestrator::from_config(config, storage);
//!
//!     let record = scanner.handle_capture_input("card.jpg").await?;
//!     println!("{} <{}>", record.name, record.email);
//!
//!     let entry = scanner.handle_save()?;
//!     eprintln!("saved as {}", entry.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cardscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-cardscan = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Model
//!
//! Cards are small and mostly text, so the cheapest vision models do well.
//!
//! | Model | Quality | Best for |
//! |-------|---------|----------|
//! | `gpt-4.1-nano` | ★★★ | Default — fast, cheap |
//! | `gpt-4.1-mini` | ★★★★ | Dense or handwritten cards |
//! | `gemini-2.0-flash` | ★★★ | Alternative cheap option |
//! | `claude-sonnet-4-20250514` | ★★★★★ | Unusual layouts, non-Latin scripts |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder, DEFAULT_HISTORY_KEY};
pub use error::ScanError;
pub use history::{EntryId, FileStore, HistoryEntry, HistoryStore, KeyValueStore, MemoryStore};
pub use orchestrator::Orchestrator;
pub use pipeline::contract::{ExtractionRequest, FieldSchema, FieldSpec};
pub use pipeline::llm::{ExtractionService, LlmExtractionService};
pub use progress::{NoopScanObserver, ScanObserver, ScanObserverRef};
pub use record::{BusinessCardRecord, CardField};
pub use session::{ScanSession, ScanStatus};
