//! Pipeline stages for turning a card image into a validated record.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ codec ──▶ contract ──▶ llm ──▶ contract
//! (path/URL) (data URI) (request)  (VLM)   (validate)
//! ```
//!
//! 1. [`input`]    — read the image bytes from disk or download them
//! 2. [`codec`]    — sniff the format and wrap the bytes as a `data:` URI;
//!    strip the prefix again when building the request
//! 3. [`contract`] — build the request (image + instruction + schema) and
//!    validate the raw answer against the schema
//! 4. [`llm`]      — the [`llm::ExtractionService`] seam and its VLM-backed
//!    implementation; the only stage with network I/O to the model

pub mod codec;
pub mod contract;
pub mod input;
pub mod llm;
