//! Turning raw, possibly log-wrapped text into clean SQL statements.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ raw text  │────▶│  Extractor  │────▶│ Vec<ExtractedSql> │
//! └───────────┘     └─────────────┘     └──────────────────┘
//!                          │                      │
//!                    learns prefixes,             ▼
//!                    markers, indent     ┌──────────────────┐
//!                                        │    Classifier    │──▶ ClassificationResult
//!                                        └──────────────────┘
//! ```
//!
//! The extractor understands plain SQL files (split on `;` outside quotes)
//! and line-oriented logs (timestamp/marker prefixes, indented
//! continuations). `BEGIN ... COMMIT` spans are merged into a single
//! transaction-typed statement. The classifier trusts the extractor first
//! and only falls back to line heuristics when extraction finds nothing.

mod classifier;
mod extractor;

pub use classifier::{ClassificationResult, Confidence, InputType, classify};
pub use extractor::{
    ExtractedSql, ExtractionConfidence, LogFormat, SqlType, extract, learn_format,
    split_transaction
};
