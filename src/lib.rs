//! # SQL Source Tracer Library
//!
//! Correlates captured SQL with the Rails code that produced it.
//!
//! # Pipeline
//!
//! ```text
//! raw text ──► normalizer ──► single statement ──► query::analyze ──► progressive
//!                  │                                                      │
//!                  └────► transaction log ──► transaction ──► source ◄────┘
//! ```
//!
//! - [`normalizer`] - Pull SQL out of log text and classify it
//! - [`query`] - Semantic analysis of one statement
//! - [`rules`] - Clause-specific Rails search rules
//! - [`search`] - Line search over the project tree
//! - [`progressive`] - Narrow-then-validate search and ranking
//! - [`transaction`] - Transaction reconstruction and pattern detection
//! - [`tools`] - The two tool entry points and their result contracts
//! - [`output`] - Text, JSON and YAML rendering
//! - [`config`] - Configuration loading and heuristic thresholds
//! - [`error`] - Error types and constructors

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod inflect;
pub mod logging;
pub mod normalizer;
pub mod output;
pub mod progressive;
pub mod query;
pub mod rules;
pub mod search;
pub mod tools;
pub mod transaction;
