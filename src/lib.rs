//! Turns inbound receipt emails into validated expense records.
//!
//! The flow: parse the raw MIME message, record it in an idempotent email
//! ledger, pick the candidate text (PDF attachment first, then the body),
//! redact configured PII, ask a language model for structured expense
//! fields, validate them strictly, and insert the expense row linked to the
//! ledger entry. Every step past parsing commits its output to a durable
//! step log, so re-delivering a message resumes instead of duplicating.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use receipted::{Database, HttpExtractor, Pipeline, PipelineConfig};
//!
//! # async fn run(raw: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(Path::new("receipts.db"))?;
//! let extractor = Arc::new(HttpExtractor::new("http://localhost:9000/extract"));
//! let pipeline = Pipeline::new(PipelineConfig::default(), db, extractor);
//!
//! let outcome = pipeline.run(raw).await?;
//! println!("expense id: {:?}", outcome.expense_id);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod db;
pub mod email;
pub mod extract;
pub mod pipeline;
pub mod redact;

pub use ai::{ExpenseExtractor, ExpenseFields, ExtractorError, HttpExtractor, ValidationError};
pub use db::error::DatabaseError;
pub use db::Database;
pub use email::{parse_email, EmailParseError, ParsedEmail};
pub use extract::{ContentSource, ExtractedContent};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunOutcome, StepError};
pub use redact::RedactionConfig;
