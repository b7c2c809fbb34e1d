//! Durable, retryable email-to-expense processing.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, StepError};
pub use runner::{Pipeline, RunOutcome};
