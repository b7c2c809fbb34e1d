//! Per-run state threaded through the pipeline steps.

use uuid::Uuid;

use crate::ai::ExpenseFields;
use crate::db::email_repo::EmailLedgerEntry;
use crate::email::ParsedEmail;
use crate::extract::ExtractedContent;

use super::error::StepError;

/// Accumulated state of one pipeline run. Each step fills in its output;
/// later steps read only what earlier steps produced.
#[derive(Debug, Default)]
pub struct PipelineContext {
    /// Correlation id for log lines of this run. Not persisted; resumed
    /// runs get a fresh one.
    pub run_id: String,
    pub email: Option<ParsedEmail>,
    pub ledger: Option<EmailLedgerEntry>,
    pub content: Option<ExtractedContent>,
    pub fields: Option<ExpenseFields>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn require_email(&self) -> Result<&ParsedEmail, StepError> {
        self.email.as_ref().ok_or(StepError::MissingPrerequisite {
            what: "parsed email",
        })
    }

    pub(crate) fn require_ledger(&self) -> Result<&EmailLedgerEntry, StepError> {
        self.ledger.as_ref().ok_or(StepError::MissingPrerequisite {
            what: "ledger entry",
        })
    }

    pub(crate) fn require_content(&self) -> Result<&ExtractedContent, StepError> {
        self.content.as_ref().ok_or(StepError::MissingPrerequisite {
            what: "extracted content",
        })
    }

    pub(crate) fn require_fields(&self) -> Result<&ExpenseFields, StepError> {
        self.fields.as_ref().ok_or(StepError::MissingPrerequisite {
            what: "validated expense fields",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty_with_run_id() {
        let ctx = PipelineContext::new();
        assert!(!ctx.run_id.is_empty());
        assert!(ctx.email.is_none());
        assert!(ctx.ledger.is_none());
        assert!(ctx.fields.is_none());
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(PipelineContext::new().run_id, PipelineContext::new().run_id);
    }
}
