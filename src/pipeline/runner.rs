//! The ingestion pipeline runner.
//!
//! A run walks one email through parse, ledger recording, text extraction,
//! model classification, expense insertion, and finalization. Step outputs
//! are committed to the durable step log before the next step starts, so a
//! crashed run can be re-driven by re-delivering the same message: committed
//! steps are reused, uncommitted ones re-execute.

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::ai::{self, ExpenseExtractor, ExpenseFields};
use crate::db::email_repo::{self, EmailLedgerEntry, EmailStatus, NewLedgerEntry};
use crate::db::error::DatabaseError;
use crate::db::expense_repo::{self, NewExpense};
use crate::db::{category_repo, step_repo, Database};
use crate::email;
use crate::extract::{self, ExtractedContent};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, StepError};

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub ledger_id: i64,
    pub expense_id: Option<i64>,
    /// The ledger already showed this email as processed; nothing was redone.
    pub already_processed: bool,
    /// False when the final status update failed. The expense row is in
    /// place either way; the status catches up on a later delivery.
    pub finalized: bool,
}

/// The email-to-expense ingestion pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    db: Database,
    extractor: Arc<dyn ExpenseExtractor>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, db: Database, extractor: Arc<dyn ExpenseExtractor>) -> Self {
        Self {
            config,
            db,
            extractor,
        }
    }

    /// Processes one raw inbound email end to end.
    ///
    /// Safe to call repeatedly with the same message: the ledger's unique
    /// message id plus the step log make re-delivery a cheap no-op or a
    /// resume, never a duplicate expense.
    pub async fn run(&self, raw: &[u8]) -> Result<RunOutcome, PipelineError> {
        let mut ctx = PipelineContext::new();
        let span = info_span!("pipeline", run_id = %ctx.run_id);
        self.run_inner(raw, &mut ctx).instrument(span).await
    }

    async fn run_inner(
        &self,
        raw: &[u8],
        ctx: &mut PipelineContext,
    ) -> Result<RunOutcome, PipelineError> {
        // Parsing is pure and fatal on failure; there is no ledger row yet
        // to mark, so the error just surfaces to the caller.
        let parsed = email::parse_email(raw).map_err(|e| PipelineError::Step {
            step: "parse_email",
            source: e.into(),
        })?;
        let message_id = parsed.message_id.clone();
        info!(
            "Processing email {} from {}",
            message_id, parsed.from_address
        );
        ctx.email = Some(parsed);

        let ctx_ref: &PipelineContext = ctx;
        let ledger = self
            .run_step("record_initial", move || self.step_record(ctx_ref))
            .await?;
        let ledger_id = ledger.id;

        if ledger.status == EmailStatus::Processed {
            info!("Email {} already processed, skipping", message_id);
            let expense_id = expense_repo::find_by_email_id(&self.db, ledger_id)
                .map_err(|e| PipelineError::Step {
                    step: "record_initial",
                    source: StepError::Database(e),
                })?
                .first()
                .map(|row| row.id);
            return Ok(RunOutcome {
                run_id: ctx.run_id.clone(),
                ledger_id,
                expense_id,
                already_processed: true,
                finalized: true,
            });
        }
        ctx.ledger = Some(ledger);

        match self.run_steps(ctx).await {
            Ok(expense_id) => {
                let finalized = self.finalize(ledger_id, &message_id);
                Ok(RunOutcome {
                    run_id: ctx.run_id.clone(),
                    ledger_id,
                    expense_id: Some(expense_id),
                    already_processed: false,
                    finalized,
                })
            }
            Err(err) => {
                warn!("Pipeline failed for {}: {}", message_id, err);
                if let Err(mark_err) = email_repo::mark_failed(&self.db, ledger_id) {
                    warn!("Failed to mark {} failed: {}", message_id, mark_err);
                }
                Err(err)
            }
        }
    }

    async fn run_steps(&self, ctx: &mut PipelineContext) -> Result<i64, PipelineError> {
        let ctx_ref: &PipelineContext = ctx;
        let content = self
            .run_step("extract_text", move || self.step_extract(ctx_ref))
            .await?;
        ctx.content = Some(content);

        let ctx_ref: &PipelineContext = ctx;
        let fields = self
            .run_step("classify", move || self.step_classify(ctx_ref))
            .await?;
        ctx.fields = Some(fields);

        let ctx_ref: &PipelineContext = ctx;
        self.run_step("insert_expense", move || self.step_insert(ctx_ref))
            .await
    }

    /// Drives one step through its retry budget: each attempt runs under
    /// the per-step timeout, and retryable failures wait out the fixed
    /// delay before the next attempt.
    async fn run_step<T, F, Fut>(&self, step: &'static str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let span = info_span!("step", name = step);
        async {
            let mut attempt: u32 = 0;
            loop {
                if attempt > 0 {
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                let err = match tokio::time::timeout(self.config.step_timeout(), op()).await {
                    Ok(Ok(value)) => {
                        if attempt > 0 {
                            info!("Step {} succeeded on attempt {}", step, attempt + 1);
                        }
                        return Ok(value);
                    }
                    Ok(Err(e)) => e,
                    Err(_) => StepError::Timeout(self.config.step_timeout()),
                };
                if err.is_retryable() && attempt < self.config.max_retries {
                    attempt += 1;
                    warn!("Step {} failed, retrying (attempt {}): {}", step, attempt, err);
                    continue;
                }
                return Err(PipelineError::Step { step, source: err });
            }
        }
        .instrument(span)
        .await
    }

    /// Records the email in the ledger, treating a duplicate message id as
    /// an already-recorded email rather than an error.
    async fn step_record(&self, ctx: &PipelineContext) -> Result<EmailLedgerEntry, StepError> {
        let parsed = ctx.require_email()?;
        let entry = NewLedgerEntry {
            message_id: parsed.message_id.clone(),
            subject: parsed.subject.clone(),
            from_address: parsed.from_address.clone(),
            received_at: parsed.received_at.clone(),
            is_reimbursable: self.config.default_reimbursable,
        };
        match email_repo::insert_pending(&self.db, &entry) {
            Ok(id) => debug!("Recorded ledger entry {} for {}", id, parsed.message_id),
            Err(DatabaseError::UniqueViolation(_)) => {
                debug!("Ledger entry already exists for {}", parsed.message_id)
            }
            Err(e) => return Err(e.into()),
        }
        email_repo::find_by_message_id(&self.db, &parsed.message_id)?.ok_or(
            StepError::MissingPrerequisite {
                what: "ledger entry for recorded message",
            },
        )
    }

    /// Selects and redacts the candidate expense text, reusing a committed
    /// output when the step already ran for this message.
    async fn step_extract(&self, ctx: &PipelineContext) -> Result<ExtractedContent, StepError> {
        let parsed = ctx.require_email()?;
        let mut had_unreadable = false;
        if let Some(cached) = step_repo::find(&self.db, &parsed.message_id, "extract_text")? {
            match serde_json::from_value::<ExtractedContent>(cached) {
                Ok(content) => {
                    debug!("Reusing committed extract_text output for {}", parsed.message_id);
                    return Ok(content);
                }
                Err(_) => {
                    warn!(
                        "Unreadable extract_text output for {}, recomputing",
                        parsed.message_id
                    );
                    had_unreadable = true;
                }
            }
        }

        let mut content = extract::extract_content(parsed)?;
        content.text = self.config.redaction.redact(&content.text);
        debug!(
            "Extracted {} chars from source '{}'",
            content.text.len(),
            content.source.as_str()
        );

        let output = serde_json::to_value(&content).map_err(DatabaseError::from)?;
        self.commit_step(&parsed.message_id, "extract_text", &output, had_unreadable)?;
        Ok(content)
    }

    /// Builds the prompt, calls the model, and validates the response.
    /// Retrying this step re-invokes the model.
    async fn step_classify(&self, ctx: &PipelineContext) -> Result<ExpenseFields, StepError> {
        let parsed = ctx.require_email()?;
        let content = ctx.require_content()?;

        let mut had_unreadable = false;
        if let Some(cached) = step_repo::find(&self.db, &parsed.message_id, "classify")? {
            match serde_json::from_value::<ExpenseFields>(cached) {
                Ok(fields) => {
                    debug!("Reusing committed classify output for {}", parsed.message_id);
                    return Ok(fields);
                }
                Err(_) => {
                    warn!(
                        "Unreadable classify output for {}, recomputing",
                        parsed.message_id
                    );
                    had_unreadable = true;
                }
            }
        }

        let categories = category_repo::active_names(&self.db)?;
        // Empty content still goes to the model; a refusal surfaces as a
        // validation failure, which is the record we want.
        let built = ai::build_extraction_prompt(&content.text, &categories);
        let raw = self.extractor.extract(&built.prompt, &built.schema).await?;
        let fields = ai::validate(&raw, &categories)?;

        let output = serde_json::to_value(&fields).map_err(DatabaseError::from)?;
        self.commit_step(&parsed.message_id, "classify", &output, had_unreadable)?;
        Ok(fields)
    }

    /// Inserts the expense row linked to the ledger entry.
    async fn step_insert(&self, ctx: &PipelineContext) -> Result<i64, StepError> {
        let parsed = ctx.require_email()?;
        let ledger = ctx.require_ledger()?;
        let fields = ctx.require_fields()?;

        let mut had_unreadable = false;
        if let Some(cached) = step_repo::find(&self.db, &parsed.message_id, "insert_expense")? {
            match cached.as_i64() {
                Some(id) => {
                    debug!("Reusing committed insert_expense output for {}", parsed.message_id);
                    return Ok(id);
                }
                None => {
                    warn!(
                        "Unreadable insert_expense output for {}, recomputing",
                        parsed.message_id
                    );
                    had_unreadable = true;
                }
            }
        }

        // A crash between the insert and its step-log commit would otherwise
        // duplicate the row on resume.
        let existing = expense_repo::find_by_email_id(&self.db, ledger.id)?;
        if let Some(row) = existing.first() {
            self.commit_step(&parsed.message_id, "insert_expense", &json!(row.id), had_unreadable)?;
            return Ok(row.id);
        }

        if email_repo::find_by_id(&self.db, ledger.id)?.is_none() {
            return Err(StepError::MissingPrerequisite {
                what: "ledger entry for expense insert",
            });
        }

        let expense = NewExpense {
            email_id: ledger.id,
            amount: fields.amount,
            currency: fields.currency.clone(),
            description: fields.description.clone(),
            expense_date: fields.expense_date.clone(),
            category: fields.category.clone(),
            vendor: fields.vendor.clone(),
            is_reimbursable: ledger.is_reimbursable,
        };
        let id = expense_repo::insert(&self.db, &expense)?;
        info!("Inserted expense {} for email {}", id, parsed.message_id);
        self.commit_step(&parsed.message_id, "insert_expense", &json!(id), had_unreadable)?;
        Ok(id)
    }

    /// Commits a step output. First committed output wins, unless the
    /// existing output was found unreadable, in which case the recomputed
    /// one must overwrite it or every future resume recomputes.
    fn commit_step(
        &self,
        message_id: &str,
        step_name: &str,
        output: &serde_json::Value,
        overwrite: bool,
    ) -> Result<(), StepError> {
        if overwrite {
            step_repo::replace(&self.db, message_id, step_name, output)?;
        } else {
            step_repo::record(&self.db, message_id, step_name, output)?;
        }
        Ok(())
    }

    /// Marks the ledger entry processed and clears the step log.
    ///
    /// Best effort: a failure here leaves the expense row in place and the
    /// entry pending, which a later re-delivery repairs.
    fn finalize(&self, ledger_id: i64, message_id: &str) -> bool {
        match email_repo::mark_processed(&self.db, ledger_id) {
            Ok(true) => {
                if let Err(e) = step_repo::clear_for_message(&self.db, message_id) {
                    warn!("Failed to clear step log for {}: {}", message_id, e);
                }
                true
            }
            Ok(false) => {
                warn!(
                    "Finalize found no ledger row {} for {}",
                    ledger_id, message_id
                );
                false
            }
            Err(e) => {
                warn!("Failed to mark {} processed: {}", message_id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::ai::ExtractorError;
    use crate::db::email_repo;

    struct ScriptedExtractor {
        responses: Mutex<VecDeque<Result<Value, ExtractorError>>>,
        delay: Option<Duration>,
    }

    impl ScriptedExtractor {
        fn new(responses: Vec<Result<Value, ExtractorError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ExpenseExtractor for ScriptedExtractor {
        async fn extract(&self, _prompt: &str, _schema: &Value) -> Result<Value, ExtractorError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ExtractorError::Request("script exhausted".into())))
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            max_retries: 2,
            retry_delay_ms: 1,
            step_timeout_ms: 5_000,
            ..Default::default()
        }
    }

    fn valid_model_response() -> Value {
        json!({
            "vendor": "Acme",
            "expenseDate": "02-02-2026",
            "amountValue": 42.5,
            "currencyCode": "USD",
            "category": "Meals",
            "description": "Lunch"
        })
    }

    fn raw_email(message_id: &str) -> Vec<u8> {
        format!(
            "Message-ID: <{message_id}>\r\n\
             From: Billing <billing@acme.test>\r\n\
             To: expenses@corp.test\r\n\
             Subject: Receipt\r\n\
             Date: Mon, 2 Feb 2026 09:00:00 +0000\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             Invoice from Acme 42.50 USD\r\n"
        )
        .into_bytes()
    }

    fn pipeline(responses: Vec<Result<Value, ExtractorError>>) -> Pipeline {
        Pipeline::new(
            test_config(),
            Database::open_in_memory().unwrap(),
            Arc::new(ScriptedExtractor::new(responses)),
        )
    }

    #[tokio::test]
    async fn test_happy_path() {
        let pipeline = pipeline(vec![Ok(valid_model_response())]);
        let outcome = pipeline.run(&raw_email("run1@test")).await.unwrap();

        assert!(outcome.expense_id.is_some());
        assert!(outcome.finalized);
        assert!(!outcome.already_processed);

        let entry = email_repo::find_by_id(&pipeline.db, outcome.ledger_id)
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, EmailStatus::Processed);
    }

    #[tokio::test]
    async fn test_transient_model_failure_is_retried() {
        let pipeline = pipeline(vec![
            Err(ExtractorError::Request("connection reset".into())),
            Ok(valid_model_response()),
        ]);
        let outcome = pipeline.run(&raw_email("retry@test")).await.unwrap();
        assert!(outcome.expense_id.is_some());
    }

    #[tokio::test]
    async fn test_retries_exhausted_marks_failed() {
        let pipeline = pipeline(vec![]);
        let err = pipeline.run(&raw_email("fail@test")).await.unwrap_err();
        assert_eq!(err.step_name(), "classify");

        let entry = email_repo::find_by_message_id(&pipeline.db, "fail@test")
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, EmailStatus::Failed);
    }

    #[tokio::test]
    async fn test_unparseable_email_is_fatal_and_leaves_no_ledger_row() {
        let pipeline = pipeline(vec![Ok(valid_model_response())]);
        let err = pipeline.run(b"From: x@y\r\n\r\nno message id").await.unwrap_err();
        assert_eq!(err.step_name(), "parse_email");
        assert_eq!(email_repo::count_all(&pipeline.db).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slow_model_call_times_out() {
        let mut extractor = ScriptedExtractor::new(vec![Ok(valid_model_response())]);
        extractor.delay = Some(Duration::from_millis(100));

        let config = PipelineConfig {
            max_retries: 0,
            retry_delay_ms: 1,
            step_timeout_ms: 10,
            ..Default::default()
        };
        let pipeline = Pipeline::new(
            config,
            Database::open_in_memory().unwrap(),
            Arc::new(extractor),
        );

        let err = pipeline.run(&raw_email("slow@test")).await.unwrap_err();
        assert_eq!(err.step_name(), "classify");
        assert!(matches!(err.step_error(), StepError::Timeout(_)));
    }
}
