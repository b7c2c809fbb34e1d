//! Pipeline configuration with serde defaults, so a partial config file
//! (or none at all) yields a working pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::redact::RedactionConfig;

/// Retry, timeout, and redaction settings for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// PII literals scrubbed before text reaches the model.
    #[serde(default)]
    pub redaction: RedactionConfig,

    /// Extra attempts after the first failure of a retryable step.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts. No exponential backoff.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt deadline for a single step.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Reimbursable flag recorded on new ledger entries. The flag drives
    /// the derived expense status, not which steps run.
    #[serde(default = "default_reimbursable")]
    pub default_reimbursable: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_step_timeout_ms() -> u64 {
    30_000
}

fn default_reimbursable() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            redaction: RedactionConfig::default(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            step_timeout_ms: default_step_timeout_ms(),
            default_reimbursable: default_reimbursable(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.step_timeout(), Duration::from_secs(30));
        assert!(config.default_reimbursable);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay_ms, 500);
        assert!(config.redaction.payee_name.is_none());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.step_timeout_ms, 30_000);
    }

    #[test]
    fn test_redaction_nested_parse() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"redaction": {"payee_name": "Jamie Doe"}}"#,
        )
        .unwrap();
        assert_eq!(config.redaction.payee_name.as_deref(), Some("Jamie Doe"));
    }
}
