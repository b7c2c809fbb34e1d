//! PII redaction before text leaves the process boundary.
//!
//! Operator-configured literal strings are substituted with fixed
//! placeholder labels before extracted text is embedded in a model prompt.
//! This is best-effort literal replacement: it does not detect PII patterns,
//! only the exact strings it was configured with.

use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_NAME: &str = "[REDACTED_NAME]";
pub const PLACEHOLDER_EMAIL: &str = "[REDACTED_EMAIL]";
pub const PLACEHOLDER_ADDRESS: &str = "[REDACTED_ADDRESS]";
pub const PLACEHOLDER_POSTAL_CODE: &str = "[REDACTED_POSTAL_CODE]";

/// Literal personal identifiers to scrub from text sent to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub postal_address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl RedactionConfig {
    /// Replaces every occurrence of each configured literal with its
    /// placeholder.
    ///
    /// Longer literals are applied first so a postal code embedded in the
    /// full postal address does not break the address match.
    pub fn redact(&self, text: &str) -> String {
        let mut literals: Vec<(&str, &str)> = [
            (self.payee_name.as_deref(), PLACEHOLDER_NAME),
            (self.email.as_deref(), PLACEHOLDER_EMAIL),
            (self.postal_address.as_deref(), PLACEHOLDER_ADDRESS),
            (self.postal_code.as_deref(), PLACEHOLDER_POSTAL_CODE),
        ]
        .into_iter()
        .filter_map(|(literal, placeholder)| {
            literal
                .filter(|l| !l.is_empty())
                .map(|l| (l, placeholder))
        })
        .collect();

        literals.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = text.to_string();
        for (literal, placeholder) in literals {
            out = out.replace(literal, placeholder);
        }
        out
    }
}
