//! Extraction prompt construction.
//!
//! Pure and deterministic: identical text and category list always produce
//! the identical prompt and schema, which replay-style tests rely on.

use serde_json::{json, Value};

/// Maximum number of characters of document text embedded in the prompt.
pub const MAX_PROMPT_TEXT_CHARS: usize = 4000;

/// A prompt and the output schema the model must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub prompt: String,
    pub schema: Value,
}

/// Sanitizes text for safe inclusion in LLM prompts.
///
/// Escapes ChatML tokens (`<|...|>`) and common instruction tokens to prevent
/// prompt injection from attacker-controlled receipt text.
fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

/// Builds the extraction prompt and output schema for a document.
///
/// The text is expected to be redacted already; this function only escapes
/// and truncates it.
pub fn build_extraction_prompt(text: &str, categories: &[String]) -> BuiltPrompt {
    let sanitized: String = sanitize_for_prompt(text)
        .chars()
        .take(MAX_PROMPT_TEXT_CHARS)
        .collect();

    let category_list = categories.join(", ");

    let prompt = format!(
        r#"You are an expense extraction assistant. Analyze the receipt or invoice text below and extract a single expense record.
Respond ONLY with valid JSON matching the required fields. Do not include any other text.

RULES:
- vendor: the merchant or service provider name
- expenseDate: the transaction date, formatted DD-MM-YYYY
- amountValue: the total amount as a number
- currencyCode: the 3-letter ISO currency code
- category: exactly one of: {categories}
- description: a short summary of what was purchased (may be empty)

Document text:
{text}"#,
        categories = category_list,
        text = sanitized,
    );

    let schema = json!({
        "type": "object",
        "required": [
            "vendor",
            "expenseDate",
            "amountValue",
            "currencyCode",
            "category",
            "description"
        ],
        "properties": {
            "vendor": { "type": "string" },
            "expenseDate": { "type": "string", "description": "DD-MM-YYYY" },
            "amountValue": { "type": "number" },
            "currencyCode": { "type": "string", "minLength": 3, "maxLength": 3 },
            "category": { "type": "string", "enum": categories },
            "description": { "type": "string" }
        }
    });

    BuiltPrompt { prompt, schema }
}
