//! Strict validation of model output against the expense schema.
//!
//! The model is untrusted: every field is checked and normalized here
//! before anything reaches the database. Failures name the offending
//! field so operators can see what the model got wrong.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single schema violation in the model response.
#[derive(Error, Debug)]
#[error("Invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validated, normalized expense fields ready for insertion.
///
/// `expense_date` is ISO (`YYYY-MM-DD`), `currency` is uppercase, and
/// `category` is the canonical category name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFields {
    pub vendor: String,
    pub expense_date: String,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub description: String,
}

/// Validates a raw model response against the expense schema.
///
/// `categories` is the list of canonical category names; matching is
/// case-insensitive but the canonical spelling is what gets stored.
pub fn validate(raw: &Value, categories: &[String]) -> Result<ExpenseFields, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::new("response", "expected a JSON object"))?;

    let vendor = require_string(obj, "vendor")?;
    let vendor = vendor.trim();
    if vendor.is_empty() {
        return Err(ValidationError::new("vendor", "must not be empty"));
    }

    let expense_date = normalize_date(require_string(obj, "expenseDate")?)?;

    let amount = obj
        .get("amountValue")
        .and_then(Value::as_f64)
        .ok_or_else(|| ValidationError::new("amountValue", "must be a number"))?;

    let currency = require_string(obj, "currencyCode")?;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            "currencyCode",
            format!("expected a 3-letter code, got '{currency}'"),
        ));
    }
    let currency = currency.to_ascii_uppercase();

    let category_raw = require_string(obj, "category")?;
    let category = categories
        .iter()
        .find(|c| c.eq_ignore_ascii_case(category_raw.trim()))
        .cloned()
        .ok_or_else(|| {
            ValidationError::new("category", format!("'{category_raw}' is not a known category"))
        })?;

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(ValidationError::new("description", "must be a string")),
    };

    Ok(ExpenseFields {
        vendor: vendor.to_string(),
        expense_date,
        amount,
        currency,
        category,
        description,
    })
}

fn require_string<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
        None => Err(ValidationError::new(field, "is missing")),
    }
}

/// Parses a `DD-MM-YYYY` date and reformats it as `YYYY-MM-DD`.
///
/// The shape is checked literally before the calendar check, so ambiguous
/// forms like `5-1-2026` are rejected rather than guessed at.
fn normalize_date(raw: &str) -> Result<String, ValidationError> {
    let shape_ok = raw.len() == 10
        && raw.as_bytes()[2] == b'-'
        && raw.as_bytes()[5] == b'-'
        && raw
            .bytes()
            .enumerate()
            .all(|(i, b)| (i == 2 || i == 5) || b.is_ascii_digit());
    if !shape_ok {
        return Err(ValidationError::new(
            "expenseDate",
            format!("expected DD-MM-YYYY, got '{raw}'"),
        ));
    }

    let date = NaiveDate::parse_from_str(raw, "%d-%m-%Y").map_err(|_| {
        ValidationError::new("expenseDate", format!("'{raw}' is not a valid date"))
    })?;

    Ok(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn categories() -> Vec<String> {
        vec![
            "Meals".to_string(),
            "Travel".to_string(),
            "Office Supplies".to_string(),
            "Other".to_string(),
        ]
    }

    fn valid_response() -> Value {
        json!({
            "vendor": "Acme Diner",
            "expenseDate": "05-01-2026",
            "amountValue": 42.5,
            "currencyCode": "usd",
            "category": "meals",
            "description": "Team lunch"
        })
    }

    #[test]
    fn test_valid_response_is_normalized() {
        let fields = validate(&valid_response(), &categories()).unwrap();
        assert_eq!(fields.vendor, "Acme Diner");
        assert_eq!(fields.expense_date, "2026-01-05");
        assert_eq!(fields.amount, 42.5);
        assert_eq!(fields.currency, "USD");
        assert_eq!(fields.category, "Meals");
        assert_eq!(fields.description, "Team lunch");
    }

    #[test]
    fn test_missing_currency_names_the_field() {
        let mut raw = valid_response();
        raw.as_object_mut().unwrap().remove("currencyCode");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "currencyCode");
    }

    #[test]
    fn test_empty_vendor_rejected() {
        let mut raw = valid_response();
        raw["vendor"] = json!("   ");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "vendor");
    }

    #[test]
    fn test_date_round_trip() {
        let mut raw = valid_response();
        raw["expenseDate"] = json!("31-12-2025");
        let fields = validate(&raw, &categories()).unwrap();
        assert_eq!(fields.expense_date, "2025-12-31");

        let back = NaiveDate::parse_from_str(&fields.expense_date, "%Y-%m-%d").unwrap();
        assert_eq!(back.format("%d-%m-%Y").to_string(), "31-12-2025");
    }

    #[test]
    fn test_unpadded_date_rejected() {
        let mut raw = valid_response();
        raw["expenseDate"] = json!("5-1-2026");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "expenseDate");
    }

    #[test]
    fn test_iso_date_rejected() {
        let mut raw = valid_response();
        raw["expenseDate"] = json!("2026-01-05");
        assert!(validate(&raw, &categories()).is_err());
    }

    #[test]
    fn test_impossible_date_rejected() {
        let mut raw = valid_response();
        raw["expenseDate"] = json!("31-02-2026");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "expenseDate");
    }

    #[test]
    fn test_amount_as_string_rejected() {
        let mut raw = valid_response();
        raw["amountValue"] = json!("42.50");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "amountValue");
    }

    #[test]
    fn test_four_letter_currency_rejected() {
        let mut raw = valid_response();
        raw["currencyCode"] = json!("EURO");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "currencyCode");
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut raw = valid_response();
        raw["category"] = json!("Entertainment");
        let err = validate(&raw, &categories()).unwrap_err();
        assert_eq!(err.field, "category");
    }

    #[test]
    fn test_category_case_insensitive_canonicalized() {
        let mut raw = valid_response();
        raw["category"] = json!("OFFICE SUPPLIES");
        let fields = validate(&raw, &categories()).unwrap();
        assert_eq!(fields.category, "Office Supplies");
    }

    #[test]
    fn test_missing_description_defaults_empty() {
        let mut raw = valid_response();
        raw.as_object_mut().unwrap().remove("description");
        let fields = validate(&raw, &categories()).unwrap();
        assert_eq!(fields.description, "");
    }

    #[test]
    fn test_null_description_defaults_empty() {
        let mut raw = valid_response();
        raw["description"] = Value::Null;
        let fields = validate(&raw, &categories()).unwrap();
        assert_eq!(fields.description, "");
    }

    #[test]
    fn test_non_object_response_rejected() {
        let err = validate(&json!("just text"), &categories()).unwrap_err();
        assert_eq!(err.field, "response");
    }
}
