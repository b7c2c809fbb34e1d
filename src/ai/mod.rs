//! Model-backed expense extraction: prompt building, the extractor seam,
//! and strict validation of what comes back.

pub mod extractor;
pub mod prompt;
pub mod validate;

pub use extractor::{ExpenseExtractor, ExtractorError, HttpExtractor};
pub use prompt::{build_extraction_prompt, BuiltPrompt};
pub use validate::{validate, ExpenseFields, ValidationError};
