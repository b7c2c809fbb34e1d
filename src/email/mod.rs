//! Inbound email decoding.

pub mod error;
pub mod parser;

pub use error::EmailParseError;
pub use parser::{parse_email, Attachment, ParsedEmail};
