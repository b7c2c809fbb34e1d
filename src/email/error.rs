//! Email parsing error types.

use thiserror::Error;

/// Errors from decoding raw inbound email bytes.
///
/// All of these are fatal for the run: malformed input cannot become valid
/// by retrying.
#[derive(Error, Debug)]
pub enum EmailParseError {
    /// The bytes could not be decoded as a MIME message.
    #[error("Failed to parse email message")]
    Malformed,

    /// The message carries no Message-ID header, so it cannot be tracked
    /// idempotently in the ledger.
    #[error("Email has no Message-ID header")]
    MissingMessageId,

    /// The message carries no usable From address.
    #[error("Email has no From address")]
    MissingFrom,
}

pub type Result<T> = std::result::Result<T, EmailParseError>;
