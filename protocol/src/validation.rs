//! Content validation.
//!
//! The same check runs twice: in the client before a transaction is built,
//! and inside the tweet program when the ledger executes it. Length is
//! measured in Unicode scalar values (`char`s), never bytes, so both sides
//! agree regardless of how the text is encoded in transit.
//!
//! Empty content is accepted here. A collaborator that wants to forbid
//! empty posts does so on its own side.

use thiserror::Error;

use crate::config::MAX_CONTENT_CHARS;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The tweet is too long: {length} characters (max {max})")]
    ContentTooLong { length: usize, max: usize },
}

/// Number of Unicode scalar values in `content`.
pub fn content_length(content: &str) -> usize {
    content.chars().count()
}

/// Accepts content of at most [`MAX_CONTENT_CHARS`] scalar values.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    let length = content_length(content);
    if length > MAX_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            length,
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}
