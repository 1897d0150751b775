use thiserror::Error;

use crate::llm::LlmError;
use crate::schema::SchemaValidationError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("extraction failed after repair: initial error: {initial}; after repair: {repaired}")]
    ExtractionFailure {
        initial: SchemaValidationError,
        repaired: SchemaValidationError,
    },
}
