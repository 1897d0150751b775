use extract::LlmError;
use index::GraphStoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] GraphStoreError),

    #[error("refusing to run generated statement ({reason}): {statement}")]
    UnsafeQuery { statement: String, reason: String },

    #[error("graph query failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: GraphStoreError },
}
