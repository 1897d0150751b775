pub mod answerer;
pub mod error;
pub mod guard;
pub mod prompts;
pub mod retry;

pub use answerer::{Answer, GraphQuestionAnswerer};
pub use error::QueryError;
pub use retry::{RetryError, RetryPolicy};
