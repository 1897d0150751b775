pub mod config;
pub mod metrics;
pub mod pipeline;

pub use config::{AppConfig, LlmProvider, LogFormat};
pub use metrics::{MetricsSnapshot, RunMetrics, TimedOperation};
pub use pipeline::{BatchReport, DocumentError, DocumentFailure, DocumentReport, Pipeline};
