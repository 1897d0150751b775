use std::path::PathBuf;
use thiserror::Error;

/// Text extraction failed. Fatal for the document, never retried.
#[derive(Error, Debug)]
pub enum SourceReadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file format '{extension}': {path}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable PDF {path}: {detail}")]
    Pdf { path: PathBuf, detail: String },

    #[error("no text could be extracted from {0}")]
    Empty(PathBuf),
}
