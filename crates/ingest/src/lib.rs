pub mod document;
pub mod error;
pub mod reader;

pub use document::{Category, Document, DocumentClass, UnknownDocumentClass, generate_doc_id};
pub use error::SourceReadError;
pub use reader::FileReader;

use std::path::{Path, PathBuf};

/// Read a file and wrap it as a `Document` of the given class
pub async fn load_document(path: &Path, class: DocumentClass) -> Result<Document, SourceReadError> {
    let text = FileReader::read_file(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(Document::new(file_name, path.to_path_buf(), class, text))
}

/// Expand a path into the files to ingest: the file itself, or every supported file in a directory
pub fn discover(path: &Path) -> Result<Vec<PathBuf>, SourceReadError> {
    if path.is_dir() {
        FileReader::read_directory(path)
    } else if path.exists() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(SourceReadError::NotFound(path.to_path_buf()))
    }
}
