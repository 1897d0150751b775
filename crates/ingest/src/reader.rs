use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::SourceReadError;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "md"];

pub struct FileReader;

impl FileReader {
    /// Read the full text of a document. PDFs are extracted page by page in page order.
    pub async fn read_file(path: &Path) -> Result<String, SourceReadError> {
        if !path.exists() {
            return Err(SourceReadError::NotFound(path.to_path_buf()));
        }

        let extension = extension_of(path);

        let text = match extension.as_str() {
            "txt" | "md" => fs::read_to_string(path)
                .await
                .map_err(|source| SourceReadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?,
            "pdf" => {
                let bytes = fs::read(path).await.map_err(|source| SourceReadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                extract_pdf_text(path, bytes).await?
            }
            _ => {
                return Err(SourceReadError::Unsupported {
                    path: path.to_path_buf(),
                    extension,
                });
            }
        };

        if text.trim().is_empty() {
            return Err(SourceReadError::Empty(path.to_path_buf()));
        }

        debug!(path = %path.display(), chars = text.len(), "Read document text");
        Ok(text)
    }

    /// List every supported file under `dir`, sorted so batch runs are deterministic
    pub fn read_directory(dir: &Path) -> Result<Vec<PathBuf>, SourceReadError> {
        if !dir.exists() {
            return Err(SourceReadError::NotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| SourceReadError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
            {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

async fn extract_pdf_text(path: &Path, bytes: Vec<u8>) -> Result<String, SourceReadError> {
    // pdf-extract is CPU bound and synchronous
    let result = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|inner| inner);

    result.map_err(|detail| SourceReadError::Pdf {
        path: path.to_path_buf(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.txt");
        std::fs::write(&path, "My name is Alice Johnson.").unwrap();

        let text = FileReader::read_file(&path).await.unwrap();
        assert_eq!(text, "My name is Alice Johnson.");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let result = FileReader::read_file(Path::new("/definitely/not/here.pdf")).await;
        assert!(matches!(result, Err(SourceReadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        std::fs::write(&path, "binary").unwrap();

        let result = FileReader::read_file(&path).await;
        assert!(matches!(result, Err(SourceReadError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.md");
        std::fs::write(&path, "  \n\n ").unwrap();

        let result = FileReader::read_file(&path).await;
        assert!(matches!(result, Err(SourceReadError::Empty(_))));
    }

    #[tokio::test]
    async fn test_corrupt_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, "this is not a pdf").unwrap();

        let result = FileReader::read_file(&path).await;
        assert!(matches!(result, Err(SourceReadError::Pdf { .. })));
    }

    #[test]
    fn test_read_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), "x").unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join("notes.docx"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.MD"), "x").unwrap();

        let files = FileReader::read_directory(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.txt", "b.pdf", "nested/c.MD"]);
    }
}
