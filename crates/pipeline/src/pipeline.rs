use extract::{ExtractError, Extractor, LanguageModel};
use index::{GraphMaterializer, GraphStore, MaterializeReport, RelationshipVocabulary, audit_connectivity};
use ingest::{DocumentClass, SourceReadError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::metrics::{RunMetrics, TimedOperation};

/// Fatal failure for one document. Other documents in a batch are unaffected.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Source(#[from] SourceReadError),

    #[error(transparent)]
    Extraction(#[from] ExtractError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub file_name: String,
    pub class: DocumentClass,
    pub root_entity: String,
    pub entities: Vec<String>,
    pub relationships: Vec<String>,
    pub edges: usize,
    pub materialize: MaterializeReport,
    /// Entities the File node cannot reach after writing
    pub disconnected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<DocumentReport>,
    pub failed: Vec<DocumentFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read, extract and materialize documents one at a time
pub struct Pipeline<M: LanguageModel, S: GraphStore> {
    extractor: Extractor<M>,
    store: S,
    metrics: Arc<RunMetrics>,
    vocabulary_files: Option<Vec<String>>,
}

impl<M: LanguageModel, S: GraphStore> Pipeline<M, S> {
    pub fn new(extractor: Extractor<M>, store: S) -> Self {
        Self {
            extractor,
            store,
            metrics: RunMetrics::new(),
            vocabulary_files: None,
        }
    }

    /// Restrict the vocabulary snapshot to relationships reachable from these File nodes
    pub fn with_vocabulary_scope(mut self, files: Vec<String>) -> Self {
        self.vocabulary_files = Some(files);
        self
    }

    pub fn metrics(&self) -> Arc<RunMetrics> {
        self.metrics.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn vocabulary(&self) -> BTreeSet<String> {
        let vocabulary = RelationshipVocabulary::new(&self.store);
        let snapshot = match &self.vocabulary_files {
            Some(files) => vocabulary.snapshot_for_files(files).await,
            None => vocabulary.snapshot().await,
        };
        snapshot.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read relationship vocabulary, extracting without it");
            BTreeSet::new()
        })
    }

    pub async fn process_document(&self, path: &Path, class: DocumentClass) -> Result<DocumentReport, DocumentError> {
        let span = info_span!("document", file = %path.display(), class = %class);
        let result = self.run_document(path, class).instrument(span).await;
        self.metrics.record_document(result.is_ok());
        result
    }

    async fn run_document(&self, path: &Path, class: DocumentClass) -> Result<DocumentReport, DocumentError> {
        let timer = TimedOperation::start();
        let document = ingest::load_document(path, class).await?;
        self.metrics.record_read(timer.elapsed());
        info!(file = %document.file_name, chars = document.text.len(), "Document loaded");

        let vocabulary = self.vocabulary().await;

        let timer = TimedOperation::start();
        let result = self.extractor.extract(&document.text, class, &vocabulary).await?;
        self.metrics
            .record_extract(timer.elapsed(), result.entities.len(), result.edges.len());

        let timer = TimedOperation::start();
        let materialize = GraphMaterializer::new(&self.store).materialize(&document, &result).await;
        self.metrics
            .record_write(timer.elapsed(), materialize.attempted, materialize.failures.len());

        let disconnected = match audit_connectivity(&self.store, &document, &result).await {
            Ok(missing) => missing,
            Err(e) => {
                warn!(file = %document.file_name, error = %e, "Connectivity audit failed");
                Vec::new()
            }
        };
        if !disconnected.is_empty() {
            warn!(file = %document.file_name, entities = ?disconnected, "Entities not reachable from File node");
        }

        Ok(DocumentReport {
            file_name: document.file_name.clone(),
            class,
            root_entity: result.root_entity_name.clone(),
            entities: result.distinct_entities(),
            relationships: result.relationships.iter().map(|r| r.to_string()).collect(),
            edges: result.edges.len(),
            materialize,
            disconnected,
        })
    }

    /// Process every job in order; a failed document never stops the next one
    pub async fn process_batch(&self, jobs: &[(PathBuf, DocumentClass)]) -> BatchReport {
        let mut report = BatchReport::default();

        for (path, class) in jobs {
            match self.process_document(path, *class).await {
                Ok(document) => report.succeeded.push(document),
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Document failed");
                    report.failed.push(DocumentFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        report
    }
}
