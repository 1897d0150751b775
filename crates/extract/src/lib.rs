pub mod anchor;
pub mod cypher;
pub mod error;
pub mod llm;
pub mod normalizer;
pub mod parse;
pub mod prompt;
pub mod repair;
pub mod schema;

pub use error::ExtractError;
pub use llm::{LanguageModel, LlmError, MockModel, OllamaClient, OpenAiClient};
pub use normalizer::RelationshipNormalizer;
pub use repair::OutputRepairStage;
pub use schema::{
    CategoryBucket, Edge, ExtractionMode, ExtractionResult, InvalidRelType, RelType,
    SchemaValidationError,
};

use ingest::DocumentClass;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub mode: ExtractionMode,
    pub max_text_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::EdgeList,
            max_text_chars: 60_000,
        }
    }
}

/// Turns document text into a validated `ExtractionResult` with one model call,
/// plus at most one repair call when the first response is malformed.
pub struct Extractor<M: LanguageModel> {
    model: M,
    config: ExtractorConfig,
}

impl<M: LanguageModel> Extractor<M> {
    pub fn new(model: M, config: ExtractorConfig) -> Self {
        Self { model, config }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.config.mode
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Extract entities and relationships from the text of one document
    pub async fn extract(
        &self,
        text: &str,
        class: DocumentClass,
        vocabulary: &BTreeSet<String>,
    ) -> Result<ExtractionResult, ExtractError> {
        let text = truncate_chars(text, self.config.max_text_chars);
        let mode = self.config.mode;

        let prompt = prompt::build_extraction_prompt(class, mode, text, vocabulary);
        debug!(class = %class, ?mode, prompt_chars = prompt.len(), "Sending extraction prompt");

        let raw = self.model.generate(&prompt).await?;

        let result = match parse::parse_response(&raw, class, mode, vocabulary) {
            Ok(result) => result,
            Err(initial) => {
                OutputRepairStage::new(&self.model)
                    .repair(&raw, initial, class, mode, vocabulary)
                    .await?
            }
        };

        info!(
            class = %class,
            root = %result.root_entity_name,
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            edges = result.edges.len(),
            "Extraction complete"
        );
        Ok(result)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            warn!(max_chars, total_chars = text.chars().count(), "Truncating document text");
            &text[..cut]
        }
        None => text,
    }
}
