use ingest::DocumentClass;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::llm::LanguageModel;
use crate::parse::parse_response;
use crate::prompt::build_repair_prompt;
use crate::schema::{ExtractionMode, ExtractionResult, SchemaValidationError};

/// Gives a malformed response exactly one reformatting pass through the model.
pub struct OutputRepairStage<'a, M: LanguageModel> {
    model: &'a M,
}

impl<'a, M: LanguageModel> OutputRepairStage<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    pub async fn repair(
        &self,
        raw_response: &str,
        initial: SchemaValidationError,
        class: DocumentClass,
        mode: ExtractionMode,
        vocabulary: &BTreeSet<String>,
    ) -> Result<ExtractionResult, ExtractError> {
        info!(error = %initial, "Asking model to repair malformed response");

        let prompt = build_repair_prompt(raw_response, &initial.to_string(), class, mode);
        let repaired_raw = self.model.generate(&prompt).await?;

        parse_response(&repaired_raw, class, mode, vocabulary).map_err(|repaired| {
            warn!(initial = %initial, repaired = %repaired, "Repaired response still invalid");
            ExtractError::ExtractionFailure { initial, repaired }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockModel};

    const VALID: &str = r#"{"entities": ["Bob"], "relationships": [], "cypher_queries": [], "root_entity_name": "Bob"}"#;

    #[tokio::test]
    async fn test_single_repair_call() {
        let model = MockModel::new([VALID]);
        let stage = OutputRepairStage::new(&model);

        let result = stage
            .repair(
                "{entities: Bob",
                SchemaValidationError::InvalidJson("expected value".to_string()),
                DocumentClass::Resume,
                ExtractionMode::EdgeList,
                &BTreeSet::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.root_entity_name, "Bob");
        assert_eq!(model.call_count(), 1);
        assert!(model.prompts()[0].contains("{entities: Bob"));
        assert!(model.prompts()[0].contains("expected value"));
    }

    #[tokio::test]
    async fn test_failure_carries_both_errors() {
        let model = MockModel::new([r#"{"entities": []}"#]);
        let stage = OutputRepairStage::new(&model);

        let err = stage
            .repair(
                "garbage",
                SchemaValidationError::InvalidJson("expected value".to_string()),
                DocumentClass::Resume,
                ExtractionMode::EdgeList,
                &BTreeSet::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExtractError::ExtractionFailure {
                initial: SchemaValidationError::InvalidJson("expected value".to_string()),
                repaired: SchemaValidationError::MissingField("relationships".to_string()),
            }
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_category_response_repaired() {
        let model = MockModel::new([r#"{"root_entity_name": "Bob Smith", "skills": ["Rust", "SQL"]}"#]);
        let stage = OutputRepairStage::new(&model);

        let result = stage
            .repair(
                r#"{"root_entity_name": "Bob Smith", "skills": "Rust, SQL"}"#,
                SchemaValidationError::WrongType {
                    field: "skills".to_string(),
                    expected: "a list of strings",
                },
                DocumentClass::Resume,
                ExtractionMode::Category,
                &BTreeSet::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].items, vec!["Rust", "SQL"]);
        assert_eq!(result.categories[0].rel_type.as_str(), "HAS_SKILLS");
        // the repair prompt carries the category schema, not the edge-list one
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("\"skills\": [string, ...]"));
        assert!(!prompt.contains("cypher_queries"));
    }

    #[tokio::test]
    async fn test_category_repair_failure() {
        let model = MockModel::new([r#"{"skills": ["Rust"]}"#]);
        let stage = OutputRepairStage::new(&model);

        let err = stage
            .repair(
                "skills: Rust",
                SchemaValidationError::InvalidJson("expected value".to_string()),
                DocumentClass::Resume,
                ExtractionMode::Category,
                &BTreeSet::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExtractError::ExtractionFailure {
                initial: SchemaValidationError::InvalidJson("expected value".to_string()),
                repaired: SchemaValidationError::MissingField("root_entity_name".to_string()),
            }
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = MockModel::default();
        model.push_error(LlmError::Request {
            provider: "mock",
            detail: "connection refused".to_string(),
        });
        let stage = OutputRepairStage::new(&model);

        let err = stage
            .repair(
                "garbage",
                SchemaValidationError::NotAnObject,
                DocumentClass::Resume,
                ExtractionMode::EdgeList,
                &BTreeSet::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Llm(_)));
    }
}
