use ingest::DocumentClass;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

use crate::cypher;
use crate::normalizer::RelationshipNormalizer;
use crate::schema::{CategoryBucket, Edge, ExtractionMode, ExtractionResult, SchemaValidationError};

/// Cut the JSON object out of a response that may carry code fences or prose around it
pub fn strip_to_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn string_list(obj: &Map<String, Value>, field: &str, required: bool) -> Result<Vec<String>, SchemaValidationError> {
    let value = match obj.get(field) {
        Some(Value::Null) | None if !required => return Ok(Vec::new()),
        Some(value) => value,
        None => return Err(SchemaValidationError::MissingField(field.to_string())),
    };

    let wrong_type = || SchemaValidationError::WrongType {
        field: field.to_string(),
        expected: "a list of strings",
    };

    value
        .as_array()
        .ok_or_else(wrong_type)?
        .iter()
        .map(|item| item.as_str().map(|s| s.trim().to_string()).ok_or_else(wrong_type))
        .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
        .collect()
}

fn root_name(obj: &Map<String, Value>) -> Result<String, SchemaValidationError> {
    let root = obj
        .get("root_entity_name")
        .ok_or_else(|| SchemaValidationError::MissingField("root_entity_name".to_string()))?
        .as_str()
        .ok_or_else(|| SchemaValidationError::WrongType {
            field: "root_entity_name".to_string(),
            expected: "a string",
        })?
        .trim()
        .to_string();

    if root.is_empty() {
        return Err(SchemaValidationError::EmptyRootEntity);
    }
    Ok(root)
}

/// Parse and validate a raw model response into an `ExtractionResult`.
///
/// Relationship names are normalized against `vocabulary`; names that cannot be
/// made into a valid relationship type are dropped with a warning.
pub fn parse_response(
    raw: &str,
    class: DocumentClass,
    mode: ExtractionMode,
    vocabulary: &BTreeSet<String>,
) -> Result<ExtractionResult, SchemaValidationError> {
    let value: Value = serde_json::from_str(strip_to_json(raw))
        .map_err(|e| SchemaValidationError::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(SchemaValidationError::NotAnObject)?;

    let mut normalizer = RelationshipNormalizer::new(vocabulary);

    match mode {
        ExtractionMode::EdgeList => parse_edge_list(obj, class, &mut normalizer),
        ExtractionMode::Category => parse_categories(obj, class, &mut normalizer),
    }
}

fn parse_edge_list(
    obj: &Map<String, Value>,
    class: DocumentClass,
    normalizer: &mut RelationshipNormalizer,
) -> Result<ExtractionResult, SchemaValidationError> {
    let entities = string_list(obj, "entities", true)?;
    let raw_relationships = string_list(obj, "relationships", true)?;
    let cypher_queries = string_list(obj, "cypher_queries", true)?;
    let root_entity_name = root_name(obj)?;

    if !entities.contains(&root_entity_name) && root_entity_name != class.root_node_name() {
        return Err(SchemaValidationError::RootNotAnEntity(root_entity_name));
    }

    let mut relationships = Vec::new();
    for name in &raw_relationships {
        match normalizer.normalize(name) {
            Some(rel) if !relationships.contains(&rel) => relationships.push(rel),
            Some(_) => {}
            None => warn!(relationship = %name, "Dropping invalid relationship name"),
        }
    }

    let mut edges = Vec::new();
    for (source, name, target) in cypher::parse_edges(&cypher_queries) {
        let Some(rel_type) = normalizer.normalize(&name) else {
            warn!(relationship = %name, source = %source, target = %target, "Dropping edge with invalid relationship name");
            continue;
        };
        if !relationships.contains(&rel_type) {
            relationships.push(rel_type.clone());
        }
        let edge = Edge {
            source: source.trim().to_string(),
            rel_type,
            target: target.trim().to_string(),
        };
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    // Edge endpoints the model forgot to list still become entities
    let mut entities = entities;
    for edge in &edges {
        for name in [&edge.source, &edge.target] {
            if !entities.contains(name) {
                entities.push(name.clone());
            }
        }
    }

    Ok(ExtractionResult {
        entities,
        relationships,
        edges,
        categories: Vec::new(),
        root_entity_name,
    })
}

fn parse_categories(
    obj: &Map<String, Value>,
    class: DocumentClass,
    normalizer: &mut RelationshipNormalizer,
) -> Result<ExtractionResult, SchemaValidationError> {
    let root_entity_name = root_name(obj)?;

    let mut entities = vec![root_entity_name.clone()];
    let mut relationships = Vec::new();
    let mut categories = Vec::new();

    for &category in class.categories() {
        let items: Vec<String> = string_list(obj, category.key(), false)?
            .into_iter()
            .filter(|item| item != &root_entity_name)
            .collect();
        if items.is_empty() {
            continue;
        }

        let Some(rel_type) = normalizer.normalize(&category.relationship()) else {
            warn!(category = category.key(), "Skipping category with no valid relationship name");
            continue;
        };
        if !relationships.contains(&rel_type) {
            relationships.push(rel_type.clone());
        }
        for item in &items {
            entities.push(item.clone());
        }
        categories.push(CategoryBucket {
            category,
            rel_type,
            items,
        });
    }

    Ok(ExtractionResult {
        entities,
        relationships,
        edges: Vec::new(),
        categories,
        root_entity_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::Category;

    const ALICE: &str = r#"{
        "entities": ["Alice Johnson", "IBM", "Data Scientist", "Karachi"],
        "relationships": ["has experience", "LIVES_IN"],
        "cypher_queries": [
            "MERGE (a:Entity {name: 'Alice Johnson'})-[:HAS_EXPERIENCE]->(i:Entity {name: 'IBM'})",
            "MERGE (a:Entity {name: 'Alice Johnson'})-[:hasExperience]->(d:Entity {name: 'Data Scientist'})",
            "MERGE (a:Entity {name: 'Alice Johnson'})-[:LIVES_IN]->(k:Entity {name: 'Karachi'})"
        ],
        "root_entity_name": "Alice Johnson"
    }"#;

    fn edges_of(result: &ExtractionResult) -> Vec<(String, String, String)> {
        result
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.rel_type.to_string(), e.target.clone()))
            .collect()
    }

    #[test]
    fn test_parse_edge_list() {
        let result = parse_response(ALICE, DocumentClass::Resume, ExtractionMode::EdgeList, &BTreeSet::new()).unwrap();

        assert_eq!(result.root_entity_name, "Alice Johnson");
        assert_eq!(
            result.relationships.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            vec!["HAS_EXPERIENCE", "LIVES_IN"]
        );
        assert_eq!(edges_of(&result).len(), 3);
        assert!(result.unanchored_entities().is_empty());
    }

    #[test]
    fn test_vocabulary_spelling_reused() {
        let vocab: BTreeSet<String> = ["HASEXPERIENCE".to_string()].into_iter().collect();
        let result = parse_response(ALICE, DocumentClass::Resume, ExtractionMode::EdgeList, &vocab).unwrap();

        assert!(result.edges.iter().filter(|e| e.target != "Karachi").all(|e| e.rel_type.as_str() == "HASEXPERIENCE"));
    }

    #[test]
    fn test_fenced_response() {
        let raw = format!("Here is the graph:\n```json\n{}\n```\nDone.", ALICE);
        assert!(parse_response(&raw, DocumentClass::Resume, ExtractionMode::EdgeList, &BTreeSet::new()).is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let parse = |raw: &str| parse_response(raw, DocumentClass::Resume, ExtractionMode::EdgeList, &BTreeSet::new());

        assert!(matches!(parse("not json"), Err(SchemaValidationError::InvalidJson(_))));
        assert!(matches!(parse("[1, 2]"), Err(SchemaValidationError::InvalidJson(_)) | Err(SchemaValidationError::NotAnObject)));
        assert_eq!(
            parse(r#"{"entities": [], "relationships": [], "root_entity_name": "X"}"#),
            Err(SchemaValidationError::MissingField("cypher_queries".to_string()))
        );
        assert!(matches!(
            parse(r#"{"entities": "Alice", "relationships": [], "cypher_queries": [], "root_entity_name": "Alice"}"#),
            Err(SchemaValidationError::WrongType { .. })
        ));
        assert_eq!(
            parse(r#"{"entities": ["Alice"], "relationships": [], "cypher_queries": [], "root_entity_name": "  "}"#),
            Err(SchemaValidationError::EmptyRootEntity)
        );
        assert_eq!(
            parse(r#"{"entities": ["Alice"], "relationships": [], "cypher_queries": [], "root_entity_name": "Bob"}"#),
            Err(SchemaValidationError::RootNotAnEntity("Bob".to_string()))
        );
    }

    #[test]
    fn test_class_root_accepted_as_root_entity() {
        let raw = r#"{"entities": ["Rust"], "relationships": [], "cypher_queries": [], "root_entity_name": "resume"}"#;
        let result = parse_response(raw, DocumentClass::Resume, ExtractionMode::EdgeList, &BTreeSet::new()).unwrap();
        assert_eq!(result.root_entity_name, "resume");
    }

    #[test]
    fn test_invalid_relationship_dropped() {
        let raw = r#"{
            "entities": ["Alice"],
            "relationships": ["2ND_JOB", "--"],
            "cypher_queries": [],
            "root_entity_name": "Alice"
        }"#;
        let result = parse_response(raw, DocumentClass::Resume, ExtractionMode::EdgeList, &BTreeSet::new()).unwrap();
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn test_parse_categories() {
        let raw = r#"{
            "root_entity_name": "Bob Smith",
            "skills": ["Rust", "SQL"],
            "education": ["MIT"],
            "publications": null
        }"#;
        let result = parse_response(raw, DocumentClass::Resume, ExtractionMode::Category, &BTreeSet::new()).unwrap();

        assert_eq!(result.entities, vec!["Bob Smith", "Rust", "SQL", "MIT"]);
        assert_eq!(
            result.relationships.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            vec!["HAS_SKILLS", "HAS_EDUCATION"]
        );
        assert_eq!(result.categories.len(), 2);
        assert_eq!(result.categories[0].category, Category::Skills);
        assert!(result.unanchored_entities().is_empty());
    }

    #[test]
    fn test_category_relationship_uses_vocabulary_spelling() {
        let raw = r#"{"root_entity_name": "Bob Smith", "skills": ["Rust"]}"#;
        let vocab: BTreeSet<String> = ["HASSKILLS".to_string()].into();
        let result = parse_response(raw, DocumentClass::Resume, ExtractionMode::Category, &vocab).unwrap();

        assert_eq!(result.relationships[0].as_str(), "HASSKILLS");
        assert_eq!(result.categories[0].rel_type.as_str(), "HASSKILLS");
    }

    #[test]
    fn test_category_wrong_type() {
        let raw = r#"{"root_entity_name": "Bob", "skills": "Rust"}"#;
        assert!(matches!(
            parse_response(raw, DocumentClass::Resume, ExtractionMode::Category, &BTreeSet::new()),
            Err(SchemaValidationError::WrongType { .. })
        ));
    }
}
