use ingest::DocumentClass;
use std::collections::BTreeSet;

use crate::schema::ExtractionMode;

/// Per-class wording for the extraction prompt
pub struct ClassProfile {
    pub role: &'static str,
    pub entity_focus: &'static str,
    pub root_guidance: &'static str,
    /// (preferred, synonym) pairs illustrating relationship reuse
    pub synonyms: &'static [(&'static str, &'static str)],
    pub example: &'static str,
}

pub fn class_profile(class: DocumentClass) -> ClassProfile {
    match class {
        DocumentClass::Resume => ClassProfile {
            role: "a resume parser",
            entity_focus: "the person, employers, job titles, schools, degrees, skills, certifications, publications and locations",
            root_guidance: "the full name of the person the resume belongs to, e.g. 'Bob Smith'",
            synonyms: &[
                ("HAS_AUTHORED", "AUTHORED_BY"),
                ("WORKS_AT", "EMPLOYED_BY"),
                ("HAS_EDUCATION", "STUDIED_AT"),
            ],
            example: r#"{
  "entities": ["Bob Smith", "University of California, Los Angeles", "Google", "Software Engineer", "Python"],
  "relationships": ["HAS_EDUCATION", "WORKS_AT", "HAS_ROLE", "HAS_SKILLS"],
  "cypher_queries": [
    "MERGE (p:Entity {name: 'Bob Smith'})",
    "MERGE (u:Entity {name: 'University of California, Los Angeles'})",
    "MATCH (p:Entity {name: 'Bob Smith'}), (u:Entity {name: 'University of California, Los Angeles'}) MERGE (p)-[:HAS_EDUCATION]->(u)",
    "MERGE (p:Entity {name: 'Bob Smith'})-[:WORKS_AT]->(g:Entity {name: 'Google'})",
    "MERGE (g:Entity {name: 'Google'})-[:HAS_ROLE]->(r:Entity {name: 'Software Engineer'})",
    "MERGE (p:Entity {name: 'Bob Smith'})-[:HAS_SKILLS]->(s:Entity {name: 'Python'})"
  ],
  "root_entity_name": "Bob Smith"
}"#,
        },
        DocumentClass::ScienceArticle => ClassProfile {
            role: "a scientific article parser",
            entity_focus: "the article, its authors, affiliations, methods, datasets, findings and technologies",
            root_guidance: "the title of the article",
            synonyms: &[
                ("HAS_AUTHOR", "WRITTEN_BY"),
                ("USES_METHOD", "APPLIES_METHOD"),
                ("HAS_AFFILIATION", "AFFILIATED_WITH"),
            ],
            example: r#"{
  "entities": ["Attention Is All You Need", "Ashish Vaswani", "Google Brain", "Transformer", "WMT 2014"],
  "relationships": ["HAS_AUTHOR", "HAS_AFFILIATION", "USES_METHOD", "USES_DATASET"],
  "cypher_queries": [
    "MERGE (a:Entity {name: 'Attention Is All You Need'})-[:HAS_AUTHOR]->(v:Entity {name: 'Ashish Vaswani'})",
    "MERGE (v:Entity {name: 'Ashish Vaswani'})-[:HAS_AFFILIATION]->(g:Entity {name: 'Google Brain'})",
    "MERGE (a:Entity {name: 'Attention Is All You Need'})-[:USES_METHOD]->(t:Entity {name: 'Transformer'})",
    "MERGE (a:Entity {name: 'Attention Is All You Need'})-[:USES_DATASET]->(d:Entity {name: 'WMT 2014'})"
  ],
  "root_entity_name": "Attention Is All You Need"
}"#,
        },
        DocumentClass::TechnicalDocument => ClassProfile {
            role: "a technical documentation parser",
            entity_focus: "the system being documented, its components, specifications, features, applications, requirements and performance figures",
            root_guidance: "the name of the system or product the document describes",
            synonyms: &[
                ("HAS_COMPONENT", "CONSISTS_OF"),
                ("HAS_SPECIFICATION", "SPECIFIED_AS"),
                ("REQUIRES", "DEPENDS_ON"),
            ],
            example: r#"{
  "entities": ["ARCS Controller", "CPU", "3.5GHz", "Remote Monitoring"],
  "relationships": ["HAS_COMPONENT", "HAS_SPECIFICATION", "HAS_FEATURE"],
  "cypher_queries": [
    "MERGE (s:Entity {name: 'ARCS Controller'})-[:HAS_COMPONENT]->(c:Entity {name: 'CPU'})",
    "MERGE (c:Entity {name: 'CPU'})-[:HAS_SPECIFICATION]->(f:Entity {name: '3.5GHz'})",
    "MERGE (s:Entity {name: 'ARCS Controller'})-[:HAS_FEATURE]->(m:Entity {name: 'Remote Monitoring'})"
  ],
  "root_entity_name": "ARCS Controller"
}"#,
        },
    }
}

fn render_vocabulary(vocabulary: &BTreeSet<String>) -> String {
    if vocabulary.is_empty() {
        "(none yet)".to_string()
    } else {
        vocabulary.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// JSON shape the model must return, used by both the extraction and repair prompts
pub fn schema_description(class: DocumentClass, mode: ExtractionMode) -> String {
    match mode {
        ExtractionMode::EdgeList => r#"{
  "entities": [string, ...],
  "relationships": [string, ...],
  "cypher_queries": [string, ...],
  "root_entity_name": string
}"#
        .to_string(),
        ExtractionMode::Category => {
            let keys: Vec<String> = class
                .categories()
                .iter()
                .map(|c| format!("  \"{}\": [string, ...]", c.key()))
                .collect();
            format!("{{\n  \"root_entity_name\": string,\n{}\n}}", keys.join(",\n"))
        }
    }
}

pub fn build_extraction_prompt(
    class: DocumentClass,
    mode: ExtractionMode,
    text: &str,
    vocabulary: &BTreeSet<String>,
) -> String {
    let profile = class_profile(class);
    let synonyms = profile
        .synonyms
        .iter()
        .map(|(keep, avoid)| format!("use {} rather than introducing {}", keep, avoid))
        .collect::<Vec<_>>()
        .join("; ");

    match mode {
        ExtractionMode::EdgeList => format!(
            r#"You are {role}. Extract entities, relationships and cypher queries to build a knowledge graph from the {class} below.

INSTRUCTIONS:
1. Entities: {focus}.
2. root_entity_name is {root}. It must be one of the entities.
3. Every entity must be reachable from the root entity by following relationships in their stated direction. Do not leave any entity disconnected.
4. Relationship names are UPPER_SNAKE_CASE verbs.
5. Reuse an existing relationship name whenever it expresses the same meaning ({synonyms}).
6. cypher_queries use MERGE with nodes written as (var:Entity {{name: '...'}}) and relationships as (a)-[:NAME]->(b).
7. Output ONLY the JSON object, no markdown, no explanations.

EXISTING RELATIONSHIPS:
{vocabulary}

SCHEMA:
{schema}

EXAMPLE:
{example}

{class} TEXT:
{text}

JSON OUTPUT:"#,
            role = profile.role,
            class = class,
            focus = profile.entity_focus,
            root = profile.root_guidance,
            synonyms = synonyms,
            vocabulary = render_vocabulary(vocabulary),
            schema = schema_description(class, mode),
            example = profile.example,
            text = text,
        ),
        ExtractionMode::Category => format!(
            r#"You are {role}. Extract root_entity_name ({root}) and the listed categories from the {class} below.

INSTRUCTIONS:
1. Each category is a list of short strings taken from the text. Use an empty list when a category does not apply.
2. Every item must belong to the root entity: it is linked to the root through its category, so only list items that describe the root entity. Nothing may be left disconnected from it.
3. Do not repeat the root entity inside a category.
4. Each category is stored under a relationship named HAS_<CATEGORY>. Where an existing relationship below expresses the same meaning, that name is reused ({synonyms}).
5. Output ONLY the JSON object, no markdown, no explanations.

EXISTING RELATIONSHIPS:
{vocabulary}

SCHEMA:
{schema}

{class} TEXT:
{text}

JSON OUTPUT:"#,
            role = profile.role,
            root = profile.root_guidance,
            class = class,
            synonyms = synonyms,
            vocabulary = render_vocabulary(vocabulary),
            schema = schema_description(class, mode),
            text = text,
        ),
    }
}

pub fn build_repair_prompt(
    raw_response: &str,
    error: &str,
    class: DocumentClass,
    mode: ExtractionMode,
) -> String {
    format!(
        r#"The following output does not match the required format:

{raw}

ERROR:
{error}

Reformat it so it matches this schema exactly. Do not add or remove information, only fix the structure.

SCHEMA:
{schema}

Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        raw = raw_response,
        error = error,
        schema = schema_description(class, mode),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_rendering() {
        let vocab: BTreeSet<String> = ["LIVES_IN", "HAS_EDUCATION"].iter().map(|s| s.to_string()).collect();
        let prompt = build_extraction_prompt(DocumentClass::Resume, ExtractionMode::EdgeList, "text", &vocab);
        assert!(prompt.contains("HAS_EDUCATION, LIVES_IN"));

        let empty = build_extraction_prompt(DocumentClass::Resume, ExtractionMode::EdgeList, "text", &BTreeSet::new());
        assert!(empty.contains("(none yet)"));
    }

    #[test]
    fn test_prompt_mentions_class_and_synonyms() {
        let prompt = build_extraction_prompt(
            DocumentClass::Resume,
            ExtractionMode::EdgeList,
            "Bob Smith, engineer",
            &BTreeSet::new(),
        );
        assert!(prompt.contains("resume parser"));
        assert!(prompt.contains("HAS_AUTHORED rather than introducing AUTHORED_BY"));
        assert!(prompt.contains("Bob Smith, engineer"));
    }

    #[test]
    fn test_category_prompt_asks_for_reuse_and_connectivity() {
        let vocab: BTreeSet<String> = ["HAS_SKILLS".to_string()].into();
        let prompt = build_extraction_prompt(DocumentClass::Resume, ExtractionMode::Category, "text", &vocab);

        assert!(prompt.contains("that name is reused"));
        assert!(prompt.contains("HAS_AUTHORED rather than introducing AUTHORED_BY"));
        assert!(prompt.contains("Nothing may be left disconnected"));
        assert!(prompt.contains("HAS_SKILLS"));
    }

    #[test]
    fn test_category_schema_lists_class_keys() {
        let schema = schema_description(DocumentClass::TechnicalDocument, ExtractionMode::Category);
        assert!(schema.contains("\"components\""));
        assert!(schema.contains("\"performance\""));
        assert!(!schema.contains("\"skills\""));
    }

    #[test]
    fn test_repair_prompt_carries_error_and_raw() {
        let prompt = build_repair_prompt(
            "{\"entities\": 3}",
            "field 'entities' must be a list of strings",
            DocumentClass::Resume,
            ExtractionMode::EdgeList,
        );
        assert!(prompt.contains("{\"entities\": 3}"));
        assert!(prompt.contains("must be a list of strings"));
        assert!(prompt.contains("cypher_queries"));
    }
}
