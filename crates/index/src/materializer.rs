use extract::{ExtractionResult, RelType};
use ingest::Document;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use crate::statements::{
    BELONGS_TO, DESCRIBES, GraphRead, GraphWrite, HAS_ENTITY, HAS_FILE, HAS_VALUE, NodeLabel, Row,
};
use crate::store::{GraphStore, GraphStoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub statement: String,
    pub error: String,
}

/// Outcome of one best-effort materialization
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterializeReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<WriteFailure>,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn fixed(name: &str) -> Option<RelType> {
    RelType::new(name).ok()
}

fn edge(source: &str, rel_type: RelType, target: &str) -> GraphWrite {
    GraphWrite::MergeEdge {
        source: source.to_string(),
        rel_type,
        target: target.to_string(),
    }
}

/// Collects writes in order while skipping repeated entity upserts
struct Plan {
    writes: Vec<GraphWrite>,
    merged: HashSet<String>,
}

impl Plan {
    fn push(&mut self, write: GraphWrite) {
        if !self.writes.contains(&write) {
            self.writes.push(write);
        }
    }

    fn entity(&mut self, name: &str) {
        if self.merged.insert(name.to_string()) {
            self.writes.push(GraphWrite::MergeNode {
                name: name.to_string(),
                label: NodeLabel::Entity,
            });
        }
    }
}

/// The fixed write sequence for one document, as pure data.
///
/// Class root and File come first so every later edge can match its endpoints.
pub fn plan_writes(document: &Document, result: &ExtractionResult) -> Vec<GraphWrite> {
    let class = document.class;
    let class_root = class.root_node_name();
    let file = document.file_name.as_str();
    let root = result.root_entity_name.as_str();

    let mut plan = Plan {
        writes: Vec::new(),
        merged: HashSet::new(),
    };

    plan.push(GraphWrite::MergeNode {
        name: class_root.to_string(),
        label: NodeLabel::ClassRoot,
    });
    plan.push(GraphWrite::MergeFile {
        name: file.to_string(),
        doc_id: document.doc_id.clone(),
        file_type: document.file_type(),
    });
    plan.writes.extend(fixed(BELONGS_TO).map(|rel| edge(file, rel, class_root)));

    plan.entity(root);
    for entity in result.distinct_entities() {
        plan.entity(&entity);
    }
    plan.push(GraphWrite::MergeNode {
        name: root.to_string(),
        label: NodeLabel::Root(class),
    });

    for e in &result.edges {
        plan.entity(&e.source);
        plan.entity(&e.target);
        plan.push(edge(&e.source, e.rel_type.clone(), &e.target));
    }

    for bucket in &result.categories {
        let category_node = bucket.category.node_name(root);
        plan.push(GraphWrite::MergeNode {
            name: category_node.clone(),
            label: NodeLabel::Category(bucket.category),
        });
        plan.push(edge(root, bucket.rel_type.clone(), &category_node));
        for item in &bucket.items {
            plan.entity(item);
            if let Some(rel) = fixed(HAS_VALUE) {
                plan.push(edge(&category_node, rel, item));
            }
        }
    }

    for orphan in result.unanchored_entities() {
        if let Some(rel) = fixed(HAS_ENTITY) {
            plan.push(edge(root, rel, &orphan));
        }
    }

    plan.writes.extend(fixed(HAS_FILE).map(|rel| edge(root, rel, file)));
    plan.writes.extend(fixed(DESCRIBES).map(|rel| edge(file, rel, root)));

    plan.writes
}

/// Writes extraction results into the graph store, one statement at a time
pub struct GraphMaterializer<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> GraphMaterializer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run the write plan. A failed write is logged and skipped.
    pub async fn materialize(&self, document: &Document, result: &ExtractionResult) -> MaterializeReport {
        let writes = plan_writes(document, result);
        let mut report = MaterializeReport {
            attempted: writes.len(),
            ..MaterializeReport::default()
        };

        for write in &writes {
            match self.store.write(write).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!(file = %document.file_name, statement = %write, error = %e, "Graph write failed, skipping");
                    report.failures.push(WriteFailure {
                        statement: write.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            file = %document.file_name,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "Materialization finished"
        );
        report
    }
}

/// Extracted entities with no directed path from the document's File node
pub async fn audit_connectivity<S: GraphStore + ?Sized>(
    store: &S,
    document: &Document,
    result: &ExtractionResult,
) -> Result<Vec<String>, GraphStoreError> {
    let rows = store
        .read(&GraphRead::FileSubgraph {
            file: document.file_name.clone(),
        })
        .await?;

    let mut reachable: BTreeSet<String> = BTreeSet::new();
    for row in rows {
        if let Row::Relationship { start, end, .. } = row {
            reachable.insert(start);
            reachable.insert(end);
        }
    }

    Ok(result
        .distinct_entities()
        .into_iter()
        .chain(std::iter::once(result.root_entity_name.clone()))
        .filter(|name| !reachable.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraphStore;
    use extract::{CategoryBucket, Edge};
    use ingest::{Category, DocumentClass};
    use std::path::PathBuf;

    fn rel(name: &str) -> RelType {
        RelType::new(name).unwrap()
    }

    fn alice_document() -> Document {
        Document::new(
            "alice.pdf".to_string(),
            PathBuf::from("docs/alice.pdf"),
            DocumentClass::Resume,
            "My name is Alice Johnson. I worked at IBM as a Data Scientist.".to_string(),
        )
    }

    fn alice_result() -> ExtractionResult {
        ExtractionResult {
            entities: vec!["Alice Johnson".into(), "IBM".into(), "Data Scientist".into(), "IBM".into()],
            relationships: vec![rel("HAS_EXPERIENCE"), rel("WORKS_AT")],
            edges: vec![
                Edge {
                    source: "Alice Johnson".into(),
                    rel_type: rel("HAS_EXPERIENCE"),
                    target: "Data Scientist".into(),
                },
                Edge {
                    source: "Data Scientist".into(),
                    rel_type: rel("WORKS_AT"),
                    target: "IBM".into(),
                },
            ],
            categories: vec![],
            root_entity_name: "Alice Johnson".into(),
        }
    }

    #[test]
    fn test_plan_order() {
        let writes = plan_writes(&alice_document(), &alice_result());

        assert_eq!(
            writes[0],
            GraphWrite::MergeNode {
                name: "resume".into(),
                label: NodeLabel::ClassRoot
            }
        );
        assert!(matches!(&writes[1], GraphWrite::MergeFile { name, .. } if name == "alice.pdf"));
        assert_eq!(writes[2], edge("alice.pdf", rel("BELONGS_TO"), "resume"));
        assert_eq!(writes[writes.len() - 2], edge("Alice Johnson", rel("HAS_FILE"), "alice.pdf"));
        assert_eq!(writes[writes.len() - 1], edge("alice.pdf", rel("DESCRIBES"), "Alice Johnson"));

        let entity_merges = writes
            .iter()
            .filter(|w| matches!(w, GraphWrite::MergeNode { label: NodeLabel::Entity, .. }))
            .count();
        assert_eq!(entity_merges, 3);
    }

    #[tokio::test]
    async fn test_resume_scenario() {
        let store = MemoryGraphStore::new();
        let document = alice_document();
        let result = alice_result();

        let report = GraphMaterializer::new(&store).materialize(&document, &result).await;

        assert!(report.is_complete());
        assert!(store.has_edge("alice.pdf", "BELONGS_TO", "resume"));
        assert!(store.has_edge("Alice Johnson", "HAS_FILE", "alice.pdf"));
        assert!(store.has_edge("Alice Johnson", "HAS_EXPERIENCE", "Data Scientist"));
        assert!(store.labels("Alice Johnson").contains("PERSON"));
        assert_eq!(store.property("alice.pdf", "file_type").as_deref(), Some("pdf"));
        assert_eq!(store.property("alice.pdf", "doc_id"), Some(document.doc_id.clone()));
    }

    #[tokio::test]
    async fn test_rematerializing_is_idempotent() {
        let store = MemoryGraphStore::new();
        let document = alice_document();
        let result = alice_result();
        let materializer = GraphMaterializer::new(&store);

        materializer.materialize(&document, &result).await;
        let (nodes, edges) = (store.node_count(), store.edge_count());

        materializer.materialize(&document, &result).await;
        assert_eq!(store.node_count(), nodes);
        assert_eq!(store.edge_count(), edges);
    }

    #[tokio::test]
    async fn test_every_node_reachable_from_file() {
        let store = MemoryGraphStore::new();
        let document = alice_document();
        let mut result = alice_result();
        // Karachi is never connected by the model
        result.entities.push("Karachi".into());

        GraphMaterializer::new(&store).materialize(&document, &result).await;

        let reachable = store.reachable_from("alice.pdf");
        for entity in result.distinct_entities() {
            assert!(reachable.contains(&entity), "{} not reachable", entity);
        }
        assert!(store.has_edge("Alice Johnson", "HAS_ENTITY", "Karachi"));
        assert!(audit_connectivity(&store, &document, &result).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_edge_does_not_stop_later_writes() {
        let store = MemoryGraphStore::new();
        store.fail_writes_where(|w| {
            matches!(w, GraphWrite::MergeEdge { target, .. } if target == "Data Scientist")
        });
        let document = alice_document();
        let result = alice_result();

        let report = GraphMaterializer::new(&store).materialize(&document, &result).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.succeeded, report.attempted - 1);
        assert!(report.failures[0].statement.contains("HAS_EXPERIENCE"));
        assert!(!store.has_edge("Alice Johnson", "HAS_EXPERIENCE", "Data Scientist"));
        assert!(store.has_edge("Data Scientist", "WORKS_AT", "IBM"));
        assert!(store.has_edge("Alice Johnson", "HAS_FILE", "alice.pdf"));

        let missing = audit_connectivity(&store, &document, &result).await.unwrap();
        assert_eq!(missing, vec!["Data Scientist", "IBM"]);
    }

    #[tokio::test]
    async fn test_category_topology() {
        let store = MemoryGraphStore::new();
        let document = Document::new(
            "bob.pdf".to_string(),
            PathBuf::from("bob.pdf"),
            DocumentClass::Resume,
            "Bob Smith knows Rust".to_string(),
        );
        let result = ExtractionResult {
            entities: vec!["Bob Smith".into(), "Rust".into(), "SQL".into()],
            relationships: vec![rel("HAS_SKILLS")],
            edges: vec![],
            categories: vec![CategoryBucket {
                category: Category::Skills,
                rel_type: rel("HAS_SKILLS"),
                items: vec!["Rust".into(), "SQL".into()],
            }],
            root_entity_name: "Bob Smith".into(),
        };

        GraphMaterializer::new(&store).materialize(&document, &result).await;

        assert!(store.labels("Bob Smith_skills").contains("SKILLS"));
        assert!(store.has_edge("Bob Smith", "HAS_SKILLS", "Bob Smith_skills"));
        assert!(store.has_edge("Bob Smith_skills", "HAS_VALUE", "Rust"));
        assert!(!store.has_edge("Bob Smith", "HAS_ENTITY", "Rust"));
        assert!(store.reachable_from("bob.pdf").contains("SQL"));
    }

    #[tokio::test]
    async fn test_category_edge_written_with_vocabulary_spelling() {
        let store = MemoryGraphStore::new();
        let document = Document::new(
            "bob.pdf".to_string(),
            PathBuf::from("bob.pdf"),
            DocumentClass::Resume,
            "Bob Smith knows Rust".to_string(),
        );
        let vocab: std::collections::BTreeSet<String> = ["HASSKILLS".to_string()].into();
        let result = extract::parse::parse_response(
            r#"{"root_entity_name": "Bob Smith", "skills": ["Rust"]}"#,
            DocumentClass::Resume,
            extract::ExtractionMode::Category,
            &vocab,
        )
        .unwrap();

        GraphMaterializer::new(&store).materialize(&document, &result).await;

        assert!(store.has_edge("Bob Smith", "HASSKILLS", "Bob Smith_skills"));
        assert!(!store.has_edge("Bob Smith", "HAS_SKILLS", "Bob Smith_skills"));
    }
}
