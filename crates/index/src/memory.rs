use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::statements::{GraphRead, GraphWrite, Row, SUBGRAPH_DEPTH};
use crate::store::{GraphStore, GraphStoreError};

type WriteFilter = Box<dyn Fn(&GraphWrite) -> bool + Send + Sync>;

#[derive(Debug, Default, Clone)]
struct MemoryNode {
    labels: BTreeSet<String>,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone)]
struct MemoryGraph {
    nodes: BTreeMap<String, MemoryNode>,
    edges: BTreeSet<(String, String, String)>,
}

impl MemoryGraph {
    fn node_mut(&mut self, name: &str) -> &mut MemoryNode {
        self.nodes.entry(name.to_string()).or_default()
    }

    /// Edges on directed paths of at most `SUBGRAPH_DEPTH` hops from `start`
    fn edges_from(&self, start: &str) -> Vec<(String, String, String)> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut queue = VecDeque::from([(start.to_string(), 0usize)]);
        seen.insert(start.to_string());

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= SUBGRAPH_DEPTH {
                continue;
            }
            for edge in self.edges.iter().filter(|(s, _, _)| s == &node) {
                found.push(edge.clone());
                if seen.insert(edge.2.clone()) {
                    queue.push_back((edge.2.clone(), depth + 1));
                }
            }
        }
        found
    }
}

/// In-process graph store with the same upsert semantics as Neo4j.
///
/// Nodes are keyed by name graph-wide and accumulate labels; edges form a set of
/// (source, type, target) triples. Failures can be injected for writes matching a
/// predicate and for the next N reads.
#[derive(Default)]
pub struct MemoryGraphStore {
    graph: Mutex<MemoryGraph>,
    fail_on: Mutex<Option<WriteFilter>>,
    transient_read_failures: AtomicUsize,
    cypher_errors: Mutex<VecDeque<GraphStoreError>>,
    read_attempts: AtomicUsize,
    cypher_rows: Mutex<VecDeque<Vec<Row>>>,
    executed_cypher: Mutex<Vec<(String, Vec<String>)>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write matching `predicate` fail
    pub fn fail_writes_where<F>(&self, predicate: F)
    where
        F: Fn(&GraphWrite) -> bool + Send + Sync + 'static,
    {
        *self.fail_on.lock() = Some(Box::new(predicate));
    }

    /// Make the next `count` reads fail with a transient error
    pub fn fail_next_reads(&self, count: usize) {
        self.transient_read_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next free-form cypher read fail with `error`
    pub fn fail_next_cypher_with(&self, error: GraphStoreError) {
        self.cypher_errors.lock().push_back(error);
    }

    /// Queue rows returned by the next free-form cypher read
    pub fn push_cypher_rows(&self, rows: Vec<Row>) {
        self.cypher_rows.lock().push_back(rows);
    }

    /// Free-form statements executed so far, with their file allowlist
    pub fn executed_cypher(&self) -> Vec<(String, Vec<String>)> {
        self.executed_cypher.lock().clone()
    }

    pub fn read_attempts(&self) -> usize {
        self.read_attempts.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.graph.lock().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.lock().edges.len()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.graph.lock().nodes.contains_key(name)
    }

    pub fn labels(&self, name: &str) -> BTreeSet<String> {
        self.graph
            .lock()
            .nodes
            .get(name)
            .map(|n| n.labels.clone())
            .unwrap_or_default()
    }

    pub fn property(&self, name: &str, key: &str) -> Option<String> {
        self.graph
            .lock()
            .nodes
            .get(name)
            .and_then(|n| n.properties.get(key).cloned())
    }

    pub fn has_edge(&self, source: &str, rel_type: &str, target: &str) -> bool {
        self.graph.lock().edges.contains(&(
            source.to_string(),
            rel_type.to_string(),
            target.to_string(),
        ))
    }

    /// Every node with a directed path from `start`, `start` included
    pub fn reachable_from(&self, start: &str) -> BTreeSet<String> {
        let graph = self.graph.lock();
        let mut reachable = BTreeSet::from([start.to_string()]);
        let mut queue = VecDeque::from([start.to_string()]);
        while let Some(node) = queue.pop_front() {
            for (_, _, target) in graph.edges.iter().filter(|(s, _, _)| s == &node) {
                if reachable.insert(target.clone()) {
                    queue.push_back(target.clone());
                }
            }
        }
        reachable
    }

    fn apply(&self, statement: &GraphWrite) {
        let mut graph = self.graph.lock();
        match statement {
            GraphWrite::MergeNode { name, label } => {
                graph.node_mut(name).labels.insert(label.as_str().to_string());
            }
            GraphWrite::MergeFile {
                name,
                doc_id,
                file_type,
            } => {
                let node = graph.node_mut(name);
                node.labels.insert("File".to_string());
                node.properties
                    .entry("doc_id".to_string())
                    .or_insert_with(|| doc_id.clone());
                node.properties
                    .entry("file_type".to_string())
                    .or_insert_with(|| file_type.clone());
            }
            GraphWrite::MergeEdge {
                source,
                rel_type,
                target,
            } => {
                // MATCH on a missing endpoint makes the MERGE a silent no-op
                if graph.nodes.contains_key(source) && graph.nodes.contains_key(target) {
                    graph
                        .edges
                        .insert((source.clone(), rel_type.to_string(), target.clone()));
                }
            }
        }
    }

    fn relationship_rows(edges: impl IntoIterator<Item = (String, String, String)>) -> Vec<Row> {
        let mut seen = HashSet::new();
        edges
            .into_iter()
            .filter(|edge| seen.insert(edge.clone()))
            .map(|(start, rel_type, end)| Row::Relationship { rel_type, start, end })
            .collect()
    }

    fn node_rows<'a>(nodes: impl Iterator<Item = (&'a String, &'a MemoryNode)>) -> Vec<Row> {
        nodes
            .map(|(name, node)| Row::Node {
                name: name.clone(),
                labels: node.labels.iter().cloned().collect(),
            })
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn write(&self, statement: &GraphWrite) -> Result<(), GraphStoreError> {
        let rejected = self
            .fail_on
            .lock()
            .as_ref()
            .is_some_and(|predicate| predicate(statement));
        if rejected {
            return Err(GraphStoreError::Query {
                statement: statement.to_string(),
                detail: "injected write failure".to_string(),
            });
        }

        debug!(statement = %statement, "memory write");
        self.apply(statement);
        Ok(())
    }

    async fn read(&self, query: &GraphRead) -> Result<Vec<Row>, GraphStoreError> {
        self.read_attempts.fetch_add(1, Ordering::SeqCst);
        let pending = self.transient_read_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_read_failures.store(pending - 1, Ordering::SeqCst);
            return Err(GraphStoreError::Transient("injected read failure".to_string()));
        }
        if let GraphRead::Cypher { statement, files } = query {
            self.executed_cypher
                .lock()
                .push((statement.clone(), files.clone()));
            if let Some(error) = self.cypher_errors.lock().pop_front() {
                return Err(error);
            }
            return Ok(self.cypher_rows.lock().pop_front().unwrap_or_default());
        }

        let graph = self.graph.lock();
        let rows = match query {
            GraphRead::RelationshipTypes { files: None } => graph
                .edges
                .iter()
                .map(|(_, rel_type, _)| rel_type.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|t| Row::Value(json!(t)))
                .collect(),
            GraphRead::RelationshipTypes { files: Some(files) } => files
                .iter()
                .filter(|f| graph.nodes.get(*f).is_some_and(|n| n.labels.contains("File")))
                .flat_map(|f| graph.edges_from(f))
                .map(|(_, rel_type, _)| rel_type)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|t| Row::Value(json!(t)))
                .collect(),
            GraphRead::NodeNames => Self::node_rows(graph.nodes.iter()),
            GraphRead::NodeRelationships { name } => Self::relationship_rows(
                graph
                    .edges
                    .iter()
                    .filter(|(s, _, t)| s == name || t == name)
                    .cloned(),
            ),
            GraphRead::FileNames { class } => {
                let files = graph.nodes.iter().filter(|(name, node)| {
                    node.labels.contains("File")
                        && class.is_none_or(|c| {
                            graph.edges.contains(&(
                                name.to_string(),
                                crate::statements::BELONGS_TO.to_string(),
                                c.root_node_name().to_string(),
                            ))
                        })
                });
                Self::node_rows(files)
            }
            GraphRead::FileSubgraph { file } => {
                let is_file = graph.nodes.get(file).is_some_and(|n| n.labels.contains("File"));
                if is_file {
                    Self::relationship_rows(graph.edges_from(file))
                } else {
                    Vec::new()
                }
            }
            GraphRead::Stats => vec![Row::Value(json!({
                "nodes": graph.nodes.len(),
                "relationships": graph.edges.len(),
            }))],
            GraphRead::Cypher { .. } => Vec::new(),
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::NodeLabel;
    use extract::RelType;

    fn node(name: &str, label: NodeLabel) -> GraphWrite {
        GraphWrite::MergeNode {
            name: name.to_string(),
            label,
        }
    }

    fn edge(source: &str, rel: &str, target: &str) -> GraphWrite {
        GraphWrite::MergeEdge {
            source: source.to_string(),
            rel_type: RelType::new(rel).unwrap(),
            target: target.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upserts_are_idempotent() {
        let store = MemoryGraphStore::new();
        for _ in 0..2 {
            store.write(&node("Bob", NodeLabel::Entity)).await.unwrap();
            store.write(&node("Rust", NodeLabel::Entity)).await.unwrap();
            store.write(&edge("Bob", "HAS_SKILLS", "Rust")).await.unwrap();
        }

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_edge_to_missing_node_is_noop() {
        let store = MemoryGraphStore::new();
        store.write(&node("Bob", NodeLabel::Entity)).await.unwrap();
        store.write(&edge("Bob", "KNOWS", "Ghost")).await.unwrap();

        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_file_properties_set_on_create_only() {
        let store = MemoryGraphStore::new();
        for doc_id in ["first", "second"] {
            store
                .write(&GraphWrite::MergeFile {
                    name: "cv.pdf".to_string(),
                    doc_id: doc_id.to_string(),
                    file_type: "pdf".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.property("cv.pdf", "doc_id").as_deref(), Some("first"));
        assert!(store.labels("cv.pdf").contains("File"));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryGraphStore::new();
        store.fail_writes_where(|w| matches!(w, GraphWrite::MergeNode { name, .. } if name == "Bad"));

        assert!(store.write(&node("Bad", NodeLabel::Entity)).await.is_err());
        assert!(store.write(&node("Good", NodeLabel::Entity)).await.is_ok());

        store.fail_next_reads(1);
        assert!(store.read(&GraphRead::NodeNames).await.unwrap_err().is_transient());
        assert_eq!(store.read(&GraphRead::NodeNames).await.unwrap().len(), 1);
        assert_eq!(store.read_attempts(), 2);
    }

    #[tokio::test]
    async fn test_scoped_relationship_types() {
        let store = MemoryGraphStore::new();
        store
            .write(&GraphWrite::MergeFile {
                name: "a.pdf".to_string(),
                doc_id: "1".to_string(),
                file_type: "pdf".to_string(),
            })
            .await
            .unwrap();
        for name in ["Alice", "IBM", "Bob", "MIT"] {
            store.write(&node(name, NodeLabel::Entity)).await.unwrap();
        }
        store.write(&edge("a.pdf", "DESCRIBES", "Alice")).await.unwrap();
        store.write(&edge("Alice", "WORKS_AT", "IBM")).await.unwrap();
        store.write(&edge("Bob", "HAS_EDUCATION", "MIT")).await.unwrap();

        let scoped = store
            .read(&GraphRead::RelationshipTypes {
                files: Some(vec!["a.pdf".to_string()]),
            })
            .await
            .unwrap();
        assert_eq!(scoped, vec![Row::Value(json!("DESCRIBES")), Row::Value(json!("WORKS_AT"))]);

        let all = store.read(&GraphRead::RelationshipTypes { files: None }).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_cypher_rows() {
        let store = MemoryGraphStore::new();
        store.push_cypher_rows(vec![Row::Value(json!("IBM"))]);

        let rows = store
            .read(&GraphRead::Cypher {
                statement: "MATCH (n) RETURN n.name AS answer".to_string(),
                files: vec!["a.pdf".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(rows, vec![Row::Value(json!("IBM"))]);
        assert_eq!(store.executed_cypher()[0].1, vec!["a.pdf"]);
    }
}
