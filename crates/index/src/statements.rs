//! Typed graph statements and their Cypher rendering.
//!
//! Values always travel as parameters. The only identifiers spliced into the
//! statement text come from `NodeLabel` (a closed set) and `RelType` (validated).

use extract::RelType;
use ingest::{Category, DocumentClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label every node is merged under; node identity is its `name` within this label
pub const NODE_MARKER: &str = "Node";

/// Maximum path length followed when walking a file's subgraph
pub const SUBGRAPH_DEPTH: usize = 10;

pub const BELONGS_TO: &str = "BELONGS_TO";
pub const HAS_FILE: &str = "HAS_FILE";
pub const DESCRIBES: &str = "DESCRIBES";
pub const HAS_VALUE: &str = "HAS_VALUE";
pub const HAS_ENTITY: &str = "HAS_ENTITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    /// Shared node for every document of a class
    ClassRoot,
    File,
    Entity,
    /// Extra label on a document's root entity
    Root(DocumentClass),
    Category(Category),
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::ClassRoot => "DocumentClass",
            NodeLabel::File => "File",
            NodeLabel::Entity => "Entity",
            NodeLabel::Root(class) => class.root_label(),
            NodeLabel::Category(category) => category.label(),
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One idempotent upsert
#[derive(Debug, Clone, PartialEq)]
pub enum GraphWrite {
    /// Upsert a node by name and add `label` to it
    MergeNode { name: String, label: NodeLabel },
    /// Upsert a File node; `doc_id` and `file_type` are only set on creation
    MergeFile {
        name: String,
        doc_id: String,
        file_type: String,
    },
    /// Upsert a typed edge between two existing nodes (no-op if either is missing)
    MergeEdge {
        source: String,
        rel_type: RelType,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphRead {
    /// Distinct relationship types, graph-wide or on paths leaving the given files
    RelationshipTypes { files: Option<Vec<String>> },
    NodeNames,
    /// Relationships touching a node, in either direction
    NodeRelationships { name: String },
    FileNames { class: Option<DocumentClass> },
    /// Relationships on directed paths leaving a File node
    FileSubgraph { file: String },
    Stats,
    /// Free-form read statement; must take the file allowlist as `$files`
    Cypher { statement: String, files: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    List(Vec<String>),
}

/// A rendered statement: Cypher text plus named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<(&'static str, ParamValue)>,
}

impl Statement {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, ParamValue::String(value.into())));
        self
    }

    fn list_param(mut self, key: &'static str, value: Vec<String>) -> Self {
        self.params.push((key, ParamValue::List(value)));
        self
    }
}

/// A row returned by a read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Row {
    Node { name: String, labels: Vec<String> },
    Relationship { rel_type: String, start: String, end: String },
    Value(serde_json::Value),
}

impl GraphWrite {
    pub fn to_cypher(&self) -> Statement {
        match self {
            GraphWrite::MergeNode { name, label } => {
                Statement::new(format!("MERGE (n:Node {{name: $name}}) SET n:`{}`", label)).param("name", name)
            }
            GraphWrite::MergeFile {
                name,
                doc_id,
                file_type,
            } => Statement::new(
                "MERGE (n:Node {name: $name}) \
                 ON CREATE SET n.doc_id = $doc_id, n.file_type = $file_type \
                 SET n:File",
            )
            .param("name", name)
            .param("doc_id", doc_id)
            .param("file_type", file_type),
            GraphWrite::MergeEdge {
                source,
                rel_type,
                target,
            } => Statement::new(format!(
                "MATCH (s:Node {{name: $source}}) MATCH (t:Node {{name: $target}}) MERGE (s)-[:`{}`]->(t)",
                rel_type
            ))
            .param("source", source)
            .param("target", target),
        }
    }
}

impl fmt::Display for GraphWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWrite::MergeNode { name, label } => write!(f, "MERGE ({}:{})", name, label),
            GraphWrite::MergeFile { name, .. } => write!(f, "MERGE ({}:File)", name),
            GraphWrite::MergeEdge {
                source,
                rel_type,
                target,
            } => write!(f, "MERGE ({})-[:{}]->({})", source, rel_type, target),
        }
    }
}

impl GraphRead {
    pub fn to_cypher(&self) -> Statement {
        match self {
            GraphRead::RelationshipTypes { files: None } => {
                Statement::new("MATCH ()-[r]->() RETURN DISTINCT type(r) AS value")
            }
            GraphRead::RelationshipTypes { files: Some(files) } => Statement::new(format!(
                "MATCH p = (f:File)-[*1..{}]->() WHERE f.name IN $files \
                 UNWIND relationships(p) AS r RETURN DISTINCT type(r) AS value",
                SUBGRAPH_DEPTH
            ))
            .list_param("files", files.clone()),
            GraphRead::NodeNames => Statement::new(
                "MATCH (n:Node) RETURN n.name AS name, [l IN labels(n) WHERE l <> 'Node'] AS labels",
            ),
            GraphRead::NodeRelationships { name } => Statement::new(
                "MATCH (n:Node {name: $name})-[r]-() \
                 RETURN DISTINCT type(r) AS rel_type, startNode(r).name AS start, endNode(r).name AS end",
            )
            .param("name", name),
            GraphRead::FileNames { class: None } => {
                Statement::new("MATCH (f:File) RETURN f.name AS name, labels(f) AS labels")
            }
            GraphRead::FileNames { class: Some(class) } => Statement::new(
                "MATCH (f:File)-[:BELONGS_TO]->(c:DocumentClass {name: $class}) \
                 RETURN f.name AS name, labels(f) AS labels",
            )
            .param("class", class.root_node_name()),
            GraphRead::FileSubgraph { file } => Statement::new(format!(
                "MATCH p = (f:File {{name: $file}})-[*1..{}]->() \
                 UNWIND relationships(p) AS r \
                 RETURN DISTINCT type(r) AS rel_type, startNode(r).name AS start, endNode(r).name AS end",
                SUBGRAPH_DEPTH
            ))
            .param("file", file),
            GraphRead::Stats => Statement::new(
                "MATCH (n) WITH count(n) AS nodes \
                 OPTIONAL MATCH ()-[r]->() RETURN nodes, count(r) AS relationships",
            ),
            GraphRead::Cypher { statement, files } => {
                Statement::new(statement.clone()).list_param("files", files.clone())
            }
        }
    }
}
