use ingest::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::anchor;

/// The model response did not conform to the expected structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaValidationError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("root_entity_name must not be empty")]
    EmptyRootEntity,

    #[error("root_entity_name '{0}' is not one of the extracted entities")]
    RootNotAnEntity(String),
}

/// Which response schema the extractor asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Free-form entities plus cypher statements describing the edges
    #[default]
    EdgeList,
    /// Fixed per-class category lists hanging off the root entity
    Category,
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "edges" | "edge_list" | "edge-list" => Ok(ExtractionMode::EdgeList),
            "categories" | "category" => Ok(ExtractionMode::Category),
            other => Err(format!(
                "unknown extraction mode '{}' (expected 'edges' or 'categories')",
                other
            )),
        }
    }
}

/// A relationship type name that is safe to place in a Cypher relationship pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelType(String);

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid relationship type '{0}'")]
pub struct InvalidRelType(pub String);

impl RelType {
    pub const MAX_LEN: usize = 64;

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidRelType> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(InvalidRelType(name))
        }
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_uppercase() => {}
            _ => return false,
        }
        name.len() <= Self::MAX_LEN
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelType {
    type Error = InvalidRelType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RelType::new(value)
    }
}

impl From<RelType> for String {
    fn from(value: RelType) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub rel_type: RelType,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub category: Category,
    /// Root-to-category relationship, in the vocabulary's spelling
    pub rel_type: RelType,
    pub items: Vec<String>,
}

/// Validated output of one extraction. Consumed once by the materializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Model order, duplicates allowed
    pub entities: Vec<String>,
    pub relationships: Vec<RelType>,
    pub edges: Vec<Edge>,
    pub categories: Vec<CategoryBucket>,
    pub root_entity_name: String,
}

impl ExtractionResult {
    /// Entities with no directed path from the root entity over `edges` and category links
    pub fn unanchored_entities(&self) -> Vec<String> {
        let mut links: Vec<(String, String)> = self
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        for bucket in &self.categories {
            let node = bucket.category.node_name(&self.root_entity_name);
            links.push((self.root_entity_name.clone(), node.clone()));
            for item in &bucket.items {
                links.push((node.clone(), item.clone()));
            }
        }

        let reachable = anchor::reachable_from(&self.root_entity_name, &links);

        let mut seen = std::collections::HashSet::new();
        self.entities
            .iter()
            .filter(|name| !reachable.contains(name.as_str()))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    /// Entities in model order with duplicates removed
    pub fn distinct_entities(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.entities
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }
}
