use std::collections::BTreeSet;
use tracing::debug;

use crate::statements::{GraphRead, Row};
use crate::store::{GraphStore, GraphStoreError};

/// Read-only view of the relationship types already present in the graph
pub struct RelationshipVocabulary<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> RelationshipVocabulary<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// All distinct relationship types graph-wide. Empty graph gives an empty set.
    pub async fn snapshot(&self) -> Result<BTreeSet<String>, GraphStoreError> {
        self.collect(GraphRead::RelationshipTypes { files: None }).await
    }

    /// Relationship types on paths leaving the given File nodes
    pub async fn snapshot_for_files(&self, files: &[String]) -> Result<BTreeSet<String>, GraphStoreError> {
        if files.is_empty() {
            return Ok(BTreeSet::new());
        }
        self.collect(GraphRead::RelationshipTypes {
            files: Some(files.to_vec()),
        })
        .await
    }

    async fn collect(&self, query: GraphRead) -> Result<BTreeSet<String>, GraphStoreError> {
        let rows = self.store.read(&query).await?;
        let vocabulary: BTreeSet<String> = rows
            .into_iter()
            .filter_map(|row| match row {
                Row::Value(serde_json::Value::String(name)) => Some(name),
                _ => None,
            })
            .collect();

        debug!(size = vocabulary.len(), "Relationship vocabulary snapshot");
        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraphStore;
    use crate::statements::{GraphWrite, NodeLabel};
    use extract::RelType;

    #[tokio::test]
    async fn test_empty_graph() {
        let store = MemoryGraphStore::new();
        let vocabulary = RelationshipVocabulary::new(&store);

        assert!(vocabulary.snapshot().await.unwrap().is_empty());
        assert!(vocabulary.snapshot_for_files(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_distinct_types() {
        let store = MemoryGraphStore::new();
        for name in ["Bob", "MIT", "Alice", "Stanford"] {
            store
                .write(&GraphWrite::MergeNode {
                    name: name.to_string(),
                    label: NodeLabel::Entity,
                })
                .await
                .unwrap();
        }
        for (s, t) in [("Bob", "MIT"), ("Alice", "Stanford")] {
            store
                .write(&GraphWrite::MergeEdge {
                    source: s.to_string(),
                    rel_type: RelType::new("HAS_EDUCATION").unwrap(),
                    target: t.to_string(),
                })
                .await
                .unwrap();
        }

        let snapshot = RelationshipVocabulary::new(&store).snapshot().await.unwrap();
        assert_eq!(snapshot.into_iter().collect::<Vec<_>>(), vec!["HAS_EDUCATION"]);
    }

    #[tokio::test]
    async fn test_read_failure_surfaces() {
        let store = MemoryGraphStore::new();
        store.fail_next_reads(1);

        assert!(RelationshipVocabulary::new(&store).snapshot().await.is_err());
    }
}
