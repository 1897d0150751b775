pub mod materializer;
pub mod memory;
pub mod neo4j_store;
pub mod statements;
pub mod store;
pub mod vocabulary;

pub use materializer::{GraphMaterializer, MaterializeReport, WriteFailure, audit_connectivity, plan_writes};
pub use memory::MemoryGraphStore;
pub use neo4j_store::Neo4jStore;
pub use statements::{GraphRead, GraphWrite, NodeLabel, Row};
pub use store::{GraphStore, GraphStoreError};
pub use vocabulary::RelationshipVocabulary;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: u64,
    pub relationships: u64,
}

/// Node and relationship counts for the whole graph
pub async fn graph_stats<S: GraphStore + ?Sized>(store: &S) -> Result<GraphStats, GraphStoreError> {
    let rows = store.read(&GraphRead::Stats).await?;
    let stats = rows
        .into_iter()
        .find_map(|row| match row {
            Row::Value(value) => Some(GraphStats {
                nodes: value["nodes"].as_u64().unwrap_or(0),
                relationships: value["relationships"].as_u64().unwrap_or(0),
            }),
            _ => None,
        })
        .unwrap_or_default();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::RelType;

    #[tokio::test]
    async fn test_graph_stats() {
        let store = MemoryGraphStore::new();
        assert_eq!(graph_stats(&store).await.unwrap(), GraphStats::default());

        for name in ["Bob", "Rust"] {
            store
                .write(&GraphWrite::MergeNode {
                    name: name.to_string(),
                    label: NodeLabel::Entity,
                })
                .await
                .unwrap();
        }
        store
            .write(&GraphWrite::MergeEdge {
                source: "Bob".to_string(),
                rel_type: RelType::new("HAS_SKILLS").unwrap(),
                target: "Rust".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            graph_stats(&store).await.unwrap(),
            GraphStats {
                nodes: 2,
                relationships: 1
            }
        );
    }
}
