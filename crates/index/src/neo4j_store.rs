use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::statements::{GraphRead, GraphWrite, NODE_MARKER, ParamValue, Row, Statement};
use crate::store::{GraphStore, GraphStoreError};

pub struct Neo4jStore {
    graph: Graph,
}

fn to_query(statement: Statement) -> Query {
    statement
        .params
        .into_iter()
        .fold(Query::new(statement.text), |query, (key, value)| match value {
            ParamValue::String(s) => query.param(key, s),
            ParamValue::List(list) => query.param(key, list),
        })
}

/// Only network failures and server-side transient errors are worth retrying
pub fn classify_read_error(statement: &str, error: &neo4rs::Error) -> GraphStoreError {
    let detail = error.to_string();
    let transient = match error {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => true,
        _ => detail.contains("Neo.TransientError"),
    };

    if transient {
        GraphStoreError::Transient(detail)
    } else {
        GraphStoreError::Query {
            statement: statement.to_string(),
            detail,
        }
    }
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, GraphStoreError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .db(database)
            .build()
            .map_err(|e| GraphStoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| GraphStoreError::Connection(e.to_string()))?;

        info!(uri = %uri, database = %database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Initialize schema: node identity constraint plus lookup indexes
    pub async fn init_schema(&self) -> Result<(), GraphStoreError> {
        let mut statements = vec![format!(
            "CREATE CONSTRAINT node_name_unique IF NOT EXISTS FOR (n:{}) REQUIRE n.name IS UNIQUE",
            NODE_MARKER
        )];
        for (index, label) in [("file_name_index", "File"), ("document_class_name_index", "DocumentClass")] {
            statements.push(format!(
                "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.name)",
                index, label
            ));
        }

        for text in statements {
            self.graph
                .run(Query::new(text.clone()))
                .await
                .map_err(|e| GraphStoreError::Query {
                    statement: text,
                    detail: e.to_string(),
                })?;
        }

        info!("Neo4j schema ready");
        Ok(())
    }

    async fn run_in_txn(&self, statement: Statement) -> Result<(), neo4rs::Error> {
        let mut txn = self.graph.start_txn().await?;
        txn.run(to_query(statement)).await?;
        txn.commit().await
    }

    async fn fetch(&self, query: &GraphRead) -> Result<Vec<Row>, neo4rs::Error> {
        let mut result = self.graph.execute(to_query(query.to_cypher())).await?;
        let mut rows = Vec::new();

        while let Some(row) = result.next().await? {
            let converted = match query {
                GraphRead::RelationshipTypes { .. } => row.get::<String>("value").ok().map(|t| Row::Value(json!(t))),
                GraphRead::NodeNames | GraphRead::FileNames { .. } => match row.get::<String>("name") {
                    Ok(name) => Some(Row::Node {
                        name,
                        labels: row.get::<Vec<String>>("labels").unwrap_or_default(),
                    }),
                    Err(_) => None,
                },
                GraphRead::NodeRelationships { .. } | GraphRead::FileSubgraph { .. } => {
                    match (
                        row.get::<String>("rel_type"),
                        row.get::<String>("start"),
                        row.get::<String>("end"),
                    ) {
                        (Ok(rel_type), Ok(start), Ok(end)) => Some(Row::Relationship { rel_type, start, end }),
                        // endpoints without a name property
                        _ => None,
                    }
                }
                GraphRead::Stats => Some(Row::Value(json!({
                    "nodes": row.get::<i64>("nodes").unwrap_or(0),
                    "relationships": row.get::<i64>("relationships").unwrap_or(0),
                }))),
                GraphRead::Cypher { .. } => Some(Row::Value(
                    row.get::<serde_json::Value>("answer").unwrap_or(serde_json::Value::Null),
                )),
            };
            rows.extend(converted);
        }

        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn write(&self, statement: &GraphWrite) -> Result<(), GraphStoreError> {
        let rendered = statement.to_cypher();
        debug!(statement = %rendered.text, "Neo4j write");

        self.run_in_txn(rendered).await.map_err(|e| {
            warn!(statement = %statement, error = %e, "Neo4j write failed");
            GraphStoreError::Query {
                statement: statement.to_string(),
                detail: e.to_string(),
            }
        })
    }

    async fn read(&self, query: &GraphRead) -> Result<Vec<Row>, GraphStoreError> {
        self.fetch(query).await.map_err(|e| {
            let error = classify_read_error(&query.to_cypher().text, &e);
            warn!(query = ?query, error = %e, transient = error.is_transient(), "Neo4j read failed");
            error
        })
    }
}
