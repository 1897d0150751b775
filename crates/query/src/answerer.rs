use extract::LanguageModel;
use index::{GraphRead, GraphStore, GraphStoreError, Row};
use ingest::DocumentClass;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::QueryError;
use crate::guard::{check_read_only, clean_statement};
use crate::prompts;
use crate::retry::{RetryError, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub main_node: Option<String>,
    pub rephrased: String,
    pub cypher: String,
    pub rows: Vec<Row>,
    pub answer: String,
}

/// Answers natural-language questions against the extracted graph
pub struct GraphQuestionAnswerer<M: LanguageModel, S: GraphStore> {
    model: M,
    store: S,
    retry: RetryPolicy,
}

/// Match the model's pick against known node names: exact, then case-insensitive
pub fn match_node_name(response: &str, node_names: &[String]) -> Option<String> {
    let picked = response
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == ',' || c == ':')
        .trim();
    if picked.is_empty() {
        return None;
    }

    node_names
        .iter()
        .find(|name| name.as_str() == picked)
        .or_else(|| node_names.iter().find(|name| name.to_lowercase() == picked.to_lowercase()))
        .cloned()
}

fn values(rows: Vec<Row>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| match row {
            Row::Value(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
        .collect()
}

fn node_names(rows: Vec<Row>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| match row {
            Row::Node { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

impl<M: LanguageModel, S: GraphStore> GraphQuestionAnswerer<M, S> {
    pub fn new(model: M, store: S, retry: RetryPolicy) -> Self {
        Self { model, store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn read(&self, operation: &str, query: GraphRead) -> Result<Vec<Row>, QueryError> {
        self.retry
            .retry(operation, || self.store.read(&query), GraphStoreError::is_transient)
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, last } => QueryError::RetriesExhausted { attempts, last },
                RetryError::Permanent(e) => QueryError::Store(e),
            })
    }

    pub async fn answer(&self, question: &str, class: Option<DocumentClass>) -> Result<Answer, QueryError> {
        // 1. anchor the question on an existing node
        let names = node_names(self.read("node_names", GraphRead::NodeNames).await?);
        let pick = self
            .model
            .generate(&prompts::build_main_node_prompt(question, &names))
            .await?;
        let main_node = match_node_name(&pick, &names);
        if main_node.is_none() {
            warn!(pick = %pick.trim(), "Main node not found in graph, question stays unanchored");
        }

        // 2-3. rephrase using the main node's relationships
        let rephrased = match &main_node {
            Some(node) => {
                let rows = self
                    .read("node_relationships", GraphRead::NodeRelationships { name: node.clone() })
                    .await?;
                let relationships: Vec<String> = rows
                    .into_iter()
                    .filter_map(|row| match row {
                        Row::Relationship { rel_type, start, end } => Some(format!("({})-[:{}]->({})", start, rel_type, end)),
                        _ => None,
                    })
                    .collect();
                let response = self
                    .model
                    .generate(&prompts::build_rephrase_prompt(question, node, &relationships))
                    .await?;
                let response = response.trim();
                if response.is_empty() { question.to_string() } else { response.to_string() }
            }
            None => question.to_string(),
        };
        debug!(rephrased = %rephrased, "Rephrased question");

        // 4. translate to a read-only statement scoped to the class's files
        let files = node_names(self.read("file_names", GraphRead::FileNames { class }).await?);
        let relationship_types = values(
            self.read("relationship_types", GraphRead::RelationshipTypes { files: None })
                .await?,
        );
        let raw = self
            .model
            .generate(&prompts::build_cypher_prompt(&rephrased, &relationship_types))
            .await?;
        let cypher = clean_statement(&raw);
        check_read_only(&cypher)?;

        // 5. execute with retry on transient failures
        info!(statement = %cypher, files = files.len(), "Running generated query");
        let rows = self
            .read(
                "generated_query",
                GraphRead::Cypher {
                    statement: cypher.clone(),
                    files,
                },
            )
            .await?;

        // 6. answer from the rows
        let results = serde_json::to_string_pretty(&rows).unwrap_or_default();
        let answer = self
            .model
            .generate(&prompts::build_answer_prompt(question, &results))
            .await?
            .trim()
            .to_string();

        Ok(Answer {
            main_node,
            rephrased,
            cypher,
            rows,
            answer,
        })
    }
}
