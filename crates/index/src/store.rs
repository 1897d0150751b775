use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::statements::{GraphRead, GraphWrite, Row};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphStoreError {
    /// Network or timeout failure; the read may succeed if retried
    #[error("transient graph store error: {0}")]
    Transient(String),

    #[error("statement failed: {statement}: {detail}")]
    Query { statement: String, detail: String },

    #[error("failed to connect to graph store: {0}")]
    Connection(String),

    #[error("unsupported by this store: {0}")]
    Unsupported(String),
}

impl GraphStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphStoreError::Transient(_))
    }
}

/// Executes typed statements against a property graph
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one write in its own transaction
    async fn write(&self, statement: &GraphWrite) -> Result<(), GraphStoreError>;

    async fn read(&self, query: &GraphRead) -> Result<Vec<Row>, GraphStoreError>;
}

#[async_trait]
impl<S: GraphStore + ?Sized> GraphStore for Arc<S> {
    async fn write(&self, statement: &GraphWrite) -> Result<(), GraphStoreError> {
        (**self).write(statement).await
    }

    async fn read(&self, query: &GraphRead) -> Result<Vec<Row>, GraphStoreError> {
        (**self).read(query).await
    }
}

#[async_trait]
impl<S: GraphStore + ?Sized> GraphStore for Box<S> {
    async fn write(&self, statement: &GraphWrite) -> Result<(), GraphStoreError> {
        (**self).write(statement).await
    }

    async fn read(&self, query: &GraphRead) -> Result<Vec<Row>, GraphStoreError> {
        (**self).read(query).await
    }
}
