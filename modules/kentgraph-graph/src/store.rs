use async_trait::async_trait;
use dgraph_client::{Assigned, DgraphError};
use tracing::debug;

use crate::query::DqlQuery;
use crate::GraphClient;

/// The query/mutate seam between the record access layer and the database.
///
/// Each call is one self-contained transaction: reads are read-only,
/// mutations commit immediately.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a read query and return the `data` object of the response.
    async fn query(&self, query: &DqlQuery) -> Result<serde_json::Value, DgraphError>;

    /// Apply a JSON set-mutation and return the assigned uids.
    async fn mutate(&self, set: &serde_json::Value) -> Result<Assigned, DgraphError>;
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn query(&self, query: &DqlQuery) -> Result<serde_json::Value, DgraphError> {
        debug!(
            operation = query.template.operation,
            block = query.block(),
            "Running query"
        );
        self.dgraph.query(&query.to_dql(), &query.variables()).await
    }

    async fn mutate(&self, set: &serde_json::Value) -> Result<Assigned, DgraphError> {
        debug!("Running set mutation");
        self.dgraph.mutate_set(set).await
    }
}
