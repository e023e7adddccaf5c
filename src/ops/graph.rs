//! Graph catalog operations and the remote graph handle.
//!
//! A [`Graph`] is a name plus a runner — the projection itself lives in the
//! server's memory. Metadata is fetched lazily per call and never cached
//! beyond one round-trip, so a handle stays honest after server-side
//! changes: once the server stops listing the name, every metadata call
//! fails with `Error::GraphNotFound`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CallParameters, DataTable, Row, Value};
use crate::runner::QueryRunner;
use crate::{Error, Result};

// ============================================================================
// Catalog operations
// ============================================================================

/// Wrappers for the `gds.graph.*` catalog procedures.
pub struct GraphOps {
    runner: Arc<dyn QueryRunner>,
}

impl GraphOps {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    /// Project a named graph into the server's catalog.
    pub async fn project(
        &self,
        graph_name: &str,
        node_spec: impl Into<Value>,
        relationship_spec: impl Into<Value>,
        config: CallParameters,
    ) -> Result<(Graph, GraphProjectResult)> {
        let params = CallParameters::new()
            .with("graph_name", graph_name)
            .with("node_spec", node_spec)
            .with("relationship_spec", relationship_spec)
            .with("config", Value::Map(config.to_map()));

        let table = self
            .runner
            .call_procedure("gds.graph.project", params, None)
            .await?;
        let result = GraphProjectResult::from_row(table.single()?)?;
        let graph = Graph::new(graph_name, Arc::clone(&self.runner));
        Ok((graph, result))
    }

    /// Estimate the memory a projection would need, without creating it.
    pub async fn project_estimate(
        &self,
        node_spec: impl Into<Value>,
        relationship_spec: impl Into<Value>,
        config: CallParameters,
    ) -> Result<crate::ops::algo::EstimateResult> {
        let params = CallParameters::new()
            .with("node_spec", node_spec)
            .with("relationship_spec", relationship_spec)
            .with("config", Value::Map(config.to_map()));
        let table = self
            .runner
            .call_procedure("gds.graph.project.estimate", params, None)
            .await?;
        crate::ops::algo::EstimateResult::from_row(table.single()?)
    }

    /// All projected graphs currently in the catalog.
    pub async fn list(&self) -> Result<DataTable> {
        self.runner
            .call_procedure("gds.graph.list", CallParameters::new(), None)
            .await
    }

    /// The names of all projected graphs.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        self.list().await?.column_as_strings("graphName")
    }

    /// Whether a projection with this name exists.
    pub async fn exists(&self, graph_name: &str) -> Result<bool> {
        let params = CallParameters::new().with("graph_name", graph_name);
        let table = self
            .runner
            .call_procedure("gds.graph.exists", params, None)
            .await?;
        table.single()?.get("exists")
    }

    /// Drop a projection. With `fail_if_missing` unset, dropping an absent
    /// name resolves to `None` instead of erroring.
    pub async fn drop(&self, graph_name: &str, fail_if_missing: bool) -> Result<Option<Row>> {
        let params = CallParameters::new()
            .with("graph_name", graph_name)
            .with("fail_if_missing", fail_if_missing);
        let table = self
            .runner
            .call_procedure("gds.graph.drop", params, None)
            .await?;
        Ok(table.rows.first().cloned())
    }

    /// A validated handle to an existing projection.
    pub async fn get(&self, graph_name: &str) -> Result<Graph> {
        if !self.exists(graph_name).await? {
            return Err(Error::GraphNotFound(graph_name.to_string()));
        }
        Ok(Graph::new(graph_name, Arc::clone(&self.runner)))
    }
}

// ============================================================================
// Graph handle
// ============================================================================

/// A reference to a graph projection living in the server's memory.
#[derive(Clone)]
pub struct Graph {
    name: String,
    runner: Arc<dyn QueryRunner>,
}

impl Graph {
    pub(crate) fn new(name: impl Into<String>, runner: Arc<dyn QueryRunner>) -> Self {
        Self { name: name.into(), runner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The catalog row for this projection.
    ///
    /// Fails with `Error::GraphNotFound` once the server no longer lists
    /// the name — a dropped handle must not pretend to be alive.
    async fn info(&self) -> Result<Row> {
        let params = CallParameters::new().with("graph_name", self.name.as_str());
        let table = self
            .runner
            .call_procedure("gds.graph.list", params, None)
            .await?;
        match table.rows.first() {
            Some(row) => Ok(row.clone()),
            None => Err(Error::GraphNotFound(self.name.clone())),
        }
    }

    pub async fn node_count(&self) -> Result<i64> {
        self.info().await?.get("nodeCount")
    }

    pub async fn relationship_count(&self) -> Result<i64> {
        self.info().await?.get("relationshipCount")
    }

    pub async fn database(&self) -> Result<String> {
        self.info().await?.get("database")
    }

    pub async fn memory_usage(&self) -> Result<String> {
        self.info().await?.get("memoryUsage")
    }

    pub async fn configuration(&self) -> Result<Value> {
        self.info().await?.get("configuration")
    }

    pub async fn exists(&self) -> Result<bool> {
        let params = CallParameters::new().with("graph_name", self.name.as_str());
        let table = self
            .runner
            .call_procedure("gds.graph.exists", params, None)
            .await?;
        table.single()?.get("exists")
    }

    /// Drop the server-side projection. The handle is dead afterwards.
    pub async fn drop(&self) -> Result<()> {
        let params = CallParameters::new()
            .with("graph_name", self.name.as_str())
            .with("fail_if_missing", true);
        self.runner
            .call_procedure("gds.graph.drop", params, None)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph").field("name", &self.name).finish_non_exhaustive()
    }
}

// ============================================================================
// Project result
// ============================================================================

/// Summary row of a successful projection.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphProjectResult {
    pub graph_name: String,
    pub node_count: i64,
    pub relationship_count: i64,
    pub project_millis: i64,
}

impl GraphProjectResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            graph_name: row.get("graphName")?,
            node_count: row.get("nodeCount")?,
            relationship_count: row.get("relationshipCount")?,
            project_millis: row.get("projectMillis")?,
        })
    }
}

// ============================================================================
// Estimate targets
// ============================================================================

/// Fictitious graph dimensions for memory estimation without a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphDimensions {
    pub node_count: i64,
    pub relationship_count: i64,
}

/// What a memory estimation runs against: an existing projection, or bare
/// dimensions. Resolved explicitly at the call boundary — no duck typing.
#[derive(Debug, Clone)]
pub enum EstimateTarget {
    Named(String),
    Dimensions(GraphDimensions),
}

impl EstimateTarget {
    /// The first positional parameter of an `.estimate` procedure.
    pub fn to_value(&self) -> Value {
        match self {
            EstimateTarget::Named(name) => Value::String(name.clone()),
            EstimateTarget::Dimensions(dims) => Value::Map(HashMap::from([
                ("nodeCount".to_string(), Value::Int(dims.node_count)),
                ("relationshipCount".to_string(), Value::Int(dims.relationship_count)),
            ])),
        }
    }
}

impl From<&Graph> for EstimateTarget {
    fn from(graph: &Graph) -> Self {
        EstimateTarget::Named(graph.name().to_string())
    }
}

impl From<GraphDimensions> for EstimateTarget {
    fn from(dims: GraphDimensions) -> Self {
        EstimateTarget::Dimensions(dims)
    }
}
