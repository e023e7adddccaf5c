//! Routing façade over the streaming transport.
//!
//! Streaming-capable catalog procedures go to the compute endpoint;
//! everything else — and ALL raw Cypher text — goes to the fallback runner.
//! Raw query text is never eligible for the streaming channel, which only
//! accepts structured actions and tickets.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::arrow::ArrowClient;
use crate::diagnostics::Diagnostics;
use crate::model::{CallParameters, DataTable, Value};
use crate::runner::QueryRunner;
use crate::version::ServerVersion;
use crate::{Error, Result};

/// Database streamed against when the caller never selected one.
const DEFAULT_DATABASE: &str = "neo4j";

/// Catalog procedures served by the streaming transport.
pub const STREAMING_ENDPOINTS: &[&str] = &[
    "gds.graph.nodeProperty.stream",
    "gds.graph.nodeProperties.stream",
    "gds.graph.relationshipProperty.stream",
    "gds.graph.relationshipProperties.stream",
    "gds.graph.relationships.stream",
];

/// Still-served aliases of renamed streaming procedures, mapped to their
/// replacements. Use re-emits a deprecation notice.
const DEPRECATED_ALIASES: &[(&str, &str)] = &[
    ("gds.graph.streamNodeProperty", "gds.graph.nodeProperty.stream"),
    ("gds.graph.streamNodeProperties", "gds.graph.nodeProperties.stream"),
    ("gds.graph.streamRelationshipProperty", "gds.graph.relationshipProperty.stream"),
    ("gds.graph.streamRelationshipProperties", "gds.graph.relationshipProperties.stream"),
];

pub struct ArrowQueryRunner {
    arrow: Arc<ArrowClient>,
    fallback: Arc<dyn QueryRunner>,
    diagnostics: Diagnostics,
}

impl ArrowQueryRunner {
    pub fn new(
        arrow: Arc<ArrowClient>,
        fallback: Arc<dyn QueryRunner>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self { arrow, fallback, diagnostics }
    }

    /// The runner behind the streaming façade, for operations that must
    /// bypass it (raw Cypher).
    pub fn fallback_query_runner(&self) -> Arc<dyn QueryRunner> {
        Arc::clone(&self.fallback)
    }

    pub fn arrow_client(&self) -> Arc<ArrowClient> {
        Arc::clone(&self.arrow)
    }

    fn required_string(params: &CallParameters, key: &str) -> Result<String> {
        params
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::MissingParameter(key.to_string()))
    }

    async fn stream_over_arrow(
        &self,
        endpoint: &str,
        params: CallParameters,
    ) -> Result<DataTable> {
        let graph_name = Self::required_string(&params, "graph_name")?;
        let database = self.database().unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let mut configuration = json!({});
        match params.get("properties") {
            Some(Value::String(prop)) => configuration["node_property"] = json!(prop),
            Some(Value::List(props)) => {
                let names: Vec<&str> = props.iter().filter_map(Value::as_str).collect();
                configuration["node_properties"] = json!(names);
            }
            _ => {}
        }
        if let Some(Value::List(entities)) = params.get("entities") {
            let names: Vec<&str> = entities.iter().filter_map(Value::as_str).collect();
            if !names.iter().all(|n| *n == "*") {
                configuration["node_labels"] = json!(names);
            }
        }

        let mut concurrency = None;
        if let Some(Value::Map(config)) = params.get("config") {
            if let Some(c) = config.get("concurrency").and_then(Value::as_int) {
                concurrency = Some(c as u32);
            }
            if let Some(list) = config.get("listNodeLabels").and_then(Value::as_bool) {
                configuration["list_node_labels"] = json!(list);
            }
        }

        self.arrow
            .stream_procedure(&database, &graph_name, endpoint, configuration, concurrency)
            .await
    }
}

#[async_trait]
impl QueryRunner for ArrowQueryRunner {
    async fn call_procedure(
        &self,
        endpoint: &str,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> Result<DataTable> {
        let endpoint = match DEPRECATED_ALIASES.iter().find(|(old, _)| *old == endpoint) {
            Some((old, new)) => {
                self.diagnostics.deprecation(old, new);
                *new
            }
            None => endpoint,
        };

        if STREAMING_ENDPOINTS.contains(&endpoint) {
            return self.stream_over_arrow(endpoint, params).await;
        }
        self.fallback.call_procedure(endpoint, params, yields).await
    }

    async fn run_cypher(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        // Arbitrary query text is not a structured action; always fall back.
        self.fallback.run_cypher(query, params, database).await
    }

    async fn procedure_catalog(&self) -> Result<Arc<Vec<String>>> {
        self.fallback.procedure_catalog().await
    }

    fn server_version(&self) -> ServerVersion {
        self.fallback.server_version()
    }

    fn database(&self) -> Option<String> {
        self.fallback.database()
    }

    fn set_database(&self, database: &str) {
        self.fallback.set_database(database);
    }

    async fn close(&self) -> Result<()> {
        self.arrow.close().await?;
        self.fallback.close().await
    }
}
