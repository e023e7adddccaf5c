//! Algorithm endpoint wrappers.
//!
//! One struct per algorithm family, one method per calling convention.
//! Configs are plain option structs: unset fields never reach the wire, so
//! server-side defaults always apply. Summary-shaped calls decode into
//! typed result objects; `stream` calls return the full table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CallParameters, DataTable, Row, Value};
use crate::ops::graph::{EstimateTarget, Graph};
use crate::ops::job::JobId;
use crate::runner::QueryRunner;
use crate::version::ServerVersion;
use crate::Result;

/// Algorithm wrappers require the 2.x procedure names.
const MIN_ALGO_VERSION: ServerVersion = ServerVersion::new(2, 0, 0);

fn config_map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<HashMap<_, _>>(),
    )
}

// ============================================================================
// Shared results
// ============================================================================

/// Summary row of an `.estimate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateResult {
    pub required_memory: String,
    pub bytes_min: i64,
    pub bytes_max: i64,
    pub node_count: i64,
    pub relationship_count: i64,
}

impl EstimateResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            required_memory: row.get("requiredMemory")?,
            bytes_min: row.get("bytesMin")?,
            bytes_max: row.get("bytesMax")?,
            node_count: row.get("nodeCount")?,
            relationship_count: row.get("relationshipCount")?,
        })
    }
}

// ============================================================================
// PageRank
// ============================================================================

/// Options for the PageRank family. Unset fields use server defaults.
#[derive(Debug, Clone, Default)]
pub struct PageRankConfig {
    pub damping_factor: Option<f64>,
    pub max_iterations: Option<i64>,
    pub tolerance: Option<f64>,
    pub relationship_weight_property: Option<String>,
    pub concurrency: Option<i64>,
    pub job_id: Option<JobId>,
}

impl PageRankConfig {
    fn to_value(&self) -> Value {
        config_map(vec![
            ("damping_factor", self.damping_factor.into()),
            ("max_iterations", self.max_iterations.into()),
            ("tolerance", self.tolerance.into()),
            (
                "relationship_weight_property",
                self.relationship_weight_property.clone().into(),
            ),
            ("concurrency", self.concurrency.into()),
            ("job_id", self.job_id.as_ref().map(|j| j.to_string()).into()),
        ])
    }
}

pub struct PageRank {
    runner: Arc<dyn QueryRunner>,
}

impl PageRank {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    async fn call(
        &self,
        endpoint: &str,
        graph: &Graph,
        extra: Vec<(&str, Value)>,
        config: &PageRankConfig,
    ) -> Result<DataTable> {
        self.runner
            .server_version()
            .require(endpoint, MIN_ALGO_VERSION)?;

        let mut full_config = config.to_value();
        if let Value::Map(map) = &mut full_config {
            for (k, v) in extra {
                map.insert(k.to_string(), v);
            }
        }
        let params = CallParameters::new()
            .with("graph_name", graph.name())
            .with("config", full_config);
        self.runner.call_procedure(endpoint, params, None).await
    }

    /// One row per node: `nodeId`, `score`.
    pub async fn stream(&self, graph: &Graph, config: PageRankConfig) -> Result<DataTable> {
        self.call("gds.pageRank.stream", graph, vec![], &config).await
    }

    pub async fn stats(&self, graph: &Graph, config: PageRankConfig) -> Result<PageRankStatsResult> {
        let table = self.call("gds.pageRank.stats", graph, vec![], &config).await?;
        PageRankStatsResult::from_row(table.single()?)
    }

    pub async fn mutate(
        &self,
        graph: &Graph,
        mutate_property: &str,
        config: PageRankConfig,
    ) -> Result<PageRankMutateResult> {
        let extra = vec![("mutate_property", Value::from(mutate_property))];
        let table = self.call("gds.pageRank.mutate", graph, extra, &config).await?;
        PageRankMutateResult::from_row(table.single()?)
    }

    pub async fn write(
        &self,
        graph: &Graph,
        write_property: &str,
        config: PageRankConfig,
    ) -> Result<PageRankWriteResult> {
        let extra = vec![("write_property", Value::from(write_property))];
        let table = self.call("gds.pageRank.write", graph, extra, &config).await?;
        PageRankWriteResult::from_row(table.single()?)
    }

    /// Memory estimation against a projection or bare dimensions.
    pub async fn estimate(
        &self,
        target: impl Into<EstimateTarget>,
        config: PageRankConfig,
    ) -> Result<EstimateResult> {
        let endpoint = "gds.pageRank.stream.estimate";
        self.runner
            .server_version()
            .require(endpoint, MIN_ALGO_VERSION)?;

        let params = CallParameters::new()
            .with("graph_name", target.into().to_value())
            .with("config", config.to_value());
        let table = self.runner.call_procedure(endpoint, params, None).await?;
        EstimateResult::from_row(table.single()?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRankStatsResult {
    pub ran_iterations: i64,
    pub did_converge: bool,
    pub pre_processing_millis: i64,
    pub compute_millis: i64,
    pub post_processing_millis: i64,
}

impl PageRankStatsResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            ran_iterations: row.get("ranIterations")?,
            did_converge: row.get("didConverge")?,
            pre_processing_millis: row.get("preProcessingMillis")?,
            compute_millis: row.get("computeMillis")?,
            post_processing_millis: row.get("postProcessingMillis")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRankMutateResult {
    pub node_properties_written: i64,
    pub ran_iterations: i64,
    pub did_converge: bool,
    pub mutate_millis: i64,
}

impl PageRankMutateResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            node_properties_written: row.get("nodePropertiesWritten")?,
            ran_iterations: row.get("ranIterations")?,
            did_converge: row.get("didConverge")?,
            mutate_millis: row.get("mutateMillis")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRankWriteResult {
    pub node_properties_written: i64,
    pub ran_iterations: i64,
    pub did_converge: bool,
    pub write_millis: i64,
}

impl PageRankWriteResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            node_properties_written: row.get("nodePropertiesWritten")?,
            ran_iterations: row.get("ranIterations")?,
            did_converge: row.get("didConverge")?,
            write_millis: row.get("writeMillis")?,
        })
    }
}

// ============================================================================
// Weakly connected components
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WccConfig {
    pub threshold: Option<f64>,
    pub relationship_weight_property: Option<String>,
    pub seed_property: Option<String>,
    pub consecutive_ids: Option<bool>,
    pub concurrency: Option<i64>,
    pub job_id: Option<JobId>,
}

impl WccConfig {
    fn to_value(&self) -> Value {
        config_map(vec![
            ("threshold", self.threshold.into()),
            (
                "relationship_weight_property",
                self.relationship_weight_property.clone().into(),
            ),
            ("seed_property", self.seed_property.clone().into()),
            ("consecutive_ids", self.consecutive_ids.into()),
            ("concurrency", self.concurrency.into()),
            ("job_id", self.job_id.as_ref().map(|j| j.to_string()).into()),
        ])
    }
}

pub struct Wcc {
    runner: Arc<dyn QueryRunner>,
}

impl Wcc {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    async fn call(
        &self,
        endpoint: &str,
        graph: &Graph,
        extra: Vec<(&str, Value)>,
        config: &WccConfig,
    ) -> Result<DataTable> {
        self.runner
            .server_version()
            .require(endpoint, MIN_ALGO_VERSION)?;

        let mut full_config = config.to_value();
        if let Value::Map(map) = &mut full_config {
            for (k, v) in extra {
                map.insert(k.to_string(), v);
            }
        }
        let params = CallParameters::new()
            .with("graph_name", graph.name())
            .with("config", full_config);
        self.runner.call_procedure(endpoint, params, None).await
    }

    /// One row per node: `nodeId`, `componentId`.
    pub async fn stream(&self, graph: &Graph, config: WccConfig) -> Result<DataTable> {
        self.call("gds.wcc.stream", graph, vec![], &config).await
    }

    pub async fn stats(&self, graph: &Graph, config: WccConfig) -> Result<WccStatsResult> {
        let table = self.call("gds.wcc.stats", graph, vec![], &config).await?;
        WccStatsResult::from_row(table.single()?)
    }

    pub async fn mutate(
        &self,
        graph: &Graph,
        mutate_property: &str,
        config: WccConfig,
    ) -> Result<WccMutateResult> {
        let extra = vec![("mutate_property", Value::from(mutate_property))];
        let table = self.call("gds.wcc.mutate", graph, extra, &config).await?;
        WccMutateResult::from_row(table.single()?)
    }

    pub async fn write(
        &self,
        graph: &Graph,
        write_property: &str,
        config: WccConfig,
    ) -> Result<WccWriteResult> {
        let extra = vec![("write_property", Value::from(write_property))];
        let table = self.call("gds.wcc.write", graph, extra, &config).await?;
        WccWriteResult::from_row(table.single()?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WccStatsResult {
    pub component_count: i64,
    pub pre_processing_millis: i64,
    pub compute_millis: i64,
    pub post_processing_millis: i64,
}

impl WccStatsResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            component_count: row.get("componentCount")?,
            pre_processing_millis: row.get("preProcessingMillis")?,
            compute_millis: row.get("computeMillis")?,
            post_processing_millis: row.get("postProcessingMillis")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WccMutateResult {
    pub component_count: i64,
    pub node_properties_written: i64,
    pub mutate_millis: i64,
}

impl WccMutateResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            component_count: row.get("componentCount")?,
            node_properties_written: row.get("nodePropertiesWritten")?,
            mutate_millis: row.get("mutateMillis")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WccWriteResult {
    pub component_count: i64,
    pub node_properties_written: i64,
    pub write_millis: i64,
}

impl WccWriteResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            component_count: row.get("componentCount")?,
            node_properties_written: row.get("nodePropertiesWritten")?,
            write_millis: row.get("writeMillis")?,
        })
    }
}

// ============================================================================
// Degree centrality
// ============================================================================

pub struct DegreeCentrality {
    runner: Arc<dyn QueryRunner>,
}

impl DegreeCentrality {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    /// One row per node: `nodeId`, `score`.
    pub async fn stream(
        &self,
        graph: &Graph,
        orientation: Option<&str>,
        concurrency: Option<i64>,
    ) -> Result<DataTable> {
        let endpoint = "gds.degree.stream";
        self.runner
            .server_version()
            .require(endpoint, MIN_ALGO_VERSION)?;

        let config = config_map(vec![
            ("orientation", orientation.into()),
            ("concurrency", concurrency.into()),
        ]);
        let params = CallParameters::new()
            .with("graph_name", graph.name())
            .with("config", config);
        self.runner.call_procedure(endpoint, params, None).await
    }
}
