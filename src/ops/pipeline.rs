//! Training pipeline operations and the remote pipeline handle.
//!
//! Pipelines are configured step by step server-side and then trained as a
//! long-running job, producing a model. The handle pattern matches graphs
//! and models: a name, lazy metadata, explicit drop.

use std::sync::Arc;

use crate::model::{CallParameters, DataTable, Row, Value};
use crate::ops::graph::Graph;
use crate::ops::job::JobId;
use crate::ops::model::Model;
use crate::runner::QueryRunner;
use crate::{Error, Result};

const NC_NAMESPACE: &str = "gds.beta.pipeline.nodeClassification";

// ============================================================================
// Catalog operations
// ============================================================================

/// Wrappers for the `gds.beta.pipeline.*` catalog procedures.
pub struct PipelineOps {
    runner: Arc<dyn QueryRunner>,
}

impl PipelineOps {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    /// Create an empty node-classification training pipeline.
    pub async fn create_node_classification(&self, pipeline_name: &str) -> Result<Pipeline> {
        let params = CallParameters::new().with("pipeline_name", pipeline_name);
        self.runner
            .call_procedure(&format!("{NC_NAMESPACE}.create"), params, None)
            .await?;
        Ok(Pipeline::new(pipeline_name, Arc::clone(&self.runner)))
    }

    pub async fn list(&self) -> Result<DataTable> {
        self.runner
            .call_procedure("gds.beta.pipeline.list", CallParameters::new(), None)
            .await
    }

    pub async fn exists(&self, pipeline_name: &str) -> Result<bool> {
        let params = CallParameters::new().with("pipeline_name", pipeline_name);
        let table = self
            .runner
            .call_procedure("gds.beta.pipeline.exists", params, None)
            .await?;
        table.single()?.get("exists")
    }

    pub async fn drop(&self, pipeline_name: &str) -> Result<Option<Row>> {
        let params = CallParameters::new().with("pipeline_name", pipeline_name);
        let table = self
            .runner
            .call_procedure("gds.beta.pipeline.drop", params, None)
            .await?;
        Ok(table.rows.first().cloned())
    }

    /// A validated handle to an existing pipeline.
    pub async fn get(&self, pipeline_name: &str) -> Result<Pipeline> {
        if !self.exists(pipeline_name).await? {
            return Err(Error::PipelineNotFound(pipeline_name.to_string()));
        }
        Ok(Pipeline::new(pipeline_name, Arc::clone(&self.runner)))
    }
}

// ============================================================================
// Pipeline handle
// ============================================================================

/// A reference to a node-classification training pipeline stored
/// server-side.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    runner: Arc<dyn QueryRunner>,
}

impl Pipeline {
    pub(crate) fn new(name: impl Into<String>, runner: Arc<dyn QueryRunner>) -> Self {
        Self { name: name.into(), runner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node-property computation step, e.g. `"pageRank"` with a
    /// `mutateProperty` in the config.
    pub async fn add_node_property(
        &self,
        procedure_name: &str,
        config: CallParameters,
    ) -> Result<DataTable> {
        let params = CallParameters::new()
            .with("pipeline_name", self.name.as_str())
            .with("procedure_name", procedure_name)
            .with("config", Value::Map(config.to_map()));
        self.runner
            .call_procedure(&format!("{NC_NAMESPACE}.addNodeProperty"), params, None)
            .await
    }

    /// Select which node properties enter the feature vector.
    pub async fn select_features(&self, node_properties: Vec<String>) -> Result<DataTable> {
        let params = CallParameters::new()
            .with("pipeline_name", self.name.as_str())
            .with("node_properties", node_properties);
        self.runner
            .call_procedure(&format!("{NC_NAMESPACE}.selectFeatures"), params, None)
            .await
    }

    /// Add a logistic-regression model candidate.
    pub async fn add_logistic_regression(&self, config: CallParameters) -> Result<DataTable> {
        let params = CallParameters::new()
            .with("pipeline_name", self.name.as_str())
            .with("config", Value::Map(config.to_map()));
        self.runner
            .call_procedure(&format!("{NC_NAMESPACE}.addLogisticRegression"), params, None)
            .await
    }

    /// Train against a projection. Runs as a server-side job: the
    /// identifier is taken from `config` when supplied, generated
    /// otherwise, and returned for progress polling.
    pub async fn train(
        &self,
        graph: &Graph,
        model_name: &str,
        target_property: &str,
        mut config: CallParameters,
    ) -> Result<(Model, TrainResult, JobId)> {
        let job_id = match config.get("job_id").and_then(Value::as_str) {
            Some(id) => JobId::from(id),
            None => JobId::new(),
        };
        config.insert("pipeline", self.name.as_str());
        config.insert("model_name", model_name);
        config.insert("target_property", target_property);
        config.insert("job_id", job_id.as_str());

        let params = CallParameters::new()
            .with("graph_name", graph.name())
            .with("config", Value::Map(config.to_map()));
        let table = self
            .runner
            .call_procedure(&format!("{NC_NAMESPACE}.train"), params, None)
            .await?;
        let result = TrainResult::from_row(table.single()?)?;
        let model = Model::new(model_name, Arc::clone(&self.runner));
        Ok((model, result, job_id))
    }

    /// Drop the server-side pipeline. The handle is dead afterwards.
    pub async fn drop(&self) -> Result<()> {
        let params = CallParameters::new().with("pipeline_name", self.name.as_str());
        self.runner
            .call_procedure("gds.beta.pipeline.drop", params, None)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("name", &self.name).finish_non_exhaustive()
    }
}

// ============================================================================
// Train result
// ============================================================================

/// Summary row of a completed training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainResult {
    pub train_millis: i64,
    pub model_info: Value,
    pub configuration: Value,
}

impl TrainResult {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            train_millis: row.get("trainMillis")?,
            model_info: row.get("modelInfo")?,
            configuration: row.get("configuration")?,
        })
    }
}
