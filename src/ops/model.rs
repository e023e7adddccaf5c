//! Model catalog operations and the remote model handle.
//!
//! Same ownership pattern as graph handles: the trained model lives
//! server-side, the client holds a name and fetches metadata lazily.

use std::sync::Arc;

use crate::model::{CallParameters, DataTable, Row};
use crate::runner::QueryRunner;
use crate::version::ServerVersion;
use crate::{Error, Result};

/// `gds.model.*` procedure names landed with 2.5.
const MODEL_CATALOG_VERSION: ServerVersion = ServerVersion::new(2, 5, 0);

// ============================================================================
// Catalog operations
// ============================================================================

/// Wrappers for the `gds.model.*` catalog procedures.
pub struct ModelOps {
    runner: Arc<dyn QueryRunner>,
}

impl ModelOps {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self) -> Result<DataTable> {
        self.runner
            .call_procedure("gds.model.list", CallParameters::new(), None)
            .await
    }

    pub async fn exists(&self, model_name: &str) -> Result<bool> {
        let params = CallParameters::new().with("model_name", model_name);
        let table = self
            .runner
            .call_procedure("gds.model.exists", params, None)
            .await?;
        table.single()?.get("exists")
    }

    pub async fn drop(&self, model_name: &str) -> Result<Option<Row>> {
        let params = CallParameters::new().with("model_name", model_name);
        let table = self
            .runner
            .call_procedure("gds.model.drop", params, None)
            .await?;
        Ok(table.rows.first().cloned())
    }

    /// A validated handle to a stored model.
    pub async fn get(&self, model_name: &str) -> Result<Model> {
        if !self.exists(model_name).await? {
            return Err(Error::ModelNotFound(model_name.to_string()));
        }
        Ok(Model::new(model_name, Arc::clone(&self.runner)))
    }
}

// ============================================================================
// Model handle
// ============================================================================

/// A reference to a trained model stored server-side.
#[derive(Clone)]
pub struct Model {
    name: String,
    runner: Arc<dyn QueryRunner>,
}

impl Model {
    pub(crate) fn new(name: impl Into<String>, runner: Arc<dyn QueryRunner>) -> Self {
        Self { name: name.into(), runner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn info(&self) -> Result<Row> {
        let params = CallParameters::new().with("model_name", self.name.as_str());
        let table = self
            .runner
            .call_procedure("gds.model.list", params, None)
            .await?;
        match table.rows.first() {
            Some(row) => Ok(row.clone()),
            None => Err(Error::ModelNotFound(self.name.clone())),
        }
    }

    pub async fn details(&self) -> Result<ModelDetails> {
        ModelDetails::from_row(&self.info().await?)
    }

    pub async fn exists(&self) -> Result<bool> {
        let params = CallParameters::new().with("model_name", self.name.as_str());
        let table = self
            .runner
            .call_procedure("gds.model.exists", params, None)
            .await?;
        table.single()?.get("exists")
    }

    /// Make the model visible to all users of the server.
    ///
    /// Requires server `>= 2.5.0`; checked before any network call.
    pub async fn publish(&self) -> Result<ModelDetails> {
        self.runner
            .server_version()
            .require("model.publish", MODEL_CATALOG_VERSION)?;

        let params = CallParameters::new().with("model_name", self.name.as_str());
        let table = self
            .runner
            .call_procedure("gds.model.publish", params, None)
            .await?;
        ModelDetails::from_row(table.single()?)
    }

    /// Drop the server-side model. The handle is dead afterwards.
    pub async fn drop(&self) -> Result<()> {
        let params = CallParameters::new().with("model_name", self.name.as_str());
        self.runner
            .call_procedure("gds.model.drop", params, None)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("name", &self.name).finish_non_exhaustive()
    }
}

// ============================================================================
// Details row
// ============================================================================

/// Catalog metadata of a stored model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDetails {
    pub name: String,
    pub model_type: String,
    pub loaded: bool,
    pub stored: bool,
    pub published: bool,
}

impl ModelDetails {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            name: row.get("modelName")?,
            model_type: row.get("modelType")?,
            loaded: row.get("loaded")?,
            stored: row.get("stored")?,
            published: row.get("published")?,
        })
    }
}
