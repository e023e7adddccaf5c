//! Procedure calls over the primary driver connection.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::dispatch::suggest::suggestive_error;
use crate::model::{CallParameters, DataTable};
use crate::runner::{DriverConnection, QueryRunner};
use crate::version::ServerVersion;
use crate::{Error, Result, MIN_SERVER_VERSION};

/// Procedure the catalog is fetched from.
const LIST_ENDPOINT: &str = "gds.list";

/// Runs procedure calls and raw Cypher over a [`DriverConnection`].
///
/// Owns the current-database context, the probed server version, and the
/// lazily fetched procedure catalog. Construction probes the server and
/// fails with `Error::ConnectionFailure` when the probe cannot complete,
/// so "server unreachable" is distinguishable from "server rejected query".
pub struct CypherQueryRunner {
    driver: Box<dyn DriverConnection>,
    server_version: ServerVersion,
    database: Mutex<Option<String>>,
    catalog: RwLock<Option<Arc<Vec<String>>>>,
    diagnostics: Diagnostics,
}

impl CypherQueryRunner {
    /// Probe the server version and build a runner.
    pub async fn connect(
        driver: Box<dyn DriverConnection>,
        database: Option<String>,
        diagnostics: Diagnostics,
    ) -> Result<Self> {
        let table = driver
            .run("CALL gds.version()", CallParameters::new(), database.as_deref())
            .await
            .map_err(|e| Error::ConnectionFailure {
                message: "unable to probe the server version".into(),
                source: Box::new(e),
            })?;
        let version_string: String = table.single()?.get("version")?;
        let server_version: ServerVersion = version_string.parse()?;
        debug!(target: "gds_rs", %server_version, "connected");

        if server_version < MIN_SERVER_VERSION {
            diagnostics.warn(format!(
                "The client does not support the given server version `{server_version}`. \
                 Update the server or use a client release matching it."
            ));
        }

        Ok(Self {
            driver,
            server_version,
            database: Mutex::new(database),
            catalog: RwLock::new(None),
            diagnostics,
        })
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// A server rejection for an unregistered procedure is turned into the
    /// suggestive client-side error, using the fetched catalog.
    async fn handle_driver_error(&self, error: Error) -> Error {
        static PROCEDURE_MISSING: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"There is no procedure with the name `(gds(?:\.\w+)+)` registered for this database instance",
            )
            .expect("literal pattern")
        });

        let Error::Server(message) = &error else {
            return error;
        };
        let Some(captures) = PROCEDURE_MISSING.captures(message) else {
            return error;
        };
        let requested = captures[1].to_string();

        match self.procedure_catalog().await {
            Ok(catalog) => suggestive_error(&requested, &catalog),
            // Catalog fetch failed too; surface the original rejection.
            Err(_) => error,
        }
    }
}

#[async_trait]
impl QueryRunner for CypherQueryRunner {
    async fn call_procedure(
        &self,
        endpoint: &str,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> Result<DataTable> {
        let mut query = format!("CALL {}({})", endpoint, params.placeholder_string());
        if let Some(columns) = yields {
            query.push_str(" YIELD ");
            query.push_str(&columns.join(", "));
        }
        debug!(target: "gds_rs", %endpoint, "call");

        let database = self.database();
        match self.driver.run(&query, params, database.as_deref()).await {
            Ok(table) => Ok(table),
            Err(e) => Err(self.handle_driver_error(e).await),
        }
    }

    async fn run_cypher(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        let default_db = self.database();
        let database = database.or(default_db.as_deref());
        self.driver.run(query, params, database).await
    }

    async fn procedure_catalog(&self) -> Result<Arc<Vec<String>>> {
        if let Some(catalog) = self.catalog.read().clone() {
            return Ok(catalog);
        }

        let query = format!("CALL {LIST_ENDPOINT}() YIELD name");
        let database = self.database();
        let table = self
            .driver
            .run(&query, CallParameters::new(), database.as_deref())
            .await?;
        let names = Arc::new(table.column_as_strings("name")?);

        *self.catalog.write() = Some(Arc::clone(&names));
        Ok(names)
    }

    fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    fn database(&self) -> Option<String> {
        self.database.lock().clone()
    }

    fn set_database(&self, database: &str) {
        *self.database.lock() = Some(database.to_string());
    }

    async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}
