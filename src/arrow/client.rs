//! Action/stream client for the compute endpoint.
//!
//! Speaks JSON-bodied actions (`v1/CREATE_GRAPH`, `v2/jobs.cancel`, ...)
//! and fetches result tables by JSON ticket, with the transient-error retry
//! policy around every wire exchange. The wire itself is behind
//! [`FlightTransport`]; the `flight` feature provides the tonic-based
//! implementation, tests inject scripted ones.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::retry::{Clock, RetryPolicy};
use super::{ArrowAuthentication, ArrowEndpointVersion};
use crate::model::DataTable;
use crate::{Error, Result};

// ============================================================================
// Transport seam
// ============================================================================

/// The wire operations the client needs from a Flight connection.
#[async_trait]
pub trait FlightTransport: Send + Sync {
    /// Perform the authentication handshake, returning a bearer token when
    /// the server issues one.
    async fn handshake(&self, auth: &ArrowAuthentication) -> Result<Option<String>>;

    /// Execute one action and return the single result body.
    async fn do_action(&self, action_type: &str, body: Vec<u8>) -> Result<Vec<u8>>;

    /// Fetch a result stream by ticket, normalized to a table.
    async fn do_get(&self, ticket: Vec<u8>) -> Result<DataTable>;

    /// Close the underlying connection. Default is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Action results
// ============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NodeLoadDoneResult {
    pub name: String,
    #[serde(alias = "nodeCount")]
    pub node_count: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelationshipLoadDoneResult {
    pub name: String,
    #[serde(alias = "relationshipCount")]
    pub relationship_count: i64,
}

/// Status row of a server-side job (v2 endpoints).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArrowJobStatus {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated action/stream client for the compute endpoint.
pub struct ArrowClient {
    transport: Box<dyn FlightTransport>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    auth: ArrowAuthentication,
    endpoint_version: ArrowEndpointVersion,
    host: String,
    port: u16,
    token: Mutex<Option<String>>,
}

impl ArrowClient {
    pub fn new(
        transport: Box<dyn FlightTransport>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        auth: ArrowAuthentication,
        endpoint_version: ArrowEndpointVersion,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            transport,
            retry,
            clock,
            auth,
            endpoint_version,
            host: host.into(),
            port,
            token: Mutex::new(None),
        }
    }

    /// Host and port of the compute endpoint.
    pub fn connection_info(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn endpoint_version(&self) -> ArrowEndpointVersion {
        self.endpoint_version
    }

    /// The most recently issued bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Authenticate and return the issued token, caching it for reuse.
    /// A no-auth configuration resolves without a handshake.
    pub async fn request_token(&self) -> Result<Option<String>> {
        if matches!(self.auth, ArrowAuthentication::None) {
            return Ok(None);
        }
        let token = self
            .retry
            .run(self.clock.as_ref(), || self.transport.handshake(&self.auth))
            .await?;
        *self.token.lock() = token.clone();
        Ok(token)
    }

    fn versioned_action_type(&self, action_type: &str) -> String {
        format!("{}{}", self.endpoint_version.prefix(), action_type)
    }

    /// Execute one versioned action with the retry policy and decode the
    /// single JSON result body.
    pub async fn send_action(
        &self,
        action_type: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let action_type = self.versioned_action_type(action_type);
        let payload = serde_json::to_vec(&body).map_err(|e| Error::Server(e.to_string()))?;
        debug!(target: "gds_rs", %action_type, "send action");

        let response = self
            .retry
            .run(self.clock.as_ref(), || {
                self.transport.do_action(&action_type, payload.clone())
            })
            .await?;

        serde_json::from_slice(&response).map_err(|e| {
            Error::Server(format!("malformed action response for `{action_type}`: {e}"))
        })
    }

    /// Fetch a result table for a procedure against a projected graph.
    pub async fn stream_procedure(
        &self,
        database: &str,
        graph_name: &str,
        procedure_name: &str,
        configuration: serde_json::Value,
        concurrency: Option<u32>,
    ) -> Result<DataTable> {
        let mut body = json!({
            "database_name": database,
            "graph_name": graph_name,
            "procedure_name": procedure_name,
            "configuration": configuration,
        });
        if let Some(concurrency) = concurrency {
            body["concurrency"] = json!(concurrency);
        }

        // The v1 envelope wraps the payload in a named command.
        let payload = match self.endpoint_version {
            ArrowEndpointVersion::V1 => json!({
                "name": "GET_COMMAND",
                "version": ArrowEndpointVersion::V1.version(),
                "body": body,
            }),
            ArrowEndpointVersion::V2 => body,
        };
        let ticket = serde_json::to_vec(&payload).map_err(|e| Error::Server(e.to_string()))?;

        self.retry
            .run(self.clock.as_ref(), || self.transport.do_get(ticket.clone()))
            .await
    }

    // ========================================================================
    // Graph import actions
    // ========================================================================

    /// Begin a server-side graph import.
    pub async fn create_graph(
        &self,
        graph_name: &str,
        database: &str,
        configuration: serde_json::Value,
    ) -> Result<()> {
        let mut body = json!({
            "name": graph_name,
            "database_name": database,
        });
        if let serde_json::Value::Object(extra) = configuration {
            let obj = body.as_object_mut().expect("body is an object");
            obj.extend(extra);
        }
        self.send_action("CREATE_GRAPH", body).await?;
        Ok(())
    }

    /// Begin a server-side graph import from source/target/type triplets.
    pub async fn create_graph_from_triplets(
        &self,
        graph_name: &str,
        database: &str,
        configuration: serde_json::Value,
    ) -> Result<()> {
        let mut body = json!({
            "name": graph_name,
            "database_name": database,
        });
        if let serde_json::Value::Object(extra) = configuration {
            let obj = body.as_object_mut().expect("body is an object");
            obj.extend(extra);
        }
        self.send_action("CREATE_GRAPH_FROM_TRIPLETS", body).await?;
        Ok(())
    }

    /// Signal that all nodes of an import have been uploaded.
    pub async fn node_load_done(&self, graph_name: &str) -> Result<NodeLoadDoneResult> {
        let response = self
            .send_action("NODE_LOAD_DONE", json!({ "name": graph_name }))
            .await?;
        serde_json::from_value(response).map_err(|e| Error::Server(e.to_string()))
    }

    /// Signal that all relationships of an import have been uploaded.
    pub async fn relationship_load_done(
        &self,
        graph_name: &str,
    ) -> Result<RelationshipLoadDoneResult> {
        let response = self
            .send_action("RELATIONSHIP_LOAD_DONE", json!({ "name": graph_name }))
            .await?;
        serde_json::from_value(response).map_err(|e| Error::Server(e.to_string()))
    }

    /// Abort a server-side graph import.
    pub async fn abort(&self, graph_name: &str) -> Result<()> {
        self.send_action("ABORT", json!({ "name": graph_name })).await?;
        Ok(())
    }

    // ========================================================================
    // Job control (v2 endpoints)
    // ========================================================================

    fn require_v2(&self, operation: &str) -> Result<()> {
        if self.endpoint_version != ArrowEndpointVersion::V2 {
            return Err(Error::Server(format!(
                "`{operation}` requires the v2 streaming endpoint; the server only offers {}",
                self.endpoint_version.version()
            )));
        }
        Ok(())
    }

    /// Poll a server-side job.
    pub async fn job_status(&self, job_id: &str) -> Result<ArrowJobStatus> {
        self.require_v2("jobs.status")?;
        let response = self.send_action("jobs.status", json!({ "jobId": job_id })).await?;
        serde_json::from_value(response).map_err(|e| Error::Server(e.to_string()))
    }

    /// Ask the server to cancel a job.
    pub async fn job_cancel(&self, job_id: &str) -> Result<()> {
        self.require_v2("jobs.cancel")?;
        self.send_action("jobs.cancel", json!({ "jobId": job_id })).await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }
}
