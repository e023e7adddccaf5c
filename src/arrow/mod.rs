//! # Streaming transport (Arrow Flight)
//!
//! The compute server advertises a separate columnar endpoint, discovered
//! over the primary connection. This module holds the discovery row, the
//! authentication modes, the retry policy, and the action/stream client.
//! The wire itself sits behind the [`FlightTransport`](client::FlightTransport)
//! seam; the `flight` feature provides the real tonic-based implementation.

pub mod client;
pub mod retry;
#[cfg(feature = "flight")]
pub mod flight;

use crate::diagnostics::Diagnostics;
use crate::model::CallParameters;
use crate::runner::QueryRunner;
use crate::Result;

pub use self::client::{ArrowClient, FlightTransport};
pub use self::retry::{Clock, RetryPolicy};

/// Procedure the streaming endpoint is discovered from.
pub const DEBUG_ARROW_ENDPOINT: &str = "gds.debug.arrow";

// ============================================================================
// Discovery
// ============================================================================

/// What the server reports about its streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowInfo {
    /// Advertised `host:port` of the Flight endpoint.
    pub listen_address: String,
    /// Whether the endpoint is configured on.
    pub enabled: bool,
    /// Whether the endpoint is actually serving. Activation requires this.
    pub running: bool,
    /// Supported endpoint versions, e.g. `["v1", "v2"]`.
    pub versions: Vec<String>,
}

impl ArrowInfo {
    /// Fetch the discovery row over the primary connection.
    pub async fn discover(runner: &dyn QueryRunner) -> Result<Self> {
        let table = runner
            .call_procedure(DEBUG_ARROW_ENDPOINT, CallParameters::new(), None)
            .await?;
        let row = table.single()?;
        Ok(Self {
            listen_address: row.get("listenAddress")?,
            enabled: row.get("enabled")?,
            running: row.get("running")?,
            versions: row.get_optional::<Vec<String>>("versions")?.unwrap_or_default(),
        })
    }

    /// Whether the streaming transport may be activated at all.
    pub fn available(&self) -> bool {
        self.enabled && self.running
    }
}

// ============================================================================
// Endpoint version
// ============================================================================

/// Version of the action/ticket envelope the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrowEndpointVersion {
    #[default]
    V1,
    V2,
}

impl ArrowEndpointVersion {
    pub fn version(&self) -> &'static str {
        match self {
            ArrowEndpointVersion::V1 => "v1",
            ArrowEndpointVersion::V2 => "v2",
        }
    }

    /// Prefix applied to action type names, e.g. `v1/CREATE_GRAPH`.
    pub fn prefix(&self) -> String {
        format!("{}/", self.version())
    }

    /// Pick the newest mutually supported envelope version. Unknown future
    /// version lists fall back to v1 with a warning rather than failing.
    pub fn from_versions(versions: &[String], diagnostics: &Diagnostics) -> Self {
        if versions.iter().any(|v| v == "v2") {
            ArrowEndpointVersion::V2
        } else if versions.is_empty() || versions.iter().any(|v| v == "v1") {
            ArrowEndpointVersion::V1
        } else {
            diagnostics.warn(format!(
                "Unknown streaming endpoint versions {versions:?}; assuming v1."
            ));
            ArrowEndpointVersion::V1
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// How the client authenticates against the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArrowAuthentication {
    /// No authentication handshake.
    #[default]
    None,
    /// Basic username/password handshake, exchanged for a bearer token.
    UsernamePassword { username: String, password: String },
    /// A pre-issued bearer token.
    Token(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningPolicy;

    #[test]
    fn endpoint_version_selection() {
        let diags = Diagnostics::new(WarningPolicy::Collect);
        let v = |s: &[&str]| s.iter().map(|x| x.to_string()).collect::<Vec<_>>();

        assert_eq!(
            ArrowEndpointVersion::from_versions(&v(&["v1"]), &diags),
            ArrowEndpointVersion::V1
        );
        assert_eq!(
            ArrowEndpointVersion::from_versions(&v(&["v1", "v2"]), &diags),
            ArrowEndpointVersion::V2
        );
        assert_eq!(
            ArrowEndpointVersion::from_versions(&v(&[]), &diags),
            ArrowEndpointVersion::V1
        );
        assert!(diags.drain().is_empty());

        assert_eq!(
            ArrowEndpointVersion::from_versions(&v(&["v9"]), &diags),
            ArrowEndpointVersion::V1
        );
        assert_eq!(diags.drain().len(), 1);
    }

    #[test]
    fn availability_needs_enabled_and_running() {
        let mut info = ArrowInfo {
            listen_address: "localhost:8491".into(),
            enabled: true,
            running: false,
            versions: vec![],
        };
        assert!(!info.available());
        info.running = true;
        assert!(info.available());
    }
}
