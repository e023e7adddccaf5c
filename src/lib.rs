//! # gds-rs — Graph Analytics Server Client
//!
//! A typed Rust client for a remote graph-analytics server. The client
//! implements no algorithms itself: every operation dispatches to the
//! server over one of two transports and decodes the tabular response.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `QueryRunner` is the contract between the endpoint
//!    surface and the wire; `DriverConnection` and `FlightTransport` are
//!    the seams to the actual transports
//! 2. **References, not data**: graphs, models, and pipelines live
//!    server-side; the client holds revalidatable names
//! 3. **Typed envelopes**: snake_case in, camelCase out, unset options
//!    omitted so server defaults apply
//! 4. **Bounded resilience**: transient transport errors retry under an
//!    explicit policy; semantic errors surface unchanged
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gds_rs::GdsClient;
//!
//! # async fn example(driver: Box<dyn gds_rs::runner::DriverConnection>) -> gds_rs::Result<()> {
//! let client = GdsClient::builder().database("neo4j").connect(driver).await?;
//!
//! let (graph, result) = client
//!     .graph()
//!     .project("g", "*", "*", Default::default())
//!     .await?;
//! println!("projected {} nodes", result.node_count);
//!
//! let scores = client.page_rank().stream(&graph, Default::default()).await?;
//! for row in &scores.rows {
//!     println!("{}: {}", row.get::<i64>("nodeId")?, row.get::<f64>("score")?);
//! }
//! graph.drop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! | Transport | Feature | Description |
//! |-----------|---------|-------------|
//! | Bolt | `bolt` | Procedure calls over the primary driver connection |
//! | Arrow Flight | `flight` | Columnar streaming against the compute endpoint |

// ============================================================================
// Modules
// ============================================================================

pub mod arrow;
pub mod diagnostics;
pub mod dispatch;
pub mod model;
pub mod ops;
pub mod runner;
pub mod version;

#[cfg(feature = "bolt")]
pub mod bolt;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{CallParameters, DataTable, Row, Value};

// ============================================================================
// Re-exports: Runner seams
// ============================================================================

pub use runner::{ArrowQueryRunner, CypherQueryRunner, DriverConnection, QueryRunner};

// ============================================================================
// Re-exports: Version and diagnostics
// ============================================================================

pub use diagnostics::{Diagnostics, WarningPolicy};
pub use version::ServerVersion;

// ============================================================================
// Re-exports: Endpoint surface
// ============================================================================

pub use dispatch::CallBuilder;
pub use ops::{
    DegreeCentrality, EstimateTarget, Graph, GraphDimensions, GraphOps, JobId, JobStatus, Jobs,
    Model, ModelOps, PageRank, Pipeline, PipelineOps, Wcc,
};

use std::sync::Arc;

use crate::arrow::client::FlightTransport;
use crate::arrow::retry::{Clock, RetryPolicy};
use crate::arrow::{ArrowAuthentication, ArrowClient, ArrowEndpointVersion, ArrowInfo};

/// Oldest server line this client release speaks fluently. Older servers
/// still connect, with a compatibility warning.
pub const MIN_SERVER_VERSION: ServerVersion = ServerVersion::new(2, 0, 0);

/// Streaming transport activation requires this server version.
const ARROW_MIN_VERSION: ServerVersion = ServerVersion::new(2, 1, 0);

// ============================================================================
// Error Types
// ============================================================================

/// Transient-or-not classification of a streaming transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request timed out. Transient.
    TimedOut,
    /// The endpoint was unavailable. Transient.
    Unavailable,
    /// The transport reported an internal error. Transient.
    Internal,
    /// The call was cancelled.
    Cancelled,
    /// Authentication was rejected.
    Unauthenticated,
    /// Anything else.
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not establish a connection: {message}")]
    ConnectionFailure {
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    UnresolvableCall(String),

    #[error("'{0}' is a namespace, not a procedure, and cannot be called")]
    NotCallable(String),

    #[error("`{operation}` requires a server version {constraint}, but the server is {actual}")]
    VersionMismatch {
        operation: String,
        constraint: String,
        actual: ServerVersion,
    },

    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("server error: {0}")]
    Server(String),

    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    #[error("There is no projected graph named '{0}'")]
    GraphNotFound(String),

    #[error("There is no model named '{0}'")]
    ModelNotFound(String),

    #[error("There is no pipeline named '{0}'")]
    PipelineNotFound(String),

    #[error("column '{0}' is not present in the result")]
    ColumnNotFound(String),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("expected exactly {expected} row(s), got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("invalid server version string: `{0}`")]
    VersionParse(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a transport failure of a given kind.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Error::Transport { kind, message: message.into() }
    }

    /// Whether the retry policy may re-attempt after this error.
    /// Application-level rejections are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport {
                kind: TransportErrorKind::TimedOut
                    | TransportErrorKind::Unavailable
                    | TransportErrorKind::Internal,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Client configuration
// ============================================================================

/// Whether and how to activate the streaming transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArrowPreference {
    /// Discover the endpoint via the primary connection and activate it
    /// when the server reports it running.
    #[default]
    Discover,
    /// Never use the streaming transport.
    Disabled,
    /// Use this `host:port` instead of the advertised address.
    Address(String),
}

/// Builder for a [`GdsClient`]. All configuration enters here; the client
/// keeps no environment or on-disk state of its own.
pub struct GdsClientBuilder {
    database: Option<String>,
    arrow: ArrowPreference,
    arrow_auth: ArrowAuthentication,
    retry: RetryPolicy,
    diagnostics: Diagnostics,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for GdsClientBuilder {
    fn default() -> Self {
        Self {
            database: None,
            arrow: ArrowPreference::default(),
            arrow_auth: ArrowAuthentication::default(),
            retry: RetryPolicy::default(),
            diagnostics: Diagnostics::default(),
            clock: default_clock(),
        }
    }
}

#[cfg(any(feature = "bolt", feature = "flight"))]
fn default_clock() -> Option<Arc<dyn Clock>> {
    Some(Arc::new(crate::arrow::retry::SystemClock))
}

#[cfg(not(any(feature = "bolt", feature = "flight")))]
fn default_clock() -> Option<Arc<dyn Clock>> {
    None
}

impl GdsClientBuilder {
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn arrow(mut self, preference: ArrowPreference) -> Self {
        self.arrow = preference;
        self
    }

    pub fn arrow_auth(mut self, auth: ArrowAuthentication) -> Self {
        self.arrow_auth = auth;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Time source for the retry policy. Defaults to the system clock when
    /// a transport feature is enabled; tests inject deterministic clocks.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Probe the server over `driver` and build the client.
    ///
    /// The streaming endpoint is discovered here, but the wire to it is
    /// attached separately — see [`GdsClient::with_flight_transport`].
    pub async fn connect(self, driver: Box<dyn DriverConnection>) -> Result<GdsClient> {
        let runner = Arc::new(
            CypherQueryRunner::connect(driver, self.database.clone(), self.diagnostics.clone())
                .await?,
        );
        let server_version = runner.server_version();

        let arrow_info = match &self.arrow {
            ArrowPreference::Disabled => None,
            _ if server_version < ARROW_MIN_VERSION => None,
            _ => match ArrowInfo::discover(runner.as_ref()).await {
                Ok(info) if info.available() => Some(info),
                Ok(_) => {
                    self.diagnostics.warn(
                        "The server's streaming endpoint is not running; \
                         falling back to the primary connection for all calls.",
                    );
                    None
                }
                Err(_) => {
                    // Predictable on servers without the capability.
                    self.diagnostics.warn(
                        "The server does not expose a streaming endpoint; \
                         falling back to the primary connection for all calls.",
                    );
                    None
                }
            },
        };

        let dyn_runner: Arc<dyn QueryRunner> = runner.clone();
        Ok(GdsClient {
            runner: dyn_runner,
            cypher_runner: runner,
            server_version,
            diagnostics: self.diagnostics,
            arrow_preference: self.arrow,
            arrow_auth: self.arrow_auth,
            arrow_info,
            arrow_client: None,
            retry: self.retry,
            clock: self.clock,
        })
    }
}

// ============================================================================
// Top-level client
// ============================================================================

/// The primary entry point: a connected client for the remote server's
/// procedure surface.
///
/// One `GdsClient` wraps one primary connection (and at most one streaming
/// connection). Calls are sequential, blocking round-trips; the client adds
/// no internal locking beyond its caches, so share it across threads only
/// if the underlying transports document thread-safety.
pub struct GdsClient {
    runner: Arc<dyn QueryRunner>,
    cypher_runner: Arc<CypherQueryRunner>,
    server_version: ServerVersion,
    diagnostics: Diagnostics,
    arrow_preference: ArrowPreference,
    arrow_auth: ArrowAuthentication,
    arrow_info: Option<ArrowInfo>,
    arrow_client: Option<Arc<ArrowClient>>,
    retry: RetryPolicy,
    clock: Option<Arc<dyn Clock>>,
}

impl GdsClient {
    pub fn builder() -> GdsClientBuilder {
        GdsClientBuilder::default()
    }

    /// The server version probed at connection time.
    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    /// The streaming endpoint's discovery row, when the server offers one.
    pub fn arrow_info(&self) -> Option<&ArrowInfo> {
        self.arrow_info.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The advertised (or overridden) streaming address to dial.
    fn streaming_address(&self) -> Result<(String, u16)> {
        let address = match &self.arrow_preference {
            ArrowPreference::Address(addr) => addr.clone(),
            _ => self
                .arrow_info
                .as_ref()
                .filter(|info| info.available())
                .map(|info| info.listen_address.clone())
                .ok_or_else(|| {
                    Error::Server("the server does not offer a running streaming endpoint".into())
                })?,
        };
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::Protocol(format!("malformed listen address `{address}`")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::Protocol(format!("malformed listen address `{address}`")))?;
        Ok((host.to_string(), port))
    }

    /// Attach a streaming transport: authenticate it, then route
    /// streaming-capable procedures through it.
    ///
    /// The transport is built by the caller (the `flight` feature provides
    /// [`GdsClient::with_flight`]); this keeps the wire injectable.
    pub async fn with_flight_transport(
        mut self,
        transport: Box<dyn FlightTransport>,
    ) -> Result<GdsClient> {
        let (host, port) = self.streaming_address()?;
        let clock = self.clock.clone().ok_or_else(|| {
            Error::Server("no clock configured for the retry policy".into())
        })?;
        let endpoint_version = match &self.arrow_info {
            Some(info) => ArrowEndpointVersion::from_versions(&info.versions, &self.diagnostics),
            None => ArrowEndpointVersion::default(),
        };

        let client = Arc::new(ArrowClient::new(
            transport,
            self.retry.clone(),
            clock,
            self.arrow_auth.clone(),
            endpoint_version,
            host,
            port,
        ));
        client.request_token().await?;

        self.runner = Arc::new(ArrowQueryRunner::new(
            Arc::clone(&client),
            Arc::clone(&self.runner),
            self.diagnostics.clone(),
        ));
        self.arrow_client = Some(client);
        Ok(self)
    }

    /// Dial the advertised streaming endpoint over Arrow Flight and attach
    /// it.
    #[cfg(feature = "flight")]
    pub async fn with_flight(self, options: crate::arrow::flight::TlsOptions) -> Result<GdsClient> {
        let (host, port) = self.streaming_address()?;
        let transport =
            crate::arrow::flight::TonicFlightTransport::connect(&host, port, options).await?;
        self.with_flight_transport(Box::new(transport)).await
    }

    // ========================================================================
    // Dynamic dispatch
    // ========================================================================

    /// Start a runtime-resolved procedure call, e.g.
    /// `client.call("pageRank").stream()`.
    pub fn call(&self, path: &str) -> CallBuilder {
        CallBuilder::new(Arc::clone(&self.runner), "gds").path(path)
    }

    /// The `gds.alpha` namespace.
    pub fn alpha(&self) -> CallBuilder {
        CallBuilder::new(Arc::clone(&self.runner), "gds.alpha")
    }

    /// The `gds.beta` namespace.
    pub fn beta(&self) -> CallBuilder {
        CallBuilder::new(Arc::clone(&self.runner), "gds.beta")
    }

    // ========================================================================
    // Typed endpoint surface
    // ========================================================================

    pub fn graph(&self) -> GraphOps {
        ops::graph::GraphOps::new(Arc::clone(&self.runner))
    }

    pub fn models(&self) -> ModelOps {
        ops::model::ModelOps::new(Arc::clone(&self.runner))
    }

    pub fn pipelines(&self) -> PipelineOps {
        ops::pipeline::PipelineOps::new(Arc::clone(&self.runner))
    }

    pub fn jobs(&self) -> Jobs {
        ops::job::Jobs::new(Arc::clone(&self.runner), self.arrow_client.clone())
    }

    pub fn page_rank(&self) -> PageRank {
        ops::algo::PageRank::new(Arc::clone(&self.runner))
    }

    pub fn wcc(&self) -> Wcc {
        ops::algo::Wcc::new(Arc::clone(&self.runner))
    }

    pub fn degree(&self) -> DegreeCentrality {
        ops::algo::DegreeCentrality::new(Arc::clone(&self.runner))
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    /// Run a raw Cypher query over the primary connection.
    ///
    /// Never routed to the streaming transport, which only accepts
    /// structured actions.
    pub async fn run_cypher(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        self.cypher_runner.run_cypher(query, params, database).await
    }

    /// The database subsequent calls run against by default.
    pub fn database(&self) -> Option<String> {
        self.runner.database()
    }

    /// Change the default database for subsequent calls.
    pub fn set_database(&self, database: &str) {
        self.runner.set_database(database);
    }

    /// Release both transports.
    pub async fn close(&self) -> Result<()> {
        self.runner.close().await
    }
}
