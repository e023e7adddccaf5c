//! # Query runner trait
//!
//! This is THE contract between the typed endpoint surface and the wire.
//! Every remote operation the client performs is one of two shapes: a named
//! procedure call or a raw Cypher query, both returning a [`DataTable`].
//!
//! ## Implementations
//!
//! | Runner | Module | Description |
//! |--------|--------|-------------|
//! | `CypherQueryRunner` | `cypher` | Procedure calls over a driver connection |
//! | `ArrowQueryRunner` | `arrow` | Streaming-capable calls over Arrow Flight, rest delegated |

pub mod arrow;
pub mod cypher;

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{CallParameters, DataTable};
use crate::version::ServerVersion;
use crate::Result;

pub use self::arrow::ArrowQueryRunner;
pub use self::cypher::CypherQueryRunner;

// ============================================================================
// QueryRunner trait
// ============================================================================

/// The universal call contract.
///
/// A runner is `Send + Sync` so it can sit behind an `Arc`, but sequential
/// use per caller is the intended model: operations are synchronous
/// round-trips, and concurrent calls on one runner are only safe if the
/// underlying transport documents thread-safety.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Call a named remote procedure with positional parameters.
    ///
    /// `yields` restricts the returned columns (`CALL ... YIELD a, b`).
    async fn call_procedure(
        &self,
        endpoint: &str,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> Result<DataTable>;

    /// Run a raw Cypher query.
    ///
    /// Raw query text is never eligible for the streaming transport; an
    /// implementation that owns one must route this to its fallback.
    async fn run_cypher(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable>;

    /// The names of all procedures the server exposes, fetched lazily and
    /// cached for the life of the runner.
    async fn procedure_catalog(&self) -> Result<Arc<Vec<String>>>;

    /// The server version probed at connection time.
    fn server_version(&self) -> ServerVersion;

    /// The database subsequent calls run against by default.
    fn database(&self) -> Option<String>;

    /// Change the default database for subsequent calls.
    fn set_database(&self, database: &str);

    /// Release transport resources. Default is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// DriverConnection trait
// ============================================================================

/// The seam to the external database driver.
///
/// `CypherQueryRunner` is transport-agnostic above this line: anything that
/// can run a parameterized query against a database and return rows can
/// serve as the primary connection. The `bolt` feature provides a real
/// implementation; tests inject scripted ones.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Run one parameterized query, optionally against a named database.
    async fn run(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable>;

    /// Close the underlying connection. Default is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
