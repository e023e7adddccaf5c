//! # Typed endpoint wrappers
//!
//! Per-operation wrappers that turn idiomatic, typed calls into the exact
//! procedure envelope the server expects: snake_case arguments become
//! camelCase parameters, unset options are omitted so server defaults
//! apply, and single-row summaries decode into typed result objects.
//! Version-gated operations check the probed server version before any
//! network round-trip.

pub mod algo;
pub mod graph;
pub mod job;
pub mod model;
pub mod pipeline;

pub use algo::{DegreeCentrality, EstimateResult, PageRank, PageRankConfig, Wcc, WccConfig};
pub use graph::{EstimateTarget, Graph, GraphDimensions, GraphOps, GraphProjectResult};
pub use job::{JobId, JobProgress, JobStatus, Jobs};
pub use model::{Model, ModelDetails, ModelOps};
pub use pipeline::{Pipeline, PipelineOps, TrainResult};
