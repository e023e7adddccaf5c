//! # Dynamic call dispatch
//!
//! Lets a caller name a remote procedure that is not statically wrapped:
//! a [`CallBuilder`] accumulates path segments at runtime and resolves the
//! dot-joined chain against the server's procedure catalog at the moment of
//! invocation. Resolution failures surface as one error kind with a
//! best-effort suggestion; an invoked namespace prefix is its own, distinct
//! error. Nothing here retries — retries belong to the transport.

pub mod suggest;

use std::sync::Arc;

use crate::model::{CallParameters, DataTable};
use crate::runner::QueryRunner;
use crate::{Error, Result};

/// The calling conventions a procedure name can end in.
pub const MODE_SUFFIXES: &[&str] = &["stream", "mutate", "write", "stats", "estimate", "train"];

/// How a dot-joined chain relates to the procedure catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    /// The chain (possibly mode-adjusted) names a callable procedure.
    Procedure(String),
    /// The chain is a namespace prefix of other procedures.
    Namespace,
    /// The chain matches nothing.
    Unknown,
}

fn resolve(name: &str, catalog: &[String]) -> Resolution {
    if catalog.iter().any(|c| c == name) {
        return Resolution::Procedure(name.to_string());
    }

    // Removing a trailing mode suffix: `foo.stream` where only `foo` is
    // registered resolves to the direct call.
    if let Some((head, tail)) = name.rsplit_once('.') {
        if MODE_SUFFIXES.contains(&tail) && catalog.iter().any(|c| c == head) {
            return Resolution::Procedure(head.to_string());
        }
    }

    let prefix = format!("{name}.");
    let children: Vec<&str> = catalog
        .iter()
        .filter_map(|c| c.strip_prefix(prefix.as_str()))
        .collect();
    if children.is_empty() {
        return Resolution::Unknown;
    }

    // Inserting a mode suffix is only unambiguous when the chain has
    // exactly one child and that child is a mode. `gds.pageRank` (four
    // modes) and `gds.graph` (a real namespace) both stay uncallable.
    if let [only] = children.as_slice() {
        if MODE_SUFFIXES.contains(only) {
            return Resolution::Procedure(format!("{name}.{only}"));
        }
    }

    Resolution::Namespace
}

/// A runtime-assembled procedure call.
///
/// Obtained from `GdsClient::call`; each [`path`](Self::path) (or mode
/// shorthand) appends a segment, and [`run`](Self::run) resolves and
/// dispatches. The builder holds no network state until `run`.
pub struct CallBuilder {
    runner: Arc<dyn QueryRunner>,
    namespace: String,
}

impl CallBuilder {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>, root: impl Into<String>) -> Self {
        Self { runner, namespace: root.into() }
    }

    /// Append one or more dot-separated segments to the chain.
    pub fn path(mut self, segment: &str) -> Self {
        for part in segment.split('.').filter(|p| !p.is_empty()) {
            self.namespace.push('.');
            self.namespace.push_str(part);
        }
        self
    }

    /// The accumulated chain so far.
    pub fn name(&self) -> &str {
        &self.namespace
    }

    pub fn stream(self) -> Self { self.path("stream") }
    pub fn mutate(self) -> Self { self.path("mutate") }
    pub fn write(self) -> Self { self.path("write") }
    pub fn stats(self) -> Self { self.path("stats") }
    pub fn estimate(self) -> Self { self.path("estimate") }
    pub fn train(self) -> Self { self.path("train") }

    /// Resolve the chain against the catalog and dispatch.
    pub async fn run(self, params: CallParameters) -> Result<DataTable> {
        self.run_yielding(params, None).await
    }

    /// Like [`run`](Self::run), restricting the returned columns.
    pub async fn run_yielding(
        self,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> Result<DataTable> {
        let catalog = self.runner.procedure_catalog().await?;
        match resolve(&self.namespace, &catalog) {
            Resolution::Procedure(endpoint) => {
                self.runner.call_procedure(&endpoint, params, yields).await
            }
            Resolution::Namespace => Err(Error::NotCallable(self.namespace)),
            Resolution::Unknown => Err(suggest::suggestive_error(&self.namespace, &catalog)),
        }
    }
}
