//! Shared test doubles: a scripted driver connection and a scripted
//! flight transport, both recording every invocation.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use gds_rs::arrow::client::FlightTransport;
use gds_rs::arrow::retry::Clock;
use gds_rs::arrow::ArrowAuthentication;
use gds_rs::runner::DriverConnection;
use gds_rs::{CallParameters, DataTable, Error, Result, Row, TransportErrorKind};

// ============================================================================
// Scripted driver connection
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub query: String,
    pub params: CallParameters,
    pub database: Option<String>,
}

#[derive(Default)]
pub struct MockDriverState {
    results: Mutex<Vec<(String, DataTable)>>,
    calls: Mutex<Vec<RecordedQuery>>,
}

impl MockDriverState {
    /// Script the result for any query containing `substring`. Re-using a
    /// substring replaces the previous script.
    pub fn set_result(&self, substring: &str, result: DataTable) {
        let mut results = self.results.lock();
        if let Some(entry) = results.iter_mut().find(|(s, _)| s == substring) {
            entry.1 = result;
        } else {
            results.push((substring.to_string(), result));
        }
    }

    /// Every query the driver has run, in order.
    pub fn calls(&self) -> Vec<RecordedQuery> {
        self.calls.lock().clone()
    }

    /// How many recorded queries contain `substring`.
    pub fn call_count(&self, substring: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.query.contains(substring))
            .count()
    }
}

/// A `DriverConnection` that replays scripted tables by query substring,
/// recording every call. Unscripted queries return an empty table.
pub struct MockDriver {
    state: Arc<MockDriverState>,
}

impl MockDriver {
    /// A driver whose server reports the given version.
    pub fn new(server_version: &str) -> Self {
        let state = Arc::new(MockDriverState::default());
        state.set_result(
            "CALL gds.version",
            table(&["version"], vec![vec![server_version.into()]]),
        );
        Self { state }
    }

    /// Shared handle for scripting and assertions after the driver has
    /// been boxed away into the client.
    pub fn state(&self) -> Arc<MockDriverState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl DriverConnection for MockDriver {
    async fn run(
        &self,
        query: &str,
        params: CallParameters,
        database: Option<&str>,
    ) -> Result<DataTable> {
        self.state.calls.lock().push(RecordedQuery {
            query: query.to_string(),
            params,
            database: database.map(str::to_owned),
        });

        let results = self.state.results.lock();
        let matches: Vec<&(String, DataTable)> =
            results.iter().filter(|(s, _)| query.contains(s.as_str())).collect();
        match matches.as_slice() {
            [] => Ok(DataTable::default()),
            [(_, result)] => Ok(result.clone()),
            many => panic!(
                "query `{query}` matched {} scripts: {:?}",
                many.len(),
                many.iter().map(|(s, _)| s).collect::<Vec<_>>()
            ),
        }
    }
}

/// Build a table from column names and rows of values.
pub fn table(columns: &[&str], rows: Vec<Vec<gds_rs::Value>>) -> DataTable {
    let mut result = DataTable::new(columns.iter().map(|c| c.to_string()).collect());
    for cells in rows {
        let mut row = Row::new();
        for (column, cell) in columns.iter().zip(cells) {
            row.insert(*column, cell);
        }
        result.push(row);
    }
    result
}

/// The catalog listing most tests script for `gds.list`.
pub fn standard_catalog() -> DataTable {
    let names = [
        "gds.version",
        "gds.list",
        "gds.debug.arrow",
        "gds.listProgress",
        "gds.graph.project",
        "gds.graph.list",
        "gds.graph.exists",
        "gds.graph.drop",
        "gds.graph.nodeProperty.stream",
        "gds.pageRank.stream",
        "gds.pageRank.stats",
        "gds.pageRank.mutate",
        "gds.pageRank.write",
        "gds.wcc.stream",
        "gds.wcc.stats",
        "gds.model.list",
        "gds.model.exists",
        "gds.model.drop",
        "gds.model.publish",
    ];
    table(
        &["name"],
        names.iter().map(|n| vec![gds_rs::Value::from(*n)]).collect(),
    )
}

// ============================================================================
// Scripted flight transport
// ============================================================================

/// Invocation counters, shared so assertions survive the transport being
/// boxed away into a client.
#[derive(Default)]
pub struct TransportCounters {
    pub handshakes: AtomicU32,
    pub actions: AtomicU32,
    pub gets: AtomicU32,
}

/// A `FlightTransport` that fails with a configured error kind a fixed
/// number of times before succeeding, counting every invocation.
pub struct FlakyTransport {
    failures_remaining: AtomicU32,
    kind: TransportErrorKind,
    counters: Arc<TransportCounters>,
    action_response: Vec<u8>,
    get_response: DataTable,
}

impl FlakyTransport {
    pub fn new(failures: u32, kind: TransportErrorKind) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            kind,
            counters: Arc::new(TransportCounters::default()),
            action_response: b"{}".to_vec(),
            get_response: DataTable::default(),
        }
    }

    /// A transport that never fails.
    pub fn reliable() -> Self {
        Self::new(0, TransportErrorKind::Other)
    }

    pub fn counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.counters)
    }

    pub fn with_action_response(mut self, body: &str) -> Self {
        self.action_response = body.as_bytes().to_vec();
        self
    }

    pub fn with_get_response(mut self, response: DataTable) -> Self {
        self.get_response = response;
        self
    }

    fn next_outcome(&self) -> Result<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::transport(self.kind, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl FlightTransport for FlakyTransport {
    async fn handshake(&self, _auth: &ArrowAuthentication) -> Result<Option<String>> {
        self.counters.handshakes.fetch_add(1, Ordering::SeqCst);
        self.next_outcome()?;
        Ok(Some("token".to_string()))
    }

    async fn do_action(&self, _action_type: &str, _body: Vec<u8>) -> Result<Vec<u8>> {
        self.counters.actions.fetch_add(1, Ordering::SeqCst);
        self.next_outcome()?;
        Ok(self.action_response.clone())
    }

    async fn do_get(&self, _ticket: Vec<u8>) -> Result<DataTable> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.next_outcome()?;
        Ok(self.get_response.clone())
    }
}

// ============================================================================
// Deterministic clock
// ============================================================================

/// A clock whose time only advances when the retry loop sleeps.
pub struct ManualClock {
    base: Instant,
    advanced: Mutex<Duration>,
    pub slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            advanced: Mutex::new(Duration::ZERO),
            slept: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.advanced.lock()
    }

    async fn sleep(&self, duration: Duration) {
        *self.advanced.lock() += duration;
        self.slept.lock().push(duration);
    }
}
