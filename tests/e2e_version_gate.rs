//! End-to-end tests for version gating of endpoint wrappers.

mod common;

use common::{table, MockDriver};
use gds_rs::{Error, GdsClient, ServerVersion, Value};

async fn connected_client(driver: MockDriver) -> GdsClient {
    GdsClient::builder()
        .arrow(gds_rs::ArrowPreference::Disabled)
        .connect(Box::new(driver))
        .await
        .unwrap()
}

fn exists_row() -> gds_rs::DataTable {
    table(&["exists"], vec![vec![Value::Bool(true)]])
}

// ============================================================================
// 1. A gated wrapper raises below its minimum, with zero transport calls
// ============================================================================

#[tokio::test]
async fn publish_below_minimum_raises_before_any_network_call() {
    let driver = MockDriver::new("2.4.9");
    let state = driver.state();
    state.set_result("CALL gds.model.exists", exists_row());
    let client = connected_client(driver).await;

    let model = client.models().get("my-model").await.unwrap();
    let err = model.publish().await.unwrap_err();

    match &err {
        Error::VersionMismatch { operation, constraint, actual } => {
            assert_eq!(operation, "model.publish");
            assert_eq!(constraint, ">= 2.5.0");
            assert_eq!(*actual, ServerVersion::new(2, 4, 9));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The gate fired before dispatch: the publish procedure never hit the
    // wire.
    assert_eq!(state.call_count("gds.model.publish"), 0);
}

// ============================================================================
// 2. The same wrapper dispatches once the server is new enough
// ============================================================================

#[tokio::test]
async fn publish_at_minimum_dispatches() {
    let driver = MockDriver::new("2.5.0");
    let state = driver.state();
    state.set_result("CALL gds.model.exists", exists_row());
    state.set_result(
        "CALL gds.model.publish",
        table(
            &["modelName", "modelType", "loaded", "stored", "published"],
            vec![vec![
                Value::from("my-model"),
                Value::from("graphSage"),
                Value::Bool(true),
                Value::Bool(false),
                Value::Bool(true),
            ]],
        ),
    );
    let client = connected_client(driver).await;

    let model = client.models().get("my-model").await.unwrap();
    let details = model.publish().await.unwrap();

    assert!(details.published);
    assert_eq!(details.model_type, "graphSage");
    assert_eq!(state.call_count("gds.model.publish"), 1);
}

// ============================================================================
// 3. The probed version is cached for the life of the client
// ============================================================================

#[tokio::test]
async fn server_version_is_probed_once() {
    let driver = MockDriver::new("2.6.1");
    let state = driver.state();
    let client = connected_client(driver).await;

    assert_eq!(client.server_version(), ServerVersion::new(2, 6, 1));
    let _ = client.server_version();
    let _ = client.server_version();

    assert_eq!(state.call_count("gds.version"), 1);
}

// ============================================================================
// 4. An unparseable probe fails construction as a connection failure
// ============================================================================

#[tokio::test]
async fn missing_version_row_fails_construction() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result("CALL gds.version", table(&["version"], vec![]));

    let result = GdsClient::builder().connect(Box::new(driver)).await;
    assert!(matches!(result, Err(Error::RowCount { .. })));
    let _ = state;
}
