//! End-to-end tests for the graph catalog round-trip and handle lifecycle.

mod common;

use common::{table, MockDriver};
use gds_rs::{CallParameters, Error, GdsClient, Value};
use pretty_assertions::assert_eq;

async fn connected_client(driver: MockDriver) -> GdsClient {
    GdsClient::builder()
        .arrow(gds_rs::ArrowPreference::Disabled)
        .connect(Box::new(driver))
        .await
        .unwrap()
}

fn project_result(name: &str) -> gds_rs::DataTable {
    table(
        &["graphName", "nodeCount", "relationshipCount", "projectMillis"],
        vec![vec![
            Value::from(name),
            Value::Int(42),
            Value::Int(1337),
            Value::Int(11),
        ]],
    )
}

// ============================================================================
// 1. Project, list, drop round-trip
// ============================================================================

#[tokio::test]
async fn project_list_drop_round_trip() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result("CALL gds.graph.project", project_result("g"));
    let client = connected_client(driver).await;

    // Project a graph named "g".
    let (graph, result) = client
        .graph()
        .project("g", "*", "*", CallParameters::new())
        .await
        .unwrap();
    assert_eq!(graph.name(), "g");
    assert_eq!(result.node_count, 42);
    assert_eq!(result.relationship_count, 1337);

    // The listing contains exactly that name.
    state.set_result(
        "CALL gds.graph.list",
        table(&["graphName"], vec![vec![Value::from("g")]]),
    );
    let names = client.graph().list_names().await.unwrap();
    assert_eq!(names, vec!["g"]);

    // Drop it; the listing is empty afterwards.
    state.set_result(
        "CALL gds.graph.drop",
        table(&["graphName"], vec![vec![Value::from("g")]]),
    );
    graph.drop().await.unwrap();

    state.set_result("CALL gds.graph.list", table(&["graphName"], vec![]));
    let names = client.graph().list_names().await.unwrap();
    assert!(names.is_empty());
}

// ============================================================================
// 2. A dead handle raises once the server stops listing it
// ============================================================================

#[tokio::test]
async fn dropped_graph_handle_raises_on_use() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result("CALL gds.graph.project", project_result("g"));
    state.set_result("CALL gds.graph.list", table(&["graphName", "nodeCount"], vec![]));
    let client = connected_client(driver).await;

    let (graph, _) = client
        .graph()
        .project("g", "*", "*", CallParameters::new())
        .await
        .unwrap();

    let err = graph.node_count().await.unwrap_err();
    assert!(matches!(&err, Error::GraphNotFound(name) if name == "g"));
    assert_eq!(
        err.to_string(),
        "There is no projected graph named 'g'"
    );
}

// ============================================================================
// 3. Exists and parameter shapes
// ============================================================================

#[tokio::test]
async fn exists_decodes_single_row_and_sends_name() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result(
        "CALL gds.graph.exists",
        table(&["graphName", "exists"], vec![vec![Value::from("g"), Value::Bool(true)]]),
    );
    let client = connected_client(driver).await;

    assert!(client.graph().exists("g").await.unwrap());

    let call = state
        .calls()
        .into_iter()
        .find(|c| c.query.contains("gds.graph.exists"))
        .unwrap();
    assert_eq!(call.params.get("graph_name"), Some(&Value::from("g")));
}

// ============================================================================
// 4. Metadata is fetched lazily, per call
// ============================================================================

#[tokio::test]
async fn graph_metadata_is_fetched_lazily() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result("CALL gds.graph.project", project_result("g"));
    state.set_result(
        "CALL gds.graph.list",
        table(
            &["graphName", "nodeCount", "relationshipCount", "database"],
            vec![vec![
                Value::from("g"),
                Value::Int(42),
                Value::Int(1337),
                Value::from("neo4j"),
            ]],
        ),
    );
    let client = connected_client(driver).await;

    let (graph, _) = client
        .graph()
        .project("g", "*", "*", CallParameters::new())
        .await
        .unwrap();

    // No listing has gone out yet.
    assert_eq!(state.call_count("gds.graph.list"), 0);

    assert_eq!(graph.node_count().await.unwrap(), 42);
    assert_eq!(graph.relationship_count().await.unwrap(), 1337);
    assert_eq!(graph.database().await.unwrap(), "neo4j");

    // One fetch per metadata call: nothing is cached client-side.
    assert_eq!(state.call_count("gds.graph.list"), 3);
}

// ============================================================================
// 5. Config maps are translated on their way out
// ============================================================================

#[tokio::test]
async fn project_translates_config_keys() {
    let driver = MockDriver::new("2.4.0");
    let state = driver.state();
    state.set_result("CALL gds.graph.project", project_result("g"));
    let client = connected_client(driver).await;

    let config = CallParameters::new()
        .with("read_concurrency", 4)
        .with("validate_relationships", Value::Null);
    client
        .graph()
        .project("g", "*", "*", config)
        .await
        .unwrap();

    let call = state
        .calls()
        .into_iter()
        .find(|c| c.query.contains("gds.graph.project"))
        .unwrap();
    let Some(Value::Map(config)) = call.params.get("config") else {
        panic!("config parameter missing");
    };
    assert_eq!(config.get("readConcurrency"), Some(&Value::Int(4)));
    // Null-valued options never reach the wire.
    assert!(!config.contains_key("validateRelationships"));
    assert!(!config.contains_key("validate_relationships"));
}
