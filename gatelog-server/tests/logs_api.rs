use anyhow::Result;
use axum::http::StatusCode;
use chrono::Duration;
use serde_json::Value;

mod support;
use support::{build_test_app, t0};

fn ids(logs: &[Value]) -> Vec<&str> {
    logs.iter().filter_map(|log| log["_id"].as_str()).collect()
}

#[tokio::test]
async fn logs_list_newest_first() -> Result<()> {
    let app = build_test_app()?;

    let response = app.server.get("/api/logs").await;
    response.assert_status_ok();
    let logs: Vec<Value> = response.json();

    assert_eq!(ids(&logs), vec!["l3", "l1", "l2"]);
    assert_eq!(logs[0]["userName"], "Guard Maria");
    assert_eq!(logs[0]["rfidScannerId"], "SCANNER-2");
    assert!(logs[0]["timeOut"].is_null());
    Ok(())
}

#[tokio::test]
async fn badge_filter_ignores_case() -> Result<()> {
    let app = build_test_app()?;

    let logs: Vec<Value> = app
        .server
        .get("/api/logs")
        .add_query_param("userIdNumber", "a1001")
        .await
        .json();

    assert_eq!(ids(&logs), vec!["l1"]);
    Ok(())
}

#[tokio::test]
async fn scanner_and_time_bounds_filter() -> Result<()> {
    let app = build_test_app()?;
    let from = (t0() - Duration::hours(6)).to_rfc3339();

    let logs: Vec<Value> = app
        .server
        .get("/api/logs")
        .add_query_param("rfidScannerId", "SCANNER-1")
        .add_query_param("from", &from)
        .await
        .json();
    assert_eq!(ids(&logs), vec!["l1"]);

    let to = (t0() - Duration::hours(24)).to_rfc3339();
    let logs: Vec<Value> = app
        .server
        .get("/api/logs")
        .add_query_param("to", &to)
        .await
        .json();
    assert_eq!(ids(&logs), vec!["l2"]);
    Ok(())
}

#[tokio::test]
async fn invalid_bound_is_rejected() -> Result<()> {
    let app = build_test_app()?;

    let response = app
        .server
        .get("/api/logs")
        .add_query_param("from", "last tuesday")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn single_log_lookup() -> Result<()> {
    let app = build_test_app()?;

    let found = app.server.get("/api/logs/l2").await;
    found.assert_status_ok();
    let body: Value = found.json();
    assert_eq!(body["userIdNumber"], "B2002");

    let missing = app.server.get("/api/logs/nope").await;
    missing.assert_status(StatusCode::NOT_FOUND);
    let body: Value = missing.json();
    assert_eq!(body["error"], "Log not found.");
    Ok(())
}
