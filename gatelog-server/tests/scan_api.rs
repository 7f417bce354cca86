use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

mod support;
use support::{build_test_app, t0};

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
}

#[tokio::test]
async fn tap_opens_ignores_then_closes() -> Result<()> {
    let app = build_test_app()?;
    let scan = json!({ "userIdNumber": "A1001", "rfidScannerId": "SCANNER-1" });

    let opened = app.server.post("/api/logs/scan").json(&scan).await;
    opened.assert_status(StatusCode::CREATED);
    let body: Value = opened.json();
    assert_eq!(body["userFound"], true);
    assert_eq!(body["action"], "timeIn");
    assert_eq!(body["user"]["name"], "Alice Johnson");
    assert_eq!(body["user"]["idNumber"], "A1001");
    assert_eq!(body["message"], "Time in recorded for Alice Johnson.");
    assert_eq!(timestamp(&body["log"]["timeIn"]), Some(t0()));
    assert!(body["log"]["timeOut"].is_null());
    let log_id = body["log"]["_id"].as_str().context("log id")?.to_string();

    app.clock.advance(Duration::seconds(1));
    let ignored = app.server.post("/api/logs/scan").json(&scan).await;
    ignored.assert_status_ok();
    let body: Value = ignored.json();
    assert_eq!(body["action"], "ignored");
    assert!(body["log"].is_null());
    assert_eq!(body["message"], "Ignored duplicate tap (cooldown)");

    app.clock.advance(Duration::seconds(4));
    let closed = app.server.post("/api/logs/scan").json(&scan).await;
    closed.assert_status_ok();
    let body: Value = closed.json();
    assert_eq!(body["action"], "timeOut");
    assert_eq!(body["log"]["_id"], log_id.as_str());
    assert_eq!(timestamp(&body["log"]["timeIn"]), Some(t0()));
    assert_eq!(
        timestamp(&body["log"]["timeOut"]),
        Some(t0() + Duration::seconds(5))
    );
    assert_eq!(body["message"], "Time out recorded for Alice Johnson.");

    let stored = app.server.get(&format!("/api/logs/{log_id}")).await;
    stored.assert_status_ok();
    let body: Value = stored.json();
    assert_eq!(
        timestamp(&body["timeOut"]),
        Some(t0() + Duration::seconds(5))
    );
    Ok(())
}

#[tokio::test]
async fn unknown_badge_creates_nothing() -> Result<()> {
    let app = build_test_app()?;
    let before: Vec<Value> = app.server.get("/api/logs").await.json();

    let response = app
        .server
        .post("/api/logs/scan")
        .json(&json!({ "userIdNumber": "Z9999", "rfidScannerId": "SCANNER-1" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["userFound"], false);
    assert!(body["user"].is_null());
    assert_eq!(body["message"], "No user found.");

    let after: Vec<Value> = app.server.get("/api/logs").await.json();
    assert_eq!(before.len(), after.len());
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_rejected() -> Result<()> {
    let app = build_test_app()?;

    for body in [
        json!({ "userIdNumber": "A1001" }),
        json!({ "rfidScannerId": "SCANNER-1" }),
        json!({ "userIdNumber": "", "rfidScannerId": "SCANNER-1" }),
    ] {
        let response = app.server.post("/api/logs/scan").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["error"],
            "userIdNumber and rfidScannerId are required."
        );
    }
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() -> Result<()> {
    let app = build_test_app()?;

    let response = app
        .server
        .post("/api/logs/scan")
        .text("not json")
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn open_fixture_session_is_closed_by_next_tap() -> Result<()> {
    let app = build_test_app()?;

    let response = app
        .server
        .post("/api/logs/scan")
        .json(&json!({ "userIdNumber": "g3003", "rfidScannerId": "SCANNER-2" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["action"], "timeOut");
    assert_eq!(body["log"]["_id"], "l3");
    Ok(())
}
