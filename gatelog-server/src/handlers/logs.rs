use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use gatelog_core::{RecordStore, ScanOutcome};
use gatelog_model::{AttendanceLog, LogFilter};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub user_id_number: Option<String>,
    #[serde(default)]
    pub rfid_scanner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub user_id_number: Option<String>,
    pub rfid_scanner_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Record a badge tap.
///
/// # Request
///
/// ```json
/// { "userIdNumber": "A1001", "rfidScannerId": "SCANNER-1" }
/// ```
///
/// # Response
///
/// - `201 Created` when a new session was opened (`action: "timeIn"`)
/// - `200 OK` when a session was closed (`action: "timeOut"`), the tap was
///   ignored by the cooldown (`action: "ignored"`), or the badge is unknown
///   (`userFound: false`)
/// - `400 Bad Request` if either identifier is missing
pub async fn scan_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let badge = request.user_id_number.unwrap_or_default();
    let scanner = request.rfid_scanner_id.unwrap_or_default();
    if badge.trim().is_empty() || scanner.trim().is_empty() {
        return Err(AppError::bad_request(
            "userIdNumber and rfidScannerId are required.",
        ));
    }

    let outcome = state
        .resolver
        .resolve_scan(&badge, &scanner, state.clock.now())
        .await?;

    Ok(scan_response(outcome))
}

fn scan_response(outcome: ScanOutcome) -> (StatusCode, Json<Value>) {
    match outcome {
        ScanOutcome::UnknownUser => (
            StatusCode::OK,
            Json(json!({
                "userFound": false,
                "user": null,
                "message": "No user found.",
            })),
        ),
        ScanOutcome::DuplicateIgnored { user } => (
            StatusCode::OK,
            Json(json!({
                "userFound": true,
                "user": user,
                "action": "ignored",
                "log": null,
                "message": "Ignored duplicate tap (cooldown)",
            })),
        ),
        ScanOutcome::SessionClosed { user, log } => {
            let message = format!("Time out recorded for {}.", user.name);
            (
                StatusCode::OK,
                Json(json!({
                    "userFound": true,
                    "user": user,
                    "action": "timeOut",
                    "log": log,
                    "message": message,
                })),
            )
        }
        ScanOutcome::SessionOpened { user, log } => {
            let message = format!("Time in recorded for {}.", user.name);
            (
                StatusCode::CREATED,
                Json(json!({
                    "userFound": true,
                    "user": user,
                    "action": "timeIn",
                    "log": log,
                    "message": message,
                })),
            )
        }
    }
}

/// List logs newest first, capped at 500.
///
/// Optional query parameters: `userIdNumber`, `rfidScannerId`, `from`, `to`.
/// Bounds accept RFC 3339 timestamps or `YYYY-MM-DD` (local midnight).
pub async fn list_logs_handler(
    State(state): State<AppState>,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> AppResult<Json<Vec<AttendanceLog>>> {
    let Query(query) = query?;
    let filter = build_filter(query)?;
    let logs = state.store.list_logs(&filter).await?;
    Ok(Json(logs))
}

pub async fn get_log_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AttendanceLog>> {
    state
        .store
        .get_log_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Log not found."))
}

fn build_filter(query: LogQuery) -> AppResult<LogFilter> {
    let present = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut filter = LogFilter::default();
    if let Some(badge) = present(query.user_id_number) {
        filter = filter.badge(badge);
    }
    if let Some(scanner) = present(query.rfid_scanner_id) {
        filter = filter.scanner(scanner);
    }
    let from = present(query.from)
        .map(|raw| parse_bound("from", &raw))
        .transpose()?;
    let to = present(query.to)
        .map(|raw| parse_bound("to", &raw))
        .transpose()?;
    Ok(filter.between(from, to))
}

fn parse_bound(name: &str, raw: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| {
            AppError::bad_request(format!(
                "Invalid '{name}' value; expected RFC 3339 or YYYY-MM-DD."
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_accept_timestamps_and_dates() {
        let at = parse_bound("from", "2026-03-02T08:00:00Z").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());

        let day = parse_bound("to", "2026-03-02").unwrap();
        assert_eq!(
            day.with_timezone(&Local).date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );

        assert!(parse_bound("from", "yesterday").is_err());
    }

    #[test]
    fn blank_query_values_are_ignored() {
        let filter = build_filter(LogQuery {
            user_id_number: Some(" ".into()),
            rfid_scanner_id: Some("SCANNER-1".into()),
            ..LogQuery::default()
        })
        .unwrap();

        assert_eq!(filter, LogFilter::default().scanner("SCANNER-1"));
    }
}
