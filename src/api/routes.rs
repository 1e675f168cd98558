use crate::attendance::{AttendanceRecord, Reconciler, Reconciliation};
use crate::config::Config;
use crate::db::{Database, PresenceRow};
use crate::error::{ReconcileError, StoreError};
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub reconciler: Reconciler,
    /// Held for the whole lookup-then-write so two requests for one device
    /// cannot interleave.
    pub write_lock: Arc<Mutex<()>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/devices", get(devices))
        .route(
            "/api/v1/attendance",
            get(attendance_for_date).post(record_attendance),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendancePayload {
    mac_address: String,
    enrollment_number: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    devices: usize,
    present_today: usize,
    last_seen_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct DevicesPayload {
    count: usize,
    devices: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize)]
struct AttendancePayloadView {
    date: NaiveDate,
    count: usize,
    present: Vec<PresenceRow>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.store_endpoint)?;
    let today = Local::now().date_naive();

    Ok(Json(StatusPayload {
        devices: database.count_records()?,
        present_today: database.count_present_on(today)?,
        last_seen_date: database.latest_seen_date()?,
    }))
}

async fn devices(State(state): State<ApiState>) -> ApiResult<Json<DevicesPayload>> {
    let database = Database::open(&state.config.store_endpoint)?;
    let devices = database.list_records()?;

    Ok(Json(DevicesPayload {
        count: devices.len(),
        devices,
    }))
}

async fn attendance_for_date(
    State(state): State<ApiState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<AttendancePayloadView>> {
    let date = parse_optional_date(query.date.as_deref())
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    let database = Database::open(&state.config.store_endpoint)?;
    let present = database.presence_for_date(date)?;

    Ok(Json(AttendancePayloadView {
        date,
        count: present.len(),
        present,
    }))
}

async fn record_attendance(
    State(state): State<ApiState>,
    Json(payload): Json<AttendancePayload>,
) -> ApiResult<Json<Reconciliation>> {
    let date = parse_optional_date(payload.date.as_deref())
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    let identifier = payload
        .enrollment_number
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let _guard = state.write_lock.lock().await;
    let endpoint = state.config.store_endpoint.clone();
    let reconciler = state.reconciler;
    let mac_address = payload.mac_address;

    let reconciled =
        tokio::task::spawn_blocking(move || -> Result<Reconciliation, ReconcileError> {
            let mut store = Database::open(&endpoint)?;
            match identifier.as_deref() {
                Some(identifier) => {
                    reconciler.reconcile(&mut store, identifier, &mac_address, date)
                }
                None => reconciler.mark_seen(&mut store, &mac_address, date),
            }
        })
        .await
        .context("Attendance worker failed")??;

    Ok(Json(reconciled))
}

fn parse_optional_date(input: Option<&str>) -> Result<NaiveDate> {
    input.map_or_else(
        || Ok(Local::now().date_naive()),
        |date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-10-18"))
        },
    )
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Internal(value.into())
    }
}

impl From<ReconcileError> for ApiError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::InvalidMac(error) => Self::BadRequest(error.to_string()),
            ReconcileError::Store(error) => Self::Internal(error.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                warn!(error = %error, "attendance request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::attendance::{AttendanceStore, Reconciler};
    use crate::config::Config;
    use crate::db::Database;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn state_for(endpoint: &Path) -> ApiState {
        let config = Config {
            store_endpoint: endpoint.to_path_buf(),
            ..Config::default()
        };

        ApiState {
            reconciler: Reconciler::from_config(&config),
            config: Arc::new(config),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn post_json(state: ApiState, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/attendance")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");

        let response = router(state).oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, payload)
    }

    #[tokio::test]
    async fn hotspot_post_with_identifier_creates_then_updates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        let body = r#"{"macAddress":"aa:11:22:33:44:55","enrollmentNumber":"E100","date":"2026-10-01"}"#;

        let (status, first) = post_json(state_for(&endpoint), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["outcome"], "created");
        assert_eq!(first["mac_address"], "AA:11:22:33:44:55");

        let (_, second) = post_json(state_for(&endpoint), body).await;
        assert_eq!(second["outcome"], "updated");

        let store = Database::open(&endpoint).expect("store");
        assert_eq!(store.find_by_mac("AA:11:22:33:44:55").expect("lookup").len(), 1);
    }

    #[tokio::test]
    async fn mac_only_post_does_not_register_strangers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");

        let (status, payload) =
            post_json(state_for(&endpoint), r#"{"macAddress":"AA:11:22:33:44:55"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["outcome"], "not_registered");
    }

    #[tokio::test]
    async fn malformed_mac_is_bad_request() {
        let dir = tempfile::tempdir().expect("temp dir");

        let (status, payload) = post_json(
            state_for(&dir.path().join("attendance.db")),
            r#"{"macAddress":"nope","enrollmentNumber":"E100"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap_or_default().contains("nope"));
    }

    #[tokio::test]
    async fn attendance_listing_reports_present_devices() {
        let dir = tempfile::tempdir().expect("temp dir");
        let endpoint = dir.path().join("attendance.db");
        post_json(
            state_for(&endpoint),
            r#"{"macAddress":"AA:11:22:33:44:55","enrollmentNumber":"E100","date":"2026-10-01"}"#,
        )
        .await;

        let request = Request::builder()
            .uri("/api/v1/attendance?date=2026-10-01")
            .body(Body::empty())
            .expect("request");
        let response = router(state_for(&endpoint))
            .oneshot(request)
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["present"][0]["enrollment_number"], "E100");
    }
}
