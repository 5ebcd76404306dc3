use crate::api::responses::{
    ApiErrorCode, CheckinRequest, ErrorResponse, HealthStatus, HealthSuccessResponse,
    LocationsQuery, QueueStatusResponse,
};
use crate::domain::{
    BestTime, Checkin, Location, LocationType, NewCheckin, Prediction, TimeSlot,
};
use crate::error::EngineError;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};
use uuid::Uuid;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const STORAGE_ERROR_MESSAGE: &str = "Storage temporarily unavailable";
const LOCATION_NOT_FOUND_MESSAGE: &str = "Location not found";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success { status: StatusCode, body: T },
    Error { status: StatusCode, body: ErrorResponse },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

fn ok<T>(body: T) -> ApiResponse<T> {
    ApiResponse::Success {
        status: StatusCode::OK,
        body,
    }
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    build_health_response(&state, OffsetDateTime::now_utc()).await
}

pub async fn get_location_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    build_location_types_response(&state, OffsetDateTime::now_utc()).await
}

pub async fn get_locations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationsQuery>,
) -> impl IntoResponse {
    build_locations_response(&state, query, OffsetDateTime::now_utc()).await
}

pub async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_location_response(&state, &id, OffsetDateTime::now_utc()).await
}

pub async fn get_queue_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_queue_status_response(&state, &id, OffsetDateTime::now_utc()).await
}

pub async fn get_best_times(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_best_times_response(&state, &id, OffsetDateTime::now_utc()).await
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_history_response(&state, &id, OffsetDateTime::now_utc()).await
}

pub async fn get_latest_prediction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_latest_prediction_response(&state, &id, OffsetDateTime::now_utc()).await
}

pub async fn post_checkin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckinRequest>, JsonRejection>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(request)| request).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed check-in payload");
        rejection.body_text()
    });
    build_checkin_response(&state, payload, OffsetDateTime::now_utc()).await
}

pub async fn get_device_checkins(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    build_device_checkins_response(&state, &device_id, OffsetDateTime::now_utc()).await
}

async fn build_health_response(
    state: &AppState,
    now: OffsetDateTime,
) -> ApiResponse<HealthSuccessResponse> {
    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return internal_error("timestamp formatting failure"),
    };

    match state.store().list_location_types().await {
        Ok(_) => ok(HealthSuccessResponse {
            status: HealthStatus::Ok,
            timestamp,
        }),
        Err(err) => {
            warn!(error = %err, "Health check could not reach storage");
            ApiResponse::Success {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: HealthSuccessResponse {
                    status: HealthStatus::Ko,
                    timestamp,
                },
            }
        }
    }
}

async fn build_location_types_response(
    state: &AppState,
    now: OffsetDateTime,
) -> ApiResponse<Vec<LocationType>> {
    match state.store().list_location_types().await {
        Ok(types) => ok(types),
        Err(err) => engine_error(err.into(), now),
    }
}

async fn build_locations_response(
    state: &AppState,
    query: LocationsQuery,
    now: OffsetDateTime,
) -> ApiResponse<Vec<Location>> {
    match state.store().list_locations(query.type_id).await {
        Ok(locations) => ok(locations),
        Err(err) => engine_error(err.into(), now),
    }
}

async fn build_location_response(
    state: &AppState,
    raw_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Location> {
    let Some(id) = parse_id(raw_id) else {
        return location_not_found(now);
    };
    match state.store().get_location(id).await {
        Ok(Some(location)) => ok(location),
        Ok(None) => location_not_found(now),
        Err(err) => engine_error(err.into(), now),
    }
}

async fn build_queue_status_response(
    state: &AppState,
    raw_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<QueueStatusResponse> {
    let Some(id) = parse_id(raw_id) else {
        return location_not_found(now);
    };
    let location = match state.store().get_location(id).await {
        Ok(Some(location)) => location,
        Ok(None) => return location_not_found(now),
        Err(err) => return engine_error(err.into(), now),
    };

    let prediction = match state.engine().predict_for_at(&location, now).await {
        Ok(prediction) => prediction,
        Err(err) => return engine_error(err, now),
    };

    match format_timestamp(now) {
        Ok(last_updated) => ok(QueueStatusResponse {
            location,
            prediction,
            last_updated,
        }),
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

async fn build_best_times_response(
    state: &AppState,
    raw_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Vec<BestTime>> {
    // Unknown locations simply have no history.
    let Some(id) = parse_id(raw_id) else {
        return ok(Vec::new());
    };
    match state.engine().best_times_to_visit(id).await {
        Ok(best) => ok(best),
        Err(err) => engine_error(err, now),
    }
}

async fn build_history_response(
    state: &AppState,
    raw_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Vec<TimeSlot>> {
    let Some(id) = parse_id(raw_id) else {
        return ok(Vec::new());
    };
    match state.store().get_time_slots(id).await {
        Ok(slots) => ok(slots),
        Err(err) => engine_error(err.into(), now),
    }
}

async fn build_latest_prediction_response(
    state: &AppState,
    raw_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Prediction> {
    let Some(id) = parse_id(raw_id) else {
        return location_not_found(now);
    };
    match state.store().latest_prediction(id).await {
        Ok(Some(prediction)) => ok(prediction),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            ApiErrorCode::NotFound,
            "No prediction recorded for this location",
            None,
            now,
        ),
        Err(err) => engine_error(err.into(), now),
    }
}

async fn build_checkin_response(
    state: &AppState,
    payload: Result<CheckinRequest, String>,
    now: OffsetDateTime,
) -> ApiResponse<Checkin> {
    let request = match payload {
        Ok(request) => request,
        Err(details) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ApiErrorCode::InvalidRequest,
                format!("Invalid checkin data: {details}"),
                None,
                now,
            );
        }
    };

    let device_id = request.device_id.trim();
    if device_id.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidRequest,
            "Invalid checkin data: device_id must not be empty",
            None,
            now,
        );
    }

    let checkin = NewCheckin {
        location_id: request.location_id,
        device_id: device_id.to_string(),
        people_ahead: request.people_ahead,
        queue_stage: request.queue_stage.unwrap_or_default(),
    };

    match state.engine().record_checkin_at(checkin, now).await {
        Ok(stored) => ApiResponse::Success {
            status: StatusCode::CREATED,
            body: stored,
        },
        Err(err) => engine_error(err, now),
    }
}

async fn build_device_checkins_response(
    state: &AppState,
    device_id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Vec<Checkin>> {
    match state.store().get_device_checkins(device_id).await {
        Ok(checkins) => ok(checkins),
        Err(err) => engine_error(err.into(), now),
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

fn location_not_found<T>(now: OffsetDateTime) -> ApiResponse<T> {
    error_response(
        StatusCode::NOT_FOUND,
        ApiErrorCode::NotFound,
        LOCATION_NOT_FOUND_MESSAGE,
        None,
        now,
    )
}

fn engine_error<T>(err: EngineError, now: OffsetDateTime) -> ApiResponse<T> {
    match err {
        EngineError::NotFound(_) => location_not_found(now),
        EngineError::RateLimited { retry_after } => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::RateLimited,
            format!(
                "Please wait {} minutes between check-ins at the same location",
                retry_after.whole_minutes().max(1)
            ),
            Some(retry_after.whole_seconds().max(1)),
            now,
        ),
        EngineError::StorageUnavailable(err) => {
            error!(error = %err, "Storage failure while handling request");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorCode::StorageUnavailable,
                STORAGE_ERROR_MESSAGE,
                None,
                now,
            )
        }
    }
}

fn error_response<T>(
    status: StatusCode,
    error_code: ApiErrorCode,
    message: impl Into<String>,
    retry_after_seconds: Option<i64>,
    now: OffsetDateTime,
) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: message.into(),
                retry_after_seconds,
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure"),
    }
}

fn internal_error<T>(message: &str) -> ApiResponse<T> {
    error!(message = message, "Internal error while handling request");
    let formatted = format_timestamp(OffsetDateTime::now_utc()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ApiErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            retry_after_seconds: None,
            timestamp: formatted,
        },
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, TimestampError> {
    timestamp.format(&Rfc3339).map_err(TimestampError::Format)
}
