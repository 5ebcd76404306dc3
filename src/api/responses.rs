use crate::domain::{Location, PredictionResult, QueueStage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ApiErrorCode,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    InvalidRequest,
    RateLimited,
    StorageUnavailable,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueStatusResponse {
    pub location: Location,
    #[serde(flatten)]
    pub prediction: PredictionResult,
    pub last_updated: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckinRequest {
    pub location_id: Uuid,
    pub device_id: String,
    pub people_ahead: u32,
    #[serde(default)]
    pub queue_stage: Option<QueueStage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct LocationsQuery {
    pub type_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trend;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn error_response_omits_retry_after_when_none() {
        let response = ErrorResponse {
            error_code: ApiErrorCode::NotFound,
            error_message: "Location not found".to_string(),
            retry_after_seconds: None,
            timestamp: "2026-01-11T12:30:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(
            value,
            json!({
                "error_code": "NOT_FOUND",
                "error_message": "Location not found",
                "timestamp": "2026-01-11T12:30:00Z"
            })
        );
    }

    #[test]
    fn rate_limited_response_includes_retry_after() {
        let response = ErrorResponse {
            error_code: ApiErrorCode::RateLimited,
            error_message: "wait".to_string(),
            retry_after_seconds: Some(540),
            timestamp: "2026-01-11T12:31:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(value["error_code"], json!("RATE_LIMITED"));
        assert_eq!(value["retry_after_seconds"], json!(540));
    }

    #[test]
    fn queue_status_flattens_prediction_fields() {
        let response = QueueStatusResponse {
            location: Location {
                id: Uuid::nil(),
                name: "Community Clinic".to_string(),
                address: "555 Wellness Way".to_string(),
                type_id: Uuid::nil(),
                latitude: None,
                longitude: None,
                average_service_time: 10,
                is_active: true,
                created_at: datetime!(2026-01-11 08:00 UTC),
                updated_at: datetime!(2026-01-11 08:00 UTC),
            },
            prediction: PredictionResult {
                estimated_wait_time: 40,
                confidence: 0.8,
                trend: Trend::Increasing,
                current_queue_size: 4,
            },
            last_updated: "2026-01-11T12:32:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize queue status");
        assert_eq!(value["estimated_wait_time"], json!(40));
        assert_eq!(value["confidence"], json!(0.8));
        assert_eq!(value["trend"], json!("increasing"));
        assert_eq!(value["current_queue_size"], json!(4));
        assert_eq!(value["location"]["created_at"], json!("2026-01-11T08:00:00Z"));
        assert_eq!(value["last_updated"], json!("2026-01-11T12:32:00Z"));
    }

    #[test]
    fn checkin_request_defaults_queue_stage() {
        let request: CheckinRequest = serde_json::from_value(json!({
            "location_id": "00000000-0000-0000-0000-000000000000",
            "device_id": "device-a",
            "people_ahead": 4
        }))
        .expect("deserialize checkin request");

        assert_eq!(request.people_ahead, 4);
        assert_eq!(request.queue_stage, None);
    }

    #[test]
    fn checkin_request_rejects_negative_people_ahead() {
        let result = serde_json::from_value::<CheckinRequest>(json!({
            "location_id": "00000000-0000-0000-0000-000000000000",
            "device_id": "device-a",
            "people_ahead": -1
        }));

        assert!(result.is_err());
    }
}
