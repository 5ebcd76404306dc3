//! Records shared by the engine, the storage layer and the HTTP surface.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

pub type LocationId = Uuid;
pub type LocationTypeId = Uuid;

/// Minutes per person ahead when a location does not configure its own value.
pub const DEFAULT_SERVICE_TIME_MINUTES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocationType {
    pub id: LocationTypeId,
    pub name: String,
    pub icon: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocationType {
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub address: String,
    pub type_id: LocationTypeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Minutes per person ahead. Zero means "use the engine default".
    pub average_service_time: u32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub name: String,
    pub address: String,
    pub type_id: LocationTypeId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub average_service_time: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStage {
    #[default]
    Waiting,
    InService,
    Completing,
}

/// An anonymous queue-position report. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Checkin {
    pub id: Uuid,
    pub location_id: LocationId,
    pub device_id: String,
    pub people_ahead: u32,
    pub queue_stage: QueueStage,
    /// Trust weight of the report, 1.0 for every check-in created today.
    pub confidence: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckin {
    pub location_id: LocationId,
    pub device_id: String,
    pub people_ahead: u32,
    pub queue_stage: QueueStage,
}

/// Identifies one historical bucket: a location at a weekday and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub location_id: LocationId,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    /// 0..=23, wall-clock hour in the configured offset.
    pub hour: u8,
}

impl SlotKey {
    /// Bucket that `timestamp` falls into once shifted to the wall-clock `offset`.
    pub fn at(location_id: LocationId, timestamp: OffsetDateTime, offset: UtcOffset) -> Self {
        let local = timestamp.to_offset(offset);
        Self {
            location_id,
            day_of_week: local.weekday().number_days_from_sunday(),
            hour: local.hour(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeSlot {
    pub id: Uuid,
    pub location_id: LocationId,
    pub day_of_week: u8,
    pub hour: u8,
    pub average_wait_time: f64,
    pub average_people_count: f64,
    pub sample_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TimeSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            location_id: self.location_id,
            day_of_week: self.day_of_week,
            hour: self.hour,
        }
    }
}

/// New running-mean values for a bucket, written by `upsert_time_slot`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotUpdate {
    pub average_wait_time: f64,
    pub average_people_count: f64,
    pub sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionResult {
    pub estimated_wait_time: u32,
    pub confidence: f64,
    pub trend: Trend,
    pub current_queue_size: u32,
}

impl PredictionResult {
    /// Returned when neither live nor historical data carries any weight.
    pub const NO_SIGNAL: Self = Self {
        estimated_wait_time: 0,
        confidence: 0.1,
        trend: Trend::Stable,
        current_queue_size: 0,
    };

    /// Returned for a location the store does not know.
    pub const UNKNOWN_LOCATION: Self = Self {
        estimated_wait_time: 0,
        confidence: 0.0,
        trend: Trend::Stable,
        current_queue_size: 0,
    };
}

/// Point-in-time audit record of a computed prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Prediction {
    pub id: Uuid,
    pub location_id: LocationId,
    pub estimated_wait_time: u32,
    pub confidence: f64,
    pub trend: Trend,
    pub current_queue_size: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BestTime {
    pub hour: u8,
    pub day_of_week: u8,
    pub estimated_wait: u32,
}
