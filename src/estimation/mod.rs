use crate::domain::{
    BestTime, Checkin, DEFAULT_SERVICE_TIME_MINUTES, Location, LocationId, NewCheckin,
    PredictionResult, SlotKey,
};
use crate::error::EngineError;
use crate::storage::QueueStore;
use std::sync::Arc;
use time::{Duration, OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

pub mod admission;
pub mod blend;
pub mod historical;
pub mod live;

use admission::Admission;
use historical::{HistoricalSignal, SlotObservation};

pub const DEFAULT_LIVE_WINDOW: Duration = Duration::minutes(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub live_window: Duration,
    pub checkin_cooldown: Duration,
    pub default_service_time: u32,
    /// Wall-clock offset used to pick a check-in's day/hour bucket.
    pub utc_offset: UtcOffset,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            live_window: DEFAULT_LIVE_WINDOW,
            checkin_cooldown: admission::DEFAULT_COOLDOWN,
            default_service_time: DEFAULT_SERVICE_TIME_MINUTES,
            utc_offset: UtcOffset::UTC,
        }
    }
}

/// Prediction engine over an injected storage collaborator.
///
/// The engine holds no mutable state of its own; the only writes it issues
/// are check-ins, bucket folds and prediction audit records.
#[derive(Debug, Clone)]
pub struct QueueEngine {
    store: Arc<dyn QueueStore>,
    settings: EngineSettings,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn QueueStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &dyn QueueStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Computes, records and returns the current prediction for a location.
    ///
    /// An unknown location yields [`PredictionResult::UNKNOWN_LOCATION`] and
    /// no audit record.
    pub async fn calculate_prediction(
        &self,
        location_id: LocationId,
    ) -> Result<PredictionResult, EngineError> {
        self.calculate_prediction_at(location_id, OffsetDateTime::now_utc())
            .await
    }

    pub async fn calculate_prediction_at(
        &self,
        location_id: LocationId,
        now: OffsetDateTime,
    ) -> Result<PredictionResult, EngineError> {
        match self.store.get_location(location_id).await? {
            Some(location) => self.predict_for_at(&location, now).await,
            None => {
                debug!(%location_id, "Prediction requested for unknown location");
                Ok(PredictionResult::UNKNOWN_LOCATION)
            }
        }
    }

    /// Same as [`Self::calculate_prediction_at`] for a location already loaded.
    pub async fn predict_for_at(
        &self,
        location: &Location,
        now: OffsetDateTime,
    ) -> Result<PredictionResult, EngineError> {
        let recent = self
            .store
            .get_recent_checkins(location.id, self.settings.live_window, now)
            .await?;
        let slot = self.store.get_time_slot(self.slot_key(location.id, now)).await?;

        let live = live::aggregate(&recent, now);
        let historical = HistoricalSignal::from_slot(slot.as_ref());
        let result = blend::blend(&live, &historical, self.service_time(location));

        self.store
            .create_prediction(location.id, &result, now)
            .await?;

        info!(
            location_id = %location.id,
            recent_checkins = recent.len(),
            live_weight = live.weight,
            historical_weight = historical.weight,
            estimated_wait_time = result.estimated_wait_time,
            confidence = result.confidence,
            trend = ?result.trend,
            "Prediction computed"
        );
        Ok(result)
    }

    /// Admits, stores and folds a check-in into its historical bucket.
    ///
    /// A storage failure during the fold leaves the check-in already stored.
    pub async fn record_checkin(&self, checkin: NewCheckin) -> Result<Checkin, EngineError> {
        self.record_checkin_at(checkin, OffsetDateTime::now_utc())
            .await
    }

    pub async fn record_checkin_at(
        &self,
        checkin: NewCheckin,
        now: OffsetDateTime,
    ) -> Result<Checkin, EngineError> {
        let location_id = checkin.location_id;
        let location = self
            .store
            .get_location(location_id)
            .await?
            .ok_or(EngineError::NotFound(location_id))?;

        let cooldown = self.settings.checkin_cooldown;
        let history = self
            .store
            .device_checkins_since(&checkin.device_id, location_id, now - cooldown)
            .await?;
        if let Admission::RateLimited { retry_after } =
            admission::admit(&history, &checkin.device_id, location_id, now, cooldown)
        {
            warn!(
                %location_id,
                device_id = %checkin.device_id,
                retry_after_secs = retry_after.whole_seconds(),
                "Check-in rejected by cooldown"
            );
            return Err(EngineError::RateLimited { retry_after });
        }

        let stored = self.store.create_checkin(checkin, now).await?;
        let observation =
            SlotObservation::from_checkin(stored.people_ahead, self.service_time(&location));
        let slot = self
            .store
            .fold_time_slot(self.slot_key(location_id, now), observation, now)
            .await?;

        info!(
            %location_id,
            people_ahead = stored.people_ahead,
            day_of_week = slot.day_of_week,
            hour = slot.hour,
            sample_count = slot.sample_count,
            "Check-in recorded"
        );
        Ok(stored)
    }

    /// Up to five historically quietest (weekday, hour) slots.
    pub async fn best_times_to_visit(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<BestTime>, EngineError> {
        let slots = self.store.get_time_slots(location_id).await?;
        Ok(historical::best_times(&slots))
    }

    fn service_time(&self, location: &Location) -> f64 {
        let minutes = if location.average_service_time > 0 {
            location.average_service_time
        } else {
            self.settings.default_service_time
        };
        f64::from(minutes)
    }

    fn slot_key(&self, location_id: LocationId, now: OffsetDateTime) -> SlotKey {
        SlotKey::at(location_id, now, self.settings.utc_offset)
    }
}
