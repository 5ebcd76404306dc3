//! In-memory store used by the server binary and by tests.
//!
//! Every write happens under a single `RwLock` write guard, which also makes
//! bucket folds atomic per key.

use crate::domain::{
    Checkin, DEFAULT_SERVICE_TIME_MINUTES, Location, LocationId, LocationType, LocationTypeId,
    NewCheckin, NewLocation, NewLocationType, Prediction, PredictionResult, SlotKey, SlotUpdate,
    TimeSlot,
};
use crate::estimation::historical::{self, SlotObservation};
use crate::storage::{DEVICE_HISTORY_LIMIT, QueueStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

#[derive(Debug)]
struct MemoryData {
    location_types: Vec<LocationType>,
    locations: Vec<Location>,
    checkins: Vec<Checkin>,
    time_slots: HashMap<SlotKey, TimeSlot>,
    predictions: Vec<Prediction>,
    available: bool,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            location_types: Vec::new(),
            locations: Vec::new(),
            checkins: Vec::new(),
            time_slots: HashMap::new(),
            predictions: Vec::new(),
            available: true,
        }
    }
}

impl MemoryData {
    fn has_location(&self, id: LocationId) -> bool {
        self.locations.iter().any(|l| l.id == id)
    }

    fn write_slot(&mut self, key: SlotKey, update: SlotUpdate, now: OffsetDateTime) -> TimeSlot {
        let slot = self.time_slots.entry(key).or_insert_with(|| TimeSlot {
            id: Uuid::new_v4(),
            location_id: key.location_id,
            day_of_week: key.day_of_week,
            hour: key.hour,
            average_wait_time: 0.0,
            average_people_count: 0.0,
            sample_count: 0,
            updated_at: now,
        });
        slot.average_wait_time = update.average_wait_time;
        slot.average_people_count = update.average_people_count;
        slot.sample_count = update.sample_count;
        slot.updated_at = now;
        slot.clone()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StorageError::Unavailable`]
    /// until availability is restored.
    pub fn set_available(&self, available: bool) -> StorageResult<()> {
        let mut data = self.data.write().map_err(|_| StorageError::Lock)?;
        data.available = available;
        Ok(())
    }

    /// Inserts a check-in as-is, bypassing admission control.
    pub fn insert_checkin(&self, checkin: Checkin) -> StorageResult<()> {
        let mut data = self.write()?;
        if !data.has_location(checkin.location_id) {
            return Err(StorageError::UnknownLocation(checkin.location_id));
        }
        data.checkins.push(checkin);
        Ok(())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, MemoryData>> {
        let guard = self.data.read().map_err(|_| StorageError::Lock)?;
        if !guard.available {
            return Err(StorageError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(guard)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, MemoryData>> {
        let guard = self.data.write().map_err(|_| StorageError::Lock)?;
        if !guard.available {
            return Err(StorageError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(guard)
    }
}

fn newest_first(mut checkins: Vec<Checkin>) -> Vec<Checkin> {
    // Input is in insertion order; reversing first keeps later inserts ahead on ties.
    checkins.reverse();
    checkins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    checkins
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn list_location_types(&self) -> StorageResult<Vec<LocationType>> {
        Ok(self.read()?.location_types.clone())
    }

    async fn create_location_type(
        &self,
        new: NewLocationType,
        now: OffsetDateTime,
    ) -> StorageResult<LocationType> {
        let mut data = self.write()?;
        let location_type = LocationType {
            id: Uuid::new_v4(),
            name: new.name,
            icon: new.icon,
            created_at: now,
        };
        data.location_types.push(location_type.clone());
        Ok(location_type)
    }

    async fn list_locations(
        &self,
        type_id: Option<LocationTypeId>,
    ) -> StorageResult<Vec<Location>> {
        let data = self.read()?;
        Ok(data
            .locations
            .iter()
            .filter(|l| l.is_active)
            .filter(|l| type_id.is_none_or(|id| l.type_id == id))
            .cloned()
            .collect())
    }

    async fn get_location(&self, id: LocationId) -> StorageResult<Option<Location>> {
        let data = self.read()?;
        Ok(data.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn create_location(
        &self,
        new: NewLocation,
        now: OffsetDateTime,
    ) -> StorageResult<Location> {
        let mut data = self.write()?;
        if !data.location_types.iter().any(|t| t.id == new.type_id) {
            return Err(StorageError::UnknownLocationType(new.type_id));
        }
        let location = Location {
            id: Uuid::new_v4(),
            name: new.name,
            address: new.address,
            type_id: new.type_id,
            latitude: new.latitude,
            longitude: new.longitude,
            average_service_time: new
                .average_service_time
                .unwrap_or(DEFAULT_SERVICE_TIME_MINUTES),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        data.locations.push(location.clone());
        Ok(location)
    }

    async fn get_recent_checkins(
        &self,
        location_id: LocationId,
        window: Duration,
        now: OffsetDateTime,
    ) -> StorageResult<Vec<Checkin>> {
        let since = now - window;
        let data = self.read()?;
        let recent = data
            .checkins
            .iter()
            .filter(|c| c.location_id == location_id && c.created_at >= since)
            .cloned()
            .collect();
        Ok(newest_first(recent))
    }

    async fn device_checkins_since(
        &self,
        device_id: &str,
        location_id: LocationId,
        since: OffsetDateTime,
    ) -> StorageResult<Vec<Checkin>> {
        let data = self.read()?;
        let matching = data
            .checkins
            .iter()
            .filter(|c| {
                c.device_id == device_id && c.location_id == location_id && c.created_at >= since
            })
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn get_device_checkins(&self, device_id: &str) -> StorageResult<Vec<Checkin>> {
        let data = self.read()?;
        let matching = data
            .checkins
            .iter()
            .filter(|c| c.device_id == device_id)
            .cloned()
            .collect();
        let mut checkins = newest_first(matching);
        checkins.truncate(DEVICE_HISTORY_LIMIT);
        Ok(checkins)
    }

    async fn create_checkin(
        &self,
        new: NewCheckin,
        now: OffsetDateTime,
    ) -> StorageResult<Checkin> {
        let mut data = self.write()?;
        if !data.has_location(new.location_id) {
            return Err(StorageError::UnknownLocation(new.location_id));
        }
        let checkin = Checkin {
            id: Uuid::new_v4(),
            location_id: new.location_id,
            device_id: new.device_id,
            people_ahead: new.people_ahead,
            queue_stage: new.queue_stage,
            confidence: 1.0,
            created_at: now,
        };
        data.checkins.push(checkin.clone());
        Ok(checkin)
    }

    async fn get_time_slots(&self, location_id: LocationId) -> StorageResult<Vec<TimeSlot>> {
        let data = self.read()?;
        let mut slots: Vec<TimeSlot> = data
            .time_slots
            .values()
            .filter(|s| s.location_id == location_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.day_of_week, s.hour));
        Ok(slots)
    }

    async fn get_time_slot(&self, key: SlotKey) -> StorageResult<Option<TimeSlot>> {
        Ok(self.read()?.time_slots.get(&key).cloned())
    }

    async fn upsert_time_slot(
        &self,
        key: SlotKey,
        update: SlotUpdate,
        now: OffsetDateTime,
    ) -> StorageResult<TimeSlot> {
        let mut data = self.write()?;
        if !data.has_location(key.location_id) {
            return Err(StorageError::UnknownLocation(key.location_id));
        }
        Ok(data.write_slot(key, update, now))
    }

    async fn fold_time_slot(
        &self,
        key: SlotKey,
        observation: SlotObservation,
        now: OffsetDateTime,
    ) -> StorageResult<TimeSlot> {
        let mut data = self.write()?;
        if !data.has_location(key.location_id) {
            return Err(StorageError::UnknownLocation(key.location_id));
        }
        let update = historical::fold(data.time_slots.get(&key), observation);
        Ok(data.write_slot(key, update, now))
    }

    async fn create_prediction(
        &self,
        location_id: LocationId,
        result: &PredictionResult,
        now: OffsetDateTime,
    ) -> StorageResult<Prediction> {
        let mut data = self.write()?;
        if !data.has_location(location_id) {
            return Err(StorageError::UnknownLocation(location_id));
        }
        let prediction = Prediction {
            id: Uuid::new_v4(),
            location_id,
            estimated_wait_time: result.estimated_wait_time,
            confidence: result.confidence,
            trend: result.trend,
            current_queue_size: result.current_queue_size,
            created_at: now,
        };
        data.predictions.push(prediction.clone());
        Ok(prediction)
    }

    async fn latest_prediction(
        &self,
        location_id: LocationId,
    ) -> StorageResult<Option<Prediction>> {
        let data = self.read()?;
        // Appended in creation order, so the last match is the newest.
        Ok(data
            .predictions
            .iter()
            .rev()
            .find(|p| p.location_id == location_id)
            .cloned())
    }
}
