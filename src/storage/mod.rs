//! Storage collaborator consumed by the prediction engine.
//!
//! The engine never touches persistence directly; it is handed an
//! `Arc<dyn QueueStore>` at construction time. Implementations must be
//! `Send + Sync` so the engine can be shared across request handlers.

use crate::domain::{
    Checkin, Location, LocationId, LocationType, LocationTypeId, NewCheckin, NewLocation,
    NewLocationType, Prediction, PredictionResult, SlotKey, SlotUpdate, TimeSlot,
};
use crate::estimation::historical::{self, SlotObservation};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub mod memory;
pub mod seed;

/// Most recent check-ins returned for a single device.
pub const DEVICE_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage lock poisoned")]
    Lock,
    #[error("unknown location: {0}")]
    UnknownLocation(LocationId),
    #[error("unknown location type: {0}")]
    UnknownLocationType(LocationTypeId),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait QueueStore: Send + Sync + fmt::Debug {
    async fn list_location_types(&self) -> StorageResult<Vec<LocationType>>;

    async fn create_location_type(
        &self,
        new: NewLocationType,
        now: OffsetDateTime,
    ) -> StorageResult<LocationType>;

    /// Active locations, optionally restricted to one location type.
    async fn list_locations(&self, type_id: Option<LocationTypeId>)
    -> StorageResult<Vec<Location>>;

    async fn get_location(&self, id: LocationId) -> StorageResult<Option<Location>>;

    async fn create_location(
        &self,
        new: NewLocation,
        now: OffsetDateTime,
    ) -> StorageResult<Location>;

    /// Check-ins at `location_id` created within `window` before `now`, newest first.
    async fn get_recent_checkins(
        &self,
        location_id: LocationId,
        window: Duration,
        now: OffsetDateTime,
    ) -> StorageResult<Vec<Checkin>>;

    /// Check-ins by `device_id` at `location_id` created at or after `since`.
    async fn device_checkins_since(
        &self,
        device_id: &str,
        location_id: LocationId,
        since: OffsetDateTime,
    ) -> StorageResult<Vec<Checkin>>;

    /// Latest check-ins of a device across all locations, newest first,
    /// capped at [`DEVICE_HISTORY_LIMIT`].
    async fn get_device_checkins(&self, device_id: &str) -> StorageResult<Vec<Checkin>>;

    /// Persists a check-in with full confidence.
    async fn create_checkin(&self, new: NewCheckin, now: OffsetDateTime)
    -> StorageResult<Checkin>;

    async fn get_time_slots(&self, location_id: LocationId) -> StorageResult<Vec<TimeSlot>>;

    async fn get_time_slot(&self, key: SlotKey) -> StorageResult<Option<TimeSlot>>;

    async fn upsert_time_slot(
        &self,
        key: SlotKey,
        update: SlotUpdate,
        now: OffsetDateTime,
    ) -> StorageResult<TimeSlot>;

    /// Folds one observation into a bucket.
    ///
    /// The read of the previous bucket state and the write of the new means
    /// must not interleave with another fold on the same key. The default
    /// implementation only holds for stores with a single writer; concurrent
    /// stores override it with an atomic read-modify-write.
    async fn fold_time_slot(
        &self,
        key: SlotKey,
        observation: SlotObservation,
        now: OffsetDateTime,
    ) -> StorageResult<TimeSlot> {
        let previous = self.get_time_slot(key).await?;
        let update = historical::fold(previous.as_ref(), observation);
        self.upsert_time_slot(key, update, now).await
    }

    async fn create_prediction(
        &self,
        location_id: LocationId,
        result: &PredictionResult,
        now: OffsetDateTime,
    ) -> StorageResult<Prediction>;

    async fn latest_prediction(&self, location_id: LocationId)
    -> StorageResult<Option<Prediction>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-01-12 09:30 UTC);

    /// Forwards to a [`MemoryStore`] but keeps the trait's own bucket fold.
    #[derive(Debug, Default)]
    pub(crate) struct SingleWriterStore {
        inner: MemoryStore,
        fail_upserts: AtomicBool,
    }

    impl SingleWriterStore {
        pub(crate) fn fail_upserts(&self, fail: bool) {
            self.fail_upserts.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl QueueStore for SingleWriterStore {
        async fn list_location_types(&self) -> StorageResult<Vec<LocationType>> {
            self.inner.list_location_types().await
        }

        async fn create_location_type(
            &self,
            new: NewLocationType,
            now: OffsetDateTime,
        ) -> StorageResult<LocationType> {
            self.inner.create_location_type(new, now).await
        }

        async fn list_locations(
            &self,
            type_id: Option<LocationTypeId>,
        ) -> StorageResult<Vec<Location>> {
            self.inner.list_locations(type_id).await
        }

        async fn get_location(&self, id: LocationId) -> StorageResult<Option<Location>> {
            self.inner.get_location(id).await
        }

        async fn create_location(
            &self,
            new: NewLocation,
            now: OffsetDateTime,
        ) -> StorageResult<Location> {
            self.inner.create_location(new, now).await
        }

        async fn get_recent_checkins(
            &self,
            location_id: LocationId,
            window: Duration,
            now: OffsetDateTime,
        ) -> StorageResult<Vec<Checkin>> {
            self.inner.get_recent_checkins(location_id, window, now).await
        }

        async fn device_checkins_since(
            &self,
            device_id: &str,
            location_id: LocationId,
            since: OffsetDateTime,
        ) -> StorageResult<Vec<Checkin>> {
            self.inner
                .device_checkins_since(device_id, location_id, since)
                .await
        }

        async fn get_device_checkins(&self, device_id: &str) -> StorageResult<Vec<Checkin>> {
            self.inner.get_device_checkins(device_id).await
        }

        async fn create_checkin(
            &self,
            new: NewCheckin,
            now: OffsetDateTime,
        ) -> StorageResult<Checkin> {
            self.inner.create_checkin(new, now).await
        }

        async fn get_time_slots(&self, location_id: LocationId) -> StorageResult<Vec<TimeSlot>> {
            self.inner.get_time_slots(location_id).await
        }

        async fn get_time_slot(&self, key: SlotKey) -> StorageResult<Option<TimeSlot>> {
            self.inner.get_time_slot(key).await
        }

        async fn upsert_time_slot(
            &self,
            key: SlotKey,
            update: SlotUpdate,
            now: OffsetDateTime,
        ) -> StorageResult<TimeSlot> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("bucket writes disabled".to_string()));
            }
            self.inner.upsert_time_slot(key, update, now).await
        }

        async fn create_prediction(
            &self,
            location_id: LocationId,
            result: &PredictionResult,
            now: OffsetDateTime,
        ) -> StorageResult<Prediction> {
            self.inner.create_prediction(location_id, result, now).await
        }

        async fn latest_prediction(
            &self,
            location_id: LocationId,
        ) -> StorageResult<Option<Prediction>> {
            self.inner.latest_prediction(location_id).await
        }
    }

    pub(crate) async fn store_with_location()
    -> Result<(SingleWriterStore, Location), StorageError> {
        let store = SingleWriterStore::default();
        let office = store
            .create_location_type(
                NewLocationType {
                    name: "Government Office".to_string(),
                    icon: "briefcase".to_string(),
                },
                NOW,
            )
            .await?;
        let location = store
            .create_location(
                NewLocation {
                    name: "DMV - Central Office".to_string(),
                    address: "789 Government Blvd".to_string(),
                    type_id: office.id,
                    latitude: None,
                    longitude: None,
                    average_service_time: Some(12),
                },
                NOW,
            )
            .await?;
        Ok((store, location))
    }

    #[tokio::test]
    async fn default_fold_reads_then_upserts_running_means() -> Result<(), StorageError> {
        let (store, location) = store_with_location().await?;
        let key = SlotKey {
            location_id: location.id,
            day_of_week: 1,
            hour: 9,
        };

        for (people, minutes) in [(2.0, 24.0), (4.0, 48.0), (6.0, 72.0)] {
            store
                .fold_time_slot(
                    key,
                    SlotObservation {
                        wait_time: minutes,
                        people_count: people,
                    },
                    NOW,
                )
                .await?;
        }

        let slot = store.get_time_slot(key).await?;

        assert_eq!(slot.as_ref().map(TimeSlot::key), Some(key));
        assert_eq!(slot.as_ref().map(|s| s.sample_count), Some(3));
        assert_eq!(slot.as_ref().map(|s| s.average_people_count), Some(4.0));
        assert_eq!(slot.map(|s| s.average_wait_time), Some(48.0));
        Ok(())
    }

    #[tokio::test]
    async fn default_fold_rejects_unknown_location() {
        let store = SingleWriterStore::default();
        let key = SlotKey {
            location_id: uuid::Uuid::new_v4(),
            day_of_week: 1,
            hour: 9,
        };

        let result = store
            .fold_time_slot(
                key,
                SlotObservation {
                    wait_time: 10.0,
                    people_count: 1.0,
                },
                NOW,
            )
            .await;

        assert!(matches!(result, Err(StorageError::UnknownLocation(_))));
    }

    #[tokio::test]
    async fn failed_upsert_leaves_bucket_untouched() -> Result<(), StorageError> {
        let (store, location) = store_with_location().await?;
        let key = SlotKey {
            location_id: location.id,
            day_of_week: 1,
            hour: 9,
        };
        store.fail_upserts(true);

        let result = store
            .fold_time_slot(
                key,
                SlotObservation {
                    wait_time: 10.0,
                    people_count: 1.0,
                },
                NOW,
            )
            .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(store.get_time_slot(key).await?.is_none());
        Ok(())
    }
}
