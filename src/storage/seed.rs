//! Loads the configured location catalogue into an empty store.

use crate::config::Config;
use crate::domain::{NewLocation, NewLocationType};
use crate::storage::{QueueStore, StorageError};
use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("location {location:?} references unknown type {location_type:?}")]
    UnknownType {
        location: String,
        location_type: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub location_types: usize,
    pub locations: usize,
}

/// Creates the configured types and locations unless the store already has types.
pub async fn seed_catalogue(
    store: &dyn QueueStore,
    config: &Config,
    now: OffsetDateTime,
) -> Result<SeedSummary, SeedError> {
    let existing = store.list_location_types().await?;
    if !existing.is_empty() {
        info!(count = existing.len(), "Catalogue already seeded");
        return Ok(SeedSummary {
            location_types: 0,
            locations: 0,
        });
    }

    let mut type_ids = HashMap::with_capacity(config.location_types.len());
    for seed in &config.location_types {
        let created = store
            .create_location_type(
                NewLocationType {
                    name: seed.name.clone(),
                    icon: seed.icon.clone(),
                },
                now,
            )
            .await?;
        type_ids.insert(seed.name.clone(), created.id);
    }

    for seed in &config.locations {
        let type_id =
            *type_ids
                .get(&seed.location_type)
                .ok_or_else(|| SeedError::UnknownType {
                    location: seed.name.clone(),
                    location_type: seed.location_type.clone(),
                })?;
        let location = store
            .create_location(
                NewLocation {
                    name: seed.name.clone(),
                    address: seed.address.clone(),
                    type_id,
                    latitude: seed.latitude,
                    longitude: seed.longitude,
                    average_service_time: seed.average_service_time,
                },
                now,
            )
            .await?;
        debug!(location_id = %location.id, name = %location.name, "Seeded location");
    }

    Ok(SeedSummary {
        location_types: config.location_types.len(),
        locations: config.locations.len(),
    })
}
