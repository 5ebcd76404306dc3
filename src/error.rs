use crate::domain::LocationId;
use crate::storage::StorageError;
use thiserror::Error;
use time::Duration;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("location not found: {0}")]
    NotFound(LocationId),
    #[error("check-in rate limited, retry after {}s", .retry_after.whole_seconds())]
    RateLimited { retry_after: Duration },
    #[error("storage failure: {0}")]
    StorageUnavailable(#[from] StorageError),
}
