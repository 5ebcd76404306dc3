//! Per-device, per-location check-in cooldown.

use crate::domain::{Checkin, LocationId};
use time::{Duration, OffsetDateTime};

pub const DEFAULT_COOLDOWN: Duration = Duration::minutes(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    RateLimited { retry_after: Duration },
}

/// Decides whether `device_id` may check in at `location_id` at `now`.
///
/// `history` may contain unrelated check-ins; only those from the same device
/// at the same location inside the cooldown window count.
pub fn admit(
    history: &[Checkin],
    device_id: &str,
    location_id: LocationId,
    now: OffsetDateTime,
    cooldown: Duration,
) -> Admission {
    let window_start = now - cooldown;
    let latest = history
        .iter()
        .filter(|c| c.device_id == device_id && c.location_id == location_id)
        .filter(|c| c.created_at >= window_start)
        .map(|c| c.created_at)
        .max();

    match latest {
        Some(latest) => Admission::RateLimited {
            retry_after: (latest + cooldown - now).max(Duration::ZERO),
        },
        None => Admission::Accepted,
    }
}
