//! Priority-tiered blend of the live and historical signals.

use crate::domain::PredictionResult;
use crate::estimation::historical::{HistoricalSignal, round_minutes};
use crate::estimation::live::LiveSignal;

/// A signal above this weight is trusted on its own.
pub const EXCLUSIVE_WEIGHT: f64 = 0.5;
pub const CONFIDENCE_FLOOR: f64 = 0.3;
pub const CONFIDENCE_PER_WEIGHT: f64 = 0.5;
pub const CONFIDENCE_CEILING: f64 = 0.95;

pub fn blend(
    live: &LiveSignal,
    historical: &HistoricalSignal,
    service_time_minutes: f64,
) -> PredictionResult {
    let total_weight = live.weight + historical.weight;
    if total_weight <= 0.0 {
        return PredictionResult::NO_SIGNAL;
    }

    let (queue_size, estimated_wait) = if live.weight > EXCLUSIVE_WEIGHT {
        (live.queue_size, live.queue_size * service_time_minutes)
    } else if historical.weight > EXCLUSIVE_WEIGHT {
        (historical.average_queue, historical.average_wait)
    } else {
        let live_norm = live.weight / total_weight;
        let hist_norm = historical.weight / total_weight;
        // Service time scales only the live term; the historical average is
        // already expressed in minutes.
        (
            live.queue_size * live_norm + historical.average_queue * hist_norm,
            live.queue_size * service_time_minutes * live_norm
                + historical.average_wait * hist_norm,
        )
    };

    let confidence =
        (CONFIDENCE_FLOOR + total_weight * CONFIDENCE_PER_WEIGHT).min(CONFIDENCE_CEILING);

    PredictionResult {
        estimated_wait_time: round_minutes(estimated_wait),
        confidence: (confidence * 100.0).round() / 100.0,
        trend: live.trend,
        current_queue_size: round_minutes(queue_size),
    }
}
