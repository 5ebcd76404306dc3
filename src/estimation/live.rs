//! Live signal aggregation over the recent check-in window.
//!
//! Each report is weighted by `exp(-age / 30min) * confidence`, so a report
//! from half an hour ago counts for roughly 37% of a fresh one. The signal's
//! own reliability depends only on how many reports the window holds.

use crate::domain::{Checkin, Trend};
use time::OffsetDateTime;

/// Exponential decay constant applied to report age, in minutes.
pub const DECAY_MINUTES: f64 = 30.0;
/// Number of recent check-ins at which the live signal reaches full weight.
pub const FULL_WEIGHT_CHECKINS: f64 = 5.0;
/// Fewer check-ins than this always classify as a stable trend.
pub const MIN_TREND_CHECKINS: usize = 3;
/// Difference in mean people ahead needed to flag a trend.
pub const TREND_THRESHOLD_PEOPLE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSignal {
    pub queue_size: f64,
    pub weight: f64,
    pub trend: Trend,
}

impl LiveSignal {
    pub const EMPTY: Self = Self {
        queue_size: 0.0,
        weight: 0.0,
        trend: Trend::Stable,
    };
}

pub fn aggregate(checkins: &[Checkin], now: OffsetDateTime) -> LiveSignal {
    if checkins.is_empty() {
        return LiveSignal::EMPTY;
    }

    let mut newest_first: Vec<&Checkin> = checkins.iter().collect();
    newest_first.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let (weighted_sum, weight_sum) =
        newest_first
            .iter()
            .fold((0.0_f64, 0.0_f64), |(weighted, total), checkin| {
                let weight = recency_weight(checkin, now);
                (
                    weighted + f64::from(checkin.people_ahead) * weight,
                    total + weight,
                )
            });

    let queue_size = if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        0.0
    };

    let people: Vec<u32> = newest_first.iter().map(|c| c.people_ahead).collect();

    LiveSignal {
        queue_size,
        weight: (checkins.len() as f64 / FULL_WEIGHT_CHECKINS).min(1.0),
        trend: classify_trend(&people),
    }
}

fn recency_weight(checkin: &Checkin, now: OffsetDateTime) -> f64 {
    // Clock skew can put a report slightly in the future; treat it as fresh.
    let age_minutes = ((now - checkin.created_at).as_seconds_f64() / 60.0).max(0.0);
    let confidence = if checkin.confidence.is_finite() && checkin.confidence > 0.0 {
        checkin.confidence
    } else {
        1.0
    };
    (-age_minutes / DECAY_MINUTES).exp() * confidence
}

/// Compares the newer half of the reports against the older half.
///
/// `people_ahead` must be ordered newest first. The newer half takes the
/// middle element when the count is odd.
pub fn classify_trend(people_ahead: &[u32]) -> Trend {
    if people_ahead.len() < MIN_TREND_CHECKINS {
        return Trend::Stable;
    }

    let split = people_ahead.len().div_ceil(2);
    let (recent, older) = people_ahead.split_at(split);
    let diff = mean(recent) - mean(older);

    if diff > TREND_THRESHOLD_PEOPLE {
        Trend::Increasing
    } else if diff < -TREND_THRESHOLD_PEOPLE {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}
