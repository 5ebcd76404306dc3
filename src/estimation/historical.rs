//! Per-bucket running means of wait time and queue length.
//!
//! Buckets never store raw history: each accepted check-in folds into the
//! bucket with the incremental mean `old * n/(n+1) + new * 1/(n+1)`.

use crate::domain::{BestTime, SlotUpdate, TimeSlot};

/// Buckets with fewer samples are stored but carry no weight.
pub const MIN_RELIABLE_SAMPLES: u32 = 3;
/// Sample count at which a bucket reaches full reliability.
pub const FULL_RELIABILITY_SAMPLES: f64 = 20.0;
/// Buckets need this many samples to be suggested as a good time to visit.
pub const MIN_BEST_TIME_SAMPLES: u32 = 2;
pub const BEST_TIMES_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalSignal {
    pub average_wait: f64,
    pub average_queue: f64,
    pub weight: f64,
}

impl HistoricalSignal {
    pub const EMPTY: Self = Self {
        average_wait: 0.0,
        average_queue: 0.0,
        weight: 0.0,
    };

    pub fn from_slot(slot: Option<&TimeSlot>) -> Self {
        match slot {
            Some(slot) if slot.sample_count >= MIN_RELIABLE_SAMPLES => Self {
                average_wait: slot.average_wait_time,
                average_queue: slot.average_people_count,
                weight: reliability(slot.sample_count),
            },
            _ => Self::EMPTY,
        }
    }
}

pub fn reliability(sample_count: u32) -> f64 {
    if sample_count < MIN_RELIABLE_SAMPLES {
        return 0.0;
    }
    (f64::from(sample_count) / FULL_RELIABILITY_SAMPLES).min(1.0)
}

/// One accepted check-in as seen by its bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotObservation {
    pub wait_time: f64,
    pub people_count: f64,
}

impl SlotObservation {
    pub fn from_checkin(people_ahead: u32, service_time_minutes: f64) -> Self {
        let people_count = f64::from(people_ahead);
        Self {
            wait_time: people_count * service_time_minutes,
            people_count,
        }
    }
}

pub fn fold(previous: Option<&TimeSlot>, observation: SlotObservation) -> SlotUpdate {
    let Some(previous) = previous.filter(|slot| slot.sample_count > 0) else {
        return SlotUpdate {
            average_wait_time: observation.wait_time,
            average_people_count: observation.people_count,
            sample_count: 1,
        };
    };

    let sample_count = previous.sample_count.saturating_add(1);
    let old_weight = f64::from(previous.sample_count) / f64::from(sample_count);
    let new_weight = 1.0 / f64::from(sample_count);

    SlotUpdate {
        average_wait_time: previous.average_wait_time * old_weight
            + observation.wait_time * new_weight,
        average_people_count: previous.average_people_count * old_weight
            + observation.people_count * new_weight,
        sample_count,
    }
}

/// Quietest buckets with enough samples, lowest average wait first.
pub fn best_times(slots: &[TimeSlot]) -> Vec<BestTime> {
    let mut candidates: Vec<&TimeSlot> = slots
        .iter()
        .filter(|slot| slot.sample_count >= MIN_BEST_TIME_SAMPLES)
        .collect();
    candidates.sort_by(|a, b| a.average_wait_time.total_cmp(&b.average_wait_time));

    candidates
        .into_iter()
        .take(BEST_TIMES_LIMIT)
        .map(|slot| BestTime {
            hour: slot.hour,
            day_of_week: slot.day_of_week,
            estimated_wait: round_minutes(slot.average_wait_time),
        })
        .collect()
}

pub(crate) fn round_minutes(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn slot(day_of_week: u8, hour: u8, update: SlotUpdate) -> TimeSlot {
        TimeSlot {
            id: Uuid::new_v4(),
            location_id: Uuid::nil(),
            day_of_week,
            hour,
            average_wait_time: update.average_wait_time,
            average_people_count: update.average_people_count,
            sample_count: update.sample_count,
            updated_at: datetime!(2026-01-11 12:00 UTC),
        }
    }

    fn with_samples(sample_count: u32, average_wait_time: f64) -> TimeSlot {
        slot(
            1,
            9,
            SlotUpdate {
                average_wait_time,
                average_people_count: average_wait_time / 5.0,
                sample_count,
            },
        )
    }

    #[test]
    fn first_observation_creates_single_sample() {
        let update = fold(None, SlotObservation::from_checkin(4, 5.0));

        assert_eq!(update.sample_count, 1);
        assert_eq!(update.average_wait_time, 20.0);
        assert_eq!(update.average_people_count, 4.0);
    }

    #[test]
    fn incremental_mean_matches_batch_mean() {
        let people = [3_u32, 8, 0, 12, 5, 5, 21, 1, 9];
        let service_time = 6.0;
        let mut current: Option<TimeSlot> = None;

        for p in people {
            let update = fold(
                current.as_ref(),
                SlotObservation::from_checkin(p, service_time),
            );
            current = Some(slot(2, 14, update));
        }

        let current = current.expect("bucket created");
        let count = people.len() as f64;
        let batch_people = people.iter().map(|p| f64::from(*p)).sum::<f64>() / count;
        let batch_wait = people
            .iter()
            .map(|p| f64::from(*p) * service_time)
            .sum::<f64>()
            / count;

        assert_eq!(current.sample_count, people.len() as u32);
        assert!((current.average_people_count - batch_people).abs() < 1e-9);
        assert!((current.average_wait_time - batch_wait).abs() < 1e-9);
    }

    #[test]
    fn sparse_buckets_carry_no_weight() {
        assert_eq!(
            HistoricalSignal::from_slot(Some(&with_samples(2, 30.0))),
            HistoricalSignal::EMPTY
        );
        assert_eq!(HistoricalSignal::from_slot(None), HistoricalSignal::EMPTY);
    }

    #[test]
    fn reliability_saturates_at_twenty_samples() {
        assert_eq!(reliability(0), 0.0);
        assert_eq!(reliability(3), 0.15);
        assert_eq!(reliability(10), 0.5);
        assert_eq!(reliability(20), 1.0);
        assert_eq!(reliability(55), 1.0);
    }

    #[test]
    fn best_times_skip_single_samples_and_sort_by_wait() {
        let slots = vec![
            slot(1, 9, SlotUpdate { average_wait_time: 30.4, average_people_count: 6.0, sample_count: 4 }),
            slot(1, 10, SlotUpdate { average_wait_time: 2.0, average_people_count: 0.4, sample_count: 1 }),
            slot(2, 8, SlotUpdate { average_wait_time: 11.6, average_people_count: 2.0, sample_count: 2 }),
            slot(3, 16, SlotUpdate { average_wait_time: 5.0, average_people_count: 1.0, sample_count: 7 }),
        ];

        let best = best_times(&slots);

        assert_eq!(
            best,
            vec![
                BestTime { hour: 16, day_of_week: 3, estimated_wait: 5 },
                BestTime { hour: 8, day_of_week: 2, estimated_wait: 12 },
                BestTime { hour: 9, day_of_week: 1, estimated_wait: 30 },
            ]
        );
    }

    #[test]
    fn best_times_keep_at_most_five() {
        let slots: Vec<TimeSlot> = (0..8)
            .map(|hour| {
                slot(
                    4,
                    hour,
                    SlotUpdate {
                        average_wait_time: f64::from(20 - hour),
                        average_people_count: 1.0,
                        sample_count: 3,
                    },
                )
            })
            .collect();

        let best = best_times(&slots);

        assert_eq!(best.len(), 5);
        assert_eq!(best[0].hour, 7);
        assert_eq!(best[4].hour, 3);
    }
}
